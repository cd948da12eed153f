//! Shared application state for the status API.
//!
//! [`AppState`] holds the broadcast channel for tick reports and the
//! in-memory [`EngineStatus`] the REST endpoints serve. The engine updates
//! the status after every tick; handlers only ever read it.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tycoon_core::TickReport;
use tycoon_core::gang::GangReport;
use tycoon_types::ProgressState;

/// Capacity of the broadcast channel for tick reports.
///
/// A subscriber that falls further behind than this skips to the newest
/// report.
const BROADCAST_CAPACITY: usize = 256;

/// Number of recent tick reports kept for `GET /api/history`.
pub const MAX_RECENT_REPORTS: usize = 200;

/// The latest gang tick, or the error it failed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GangStatus {
    /// Tick number.
    pub tick: u64,
    /// The tick's report, if it succeeded.
    pub report: Option<GangReport>,
    /// Error text, if it failed.
    pub error: Option<String>,
}

/// What the engine has done so far.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Name of the plan being run.
    pub plan: String,
    /// `corporation` or `gang`.
    pub mode: String,
    /// When the engine started.
    pub started_at: DateTime<Utc>,
    /// Ticks completed.
    pub ticks: u64,
    /// The most recent tick report.
    pub report: Option<TickReport>,
    /// The most recent gang tick.
    pub gang: Option<GangStatus>,
    /// The progress record as last persisted.
    #[serde(skip)]
    pub progress: Option<ProgressState>,
    /// Recent reports, oldest first.
    #[serde(skip)]
    pub recent: VecDeque<TickReport>,
}

impl EngineStatus {
    /// An empty status for a freshly started engine.
    pub fn new(plan: &str, mode: &str) -> Self {
        Self {
            plan: plan.to_owned(),
            mode: mode.to_owned(),
            started_at: Utc::now(),
            ticks: 0,
            report: None,
            gang: None,
            progress: None,
            recent: VecDeque::with_capacity(MAX_RECENT_REPORTS),
        }
    }

    /// Record a persisted corporation tick.
    pub fn record_tick(&mut self, report: &TickReport, progress: &ProgressState) {
        self.ticks = self.ticks.max(report.tick);
        self.progress = Some(progress.clone());
        if self.recent.len() >= MAX_RECENT_REPORTS {
            self.recent.pop_front();
        }
        self.recent.push_back(report.clone());
        self.report = Some(report.clone());
    }

    /// Record a gang tick.
    pub fn record_gang_tick(&mut self, tick: u64, result: Result<&GangReport, &str>) {
        self.ticks = self.ticks.max(tick);
        self.gang = Some(match result {
            Ok(report) => GangStatus {
                tick,
                report: Some(report.clone()),
                error: None,
            },
            Err(error) => GangStatus {
                tick,
                report: None,
                error: Some(error.to_owned()),
            },
        });
    }

    /// Up to `limit` recent reports, newest first.
    pub fn history(&self, limit: usize) -> Vec<&TickReport> {
        self.recent.iter().rev().take(limit).collect()
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for tick reports.
    pub tx: broadcast::Sender<TickReport>,
    /// The engine status, updated each tick.
    pub status: Arc<RwLock<EngineStatus>>,
}

impl AppState {
    /// Create state for an engine running `plan` in `mode`.
    pub fn new(plan: &str, mode: &str) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            status: Arc::new(RwLock::new(EngineStatus::new(plan, mode))),
        }
    }

    /// Subscribe to tick reports.
    pub fn subscribe(&self) -> broadcast::Receiver<TickReport> {
        self.tx.subscribe()
    }

    /// Publish a tick report to every connected client.
    ///
    /// Returns the number of receivers; 0 when nobody is listening.
    pub fn broadcast(&self, report: &TickReport) -> usize {
        self.tx.send(report.clone()).unwrap_or(0)
    }
}
