//! Tick callback that feeds the status API.
//!
//! After each tick the callback records the report and the persisted
//! progress in the shared [`EngineStatus`] and broadcasts the report to
//! `WebSocket` clients.
//!
//! [`EngineStatus`]: tycoon_observer::EngineStatus

use std::sync::Arc;

use tracing::debug;
use tycoon_core::gang::GangReport;
use tycoon_core::runner::GangCallback;
use tycoon_core::{TickCallback, TickReport};
use tycoon_observer::AppState;
use tycoon_types::ProgressState;

/// Callback that bridges the tick loop to the status API.
pub struct ObserverCallback {
    state: Arc<AppState>,
}

impl ObserverCallback {
    /// Create a callback backed by the given app state.
    pub const fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl TickCallback for ObserverCallback {
    fn on_tick(&mut self, report: &TickReport, progress: &ProgressState) {
        let receivers = self.state.broadcast(report);
        debug!(tick = report.tick, receivers, "tick report broadcast");

        // Skip the update if a handler holds the lock; the next tick catches up.
        if let Ok(mut status) = self.state.status.try_write() {
            status.record_tick(report, progress);
        }
    }
}

impl GangCallback for ObserverCallback {
    fn on_gang_tick(&mut self, tick: u64, result: Result<&GangReport, &str>) {
        if let Ok(mut status) = self.state.status.try_write() {
            status.record_gang_tick(tick, result);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tycoon_core::collaborator::scripted::ScriptedCollaborator;
    use tycoon_core::{Plan, run_tick};
    use tycoon_types::Snapshot;

    use super::*;

    #[tokio::test]
    async fn records_and_broadcasts_each_tick() {
        let state = Arc::new(AppState::new("agriculture", "corporation"));
        let mut rx = state.subscribe();
        let mut callback = ObserverCallback::new(Arc::clone(&state));

        let plan = Plan::agriculture();
        let mut sim = ScriptedCollaborator::new(Snapshot {
            funds: 1e12,
            ..Snapshot::default()
        });
        let mut progress = ProgressState::new();
        let report = run_tick(1, &plan, &mut progress, &mut sim, 1.0).await;
        callback.on_tick(&report, &progress);

        assert_eq!(rx.try_recv().unwrap().tick, 1);
        let status = state.status.read().await;
        assert_eq!(status.ticks, 1);
        assert_eq!(status.progress.as_ref().unwrap().position(), (1, 0));
        assert_eq!(status.report.as_ref().unwrap().step.as_deref(), Some("create_division"));
    }

    #[tokio::test]
    async fn records_gang_failures() {
        let state = Arc::new(AppState::new("gang", "gang"));
        let mut callback = ObserverCallback::new(Arc::clone(&state));
        callback.on_gang_tick(2, Err("offline"));
        let status = state.status.read().await;
        assert_eq!(status.gang.as_ref().unwrap().error.as_deref(), Some("offline"));
    }
}
