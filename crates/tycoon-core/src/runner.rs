//! Tick loop runners.
//!
//! [`run_engine`] drives the corporation plan: load the progress record
//! once, then repeat tick, persist, report, sleep. The record is saved after
//! every tick whether or not anything advanced. A store failure is the one
//! error that stops the loop.
//!
//! [`run_gang_loop`] drives the gang controller, which has nothing to
//! persist and so never stops on its own unless bounded by `max_ticks`.

use std::time::Duration;

use tracing::{info, warn};
use tycoon_store::{ProgressStore, StoreError};
use tycoon_types::ProgressState;

use crate::collaborator::{Collaborator, GangSurface};
use crate::config::EngineConfig;
use crate::gang::{self, GangReport, GangSettings};
use crate::plan::Plan;
use crate::tick::{self, TickReport};

/// Errors that stop the tick loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The progress store could not be read or written.
    #[error("progress store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },
}

/// Result of a bounded run.
#[derive(Debug)]
pub struct RunSummary {
    /// Ticks executed.
    pub total_ticks: u64,
    /// The record as last persisted.
    pub progress: ProgressState,
    /// The final tick's report, if any tick ran.
    pub last_report: Option<TickReport>,
}

/// Callback invoked after each tick is persisted.
///
/// Implementations can use this to update the status API, forward reports,
/// and so on.
pub trait TickCallback: Send {
    /// Called after a tick's progress has been saved.
    fn on_tick(&mut self, report: &TickReport, progress: &ProgressState);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _report: &TickReport, _progress: &ProgressState) {}
}

/// Callback invoked after each gang tick.
pub trait GangCallback: Send {
    /// Called after a gang tick, with its report or error text.
    fn on_gang_tick(&mut self, tick: u64, result: Result<&GangReport, &str>);
}

impl GangCallback for NoOpCallback {
    fn on_gang_tick(&mut self, _tick: u64, _result: Result<&GangReport, &str>) {}
}

/// Run the corporation plan until `max_ticks` is reached, or forever.
///
/// # Errors
///
/// Returns [`RunnerError::Store`] if the progress record cannot be loaded
/// or saved.
pub async fn run_engine<C: Collaborator>(
    plan: &Plan,
    engine: &EngineConfig,
    store: &ProgressStore,
    collaborator: &mut C,
    callback: &mut dyn TickCallback,
) -> Result<RunSummary, RunnerError> {
    let mut progress = match store.load().await? {
        Some(progress) => {
            info!(
                phase = progress.phase,
                sub_phase = progress.sub_phase,
                investment_round = progress.investment_round,
                flags = progress.completion_flags.len(),
                "resuming from saved progress"
            );
            progress
        }
        None => {
            info!("no saved progress, starting from the beginning");
            ProgressState::new()
        }
    };

    info!(
        plan = %plan.name,
        store = store.name(),
        tick_interval_ms = engine.tick_interval_ms,
        max_ticks = engine.max_ticks,
        "engine starting"
    );

    let mut total_ticks: u64 = 0;
    let mut last_report = None;
    loop {
        total_ticks = total_ticks.saturating_add(1);
        let report = tick::run_tick(
            total_ticks,
            plan,
            &mut progress,
            collaborator,
            engine.safety_margin,
        )
        .await;

        store.save(&progress).await?;
        callback.on_tick(&report, &progress);
        last_report = Some(report);

        if engine.max_ticks > 0 && total_ticks >= engine.max_ticks {
            info!(total_ticks, "tick limit reached");
            break;
        }
        tokio::time::sleep(Duration::from_millis(engine.tick_interval_ms)).await;
    }

    Ok(RunSummary {
        total_ticks,
        progress,
        last_report,
    })
}

/// Run the gang controller until `max_ticks` is reached, or forever.
///
/// Returns the number of ticks executed.
pub async fn run_gang_loop<G: GangSurface>(
    settings: &GangSettings,
    engine: &EngineConfig,
    gang: &mut G,
    callback: &mut dyn GangCallback,
) -> u64 {
    info!(
        tick_interval_ms = engine.tick_interval_ms,
        ascension_threshold = settings.ascension_threshold,
        clash_threshold = settings.clash_threshold,
        "gang controller starting"
    );

    let mut total_ticks: u64 = 0;
    loop {
        total_ticks = total_ticks.saturating_add(1);
        match gang::run_gang_tick(gang, settings).await {
            Ok(report) => {
                info!(
                    tick = total_ticks,
                    recruited = report.recruited.len(),
                    ascended = report.ascended.len(),
                    purchases = report.purchases,
                    task_changes = report.task_changes,
                    "gang tick complete"
                );
                callback.on_gang_tick(total_ticks, Ok(&report));
            }
            Err(e) => {
                warn!(tick = total_ticks, error = %e, "gang tick failed, will retry");
                callback.on_gang_tick(total_ticks, Err(&e.to_string()));
            }
        }

        if engine.max_ticks > 0 && total_ticks >= engine.max_ticks {
            break;
        }
        tokio::time::sleep(Duration::from_millis(engine.tick_interval_ms)).await;
    }
    total_ticks
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tycoon_store::MemoryProgressStore;
    use tycoon_types::{GangView, Snapshot};

    use super::*;
    use crate::collaborator::scripted::{ScriptedCollaborator, ScriptedGang};

    fn bounded(max_ticks: u64) -> EngineConfig {
        EngineConfig {
            tick_interval_ms: 0,
            max_ticks,
            ..EngineConfig::default()
        }
    }

    struct Recorder(Vec<(u64, (u32, u32))>);

    impl TickCallback for Recorder {
        fn on_tick(&mut self, report: &TickReport, progress: &ProgressState) {
            self.0.push((report.tick, progress.position()));
        }
    }

    #[tokio::test]
    async fn saves_after_every_tick() {
        let memory = MemoryProgressStore::new();
        let store = ProgressStore::Memory(memory.clone());
        let mut sim = ScriptedCollaborator::new(Snapshot {
            funds: 1e12,
            ..Snapshot::default()
        });
        let mut recorder = Recorder(Vec::new());

        let plan = Plan::agriculture();
        let summary = run_engine(&plan, &bounded(3), &store, &mut sim, &mut recorder)
            .await
            .unwrap();
        assert_eq!(summary.total_ticks, 3);
        assert_eq!(memory.save_count().await, 3);
        assert_eq!(recorder.0.len(), 3);
        assert_eq!(memory.load().await.unwrap(), summary.progress);
    }

    #[tokio::test]
    async fn failed_ticks_still_persist_unchanged_record() {
        let saved = ProgressState {
            phase: 1,
            ..ProgressState::default()
        };
        let memory = MemoryProgressStore::with_state(saved.clone());
        let store = ProgressStore::Memory(memory.clone());
        let mut sim = ScriptedCollaborator::default();
        sim.unavailable = true;

        let plan = Plan::agriculture();
        let summary = run_engine(&plan, &bounded(2), &store, &mut sim, &mut NoOpCallback)
            .await
            .unwrap();
        assert_eq!(summary.progress, saved);
        assert_eq!(memory.save_count().await, 2);
        assert_eq!(memory.load().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn gang_loop_survives_failures() {
        let mut gang = ScriptedGang::new(GangView::default());
        gang.unavailable = true;
        let settings = GangSettings::default();
        let ticks = run_gang_loop(&settings, &bounded(2), &mut gang, &mut NoOpCallback).await;
        assert_eq!(ticks, 2);
    }
}
