//! A single engine tick.
//!
//! Each tick runs the same sequence:
//!
//! 1. **Snapshot** -- fetch a fresh view of the entity. A failure ends the
//!    tick immediately.
//! 2. **Step** -- run the handler for the current `(phase, sub_phase)` on a
//!    working copy of the progress record, then apply its outcome.
//! 3. **Commit** -- if the step finished without error, the working copy
//!    replaces the record. On any error the record is left untouched so the
//!    same step retries identically next tick.
//! 4. **Pricing** -- run the price controller if the plan has one and the
//!    cycle is open for adjustment. This runs even when the step failed.
//!
//! Persisting and sleeping are the runner's job. A tick never fails: every
//! outcome, including errors, is folded into the returned [`TickReport`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use tycoon_types::{ProgressState, Snapshot};

use crate::collaborator::Collaborator;
use crate::error::EngineError;
use crate::executor::GatedExecutor;
use crate::phase::{Outcome, PhaseController};
use crate::plan::Plan;
use crate::pricing::{self, PriceChange};
use crate::steps;

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// The step finished and the position moved forward.
    Advanced,
    /// The step is blocked or its preconditions are unmet.
    Held,
    /// The step is waiting on something external.
    WaitingExternal,
    /// The collaborator failed; nothing changed.
    Failed,
    /// Plan, record, and snapshot disagree; nothing changed.
    Invariant,
}

/// Everything one tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// When the tick started.
    pub started_at: DateTime<Utc>,
    /// Phase the tick ran in.
    pub phase: u32,
    /// Step the tick ran.
    pub sub_phase: u32,
    /// Kind of the step, if the position resolved to one.
    pub step: Option<String>,
    /// How the tick ended.
    pub outcome: TickOutcome,
    /// What a held or waiting step is waiting on.
    pub reason: Option<String>,
    /// Funds reported by the snapshot.
    pub funds: Option<f64>,
    /// Prices pushed this tick.
    pub pricing: Vec<PriceChange>,
    /// Error text for failed ticks.
    pub error: Option<String>,
}

impl TickReport {
    fn new(tick: u64, progress: &ProgressState) -> Self {
        Self {
            tick,
            started_at: Utc::now(),
            phase: progress.phase,
            sub_phase: progress.sub_phase,
            step: None,
            outcome: TickOutcome::Held,
            reason: None,
            funds: None,
            pricing: Vec::new(),
            error: None,
        }
    }

    fn record_error(&mut self, err: &EngineError) {
        self.outcome = if err.is_transient() {
            TickOutcome::Failed
        } else {
            TickOutcome::Invariant
        };
        self.error = Some(err.to_string());
    }
}

/// Run one tick against `collaborator`.
///
/// `progress` is only modified if the step completes without error. Pricing
/// runs whenever the snapshot was fetched, whatever the step did.
pub async fn run_tick<C: Collaborator>(
    tick: u64,
    plan: &Plan,
    progress: &mut ProgressState,
    collaborator: &mut C,
    safety_margin: f64,
) -> TickReport {
    let mut report = TickReport::new(tick, progress);

    let snapshot = match collaborator.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            let err = EngineError::from(e);
            warn!(
                tick,
                phase = progress.phase,
                sub_phase = progress.sub_phase,
                error = %err,
                "snapshot failed, tick skipped"
            );
            report.record_error(&err);
            return report;
        }
    };
    report.funds = Some(snapshot.funds);

    let controller = PhaseController::new(plan);
    let mut exec = GatedExecutor::new(collaborator, snapshot.funds, safety_margin);
    let mut working = progress.clone();

    match advance(controller, &snapshot, &mut working, &mut exec, &mut report).await {
        Ok(outcome) => {
            log_outcome(&report, &outcome);
            report.outcome = match &outcome {
                Outcome::Advance => TickOutcome::Advanced,
                Outcome::Hold { .. } => TickOutcome::Held,
                Outcome::WaitExternal { .. } => TickOutcome::WaitingExternal,
            };
            report.reason = match outcome {
                Outcome::Advance => None,
                Outcome::Hold { reason } | Outcome::WaitExternal { reason } => Some(reason),
            };
            *progress = working;
        }
        Err(err) => {
            if err.is_transient() {
                warn!(
                    tick,
                    phase = report.phase,
                    sub_phase = report.sub_phase,
                    step = report.step.as_deref().unwrap_or(""),
                    error = %err,
                    "tick aborted, will retry"
                );
            } else {
                error!(
                    tick,
                    phase = report.phase,
                    sub_phase = report.sub_phase,
                    step = report.step.as_deref().unwrap_or(""),
                    error = %err,
                    "invariant violated, holding position"
                );
            }
            report.record_error(&err);
        }
    }

    // Runs against the committed record, so a failed step prices as if it
    // had held.
    if let Some(config) = &plan.pricing {
        match pricing::run_pricing(&mut exec, &snapshot, progress, config).await {
            Ok(changes) => report.pricing = changes,
            Err(e) => {
                warn!(tick, error = %e, "price adjustment failed");
                if report.error.is_none() {
                    report.error = Some(e.to_string());
                }
            }
        }
    }

    report
}

async fn advance<C: Collaborator>(
    controller: PhaseController<'_>,
    snapshot: &Snapshot,
    working: &mut ProgressState,
    exec: &mut GatedExecutor<'_, C>,
    report: &mut TickReport,
) -> Result<Outcome, EngineError> {
    let step = controller.current_step(working)?;
    report.step = Some(step.label().to_owned());
    let outcome = steps::run_step(step, controller.plan(), snapshot, working, exec).await?;
    controller.apply(working, &outcome)?;
    Ok(outcome)
}

fn log_outcome(report: &TickReport, outcome: &Outcome) {
    let step = report.step.as_deref().unwrap_or("");
    match outcome {
        Outcome::Advance => info!(
            tick = report.tick,
            phase = report.phase,
            sub_phase = report.sub_phase,
            step,
            "step complete, advancing"
        ),
        Outcome::Hold { reason } => info!(
            tick = report.tick,
            phase = report.phase,
            sub_phase = report.sub_phase,
            step,
            %reason,
            "holding"
        ),
        Outcome::WaitExternal { reason } => info!(
            tick = report.tick,
            phase = report.phase,
            sub_phase = report.sub_phase,
            step,
            %reason,
            "waiting on external event"
        ),
    }
}
