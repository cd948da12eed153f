//! Phase controller.
//!
//! The controller owns the walk through a [`Plan`]. It resolves the step at
//! the current `(phase, sub_phase)` and, when a handler reports
//! [`Outcome::Advance`], moves the position strictly forward: to the next
//! step of the phase, or to step 0 of the next phase once the phase is done.

use serde::Serialize;
use tracing::info;
use tycoon_types::ProgressState;

use crate::error::EngineError;
use crate::plan::{Plan, Step};

/// What a step handler achieved this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The step is fully satisfied; move on.
    Advance,
    /// Preconditions unmet or budget-blocked; retry next tick.
    Hold {
        /// What the step is waiting on.
        reason: String,
    },
    /// Progress depends on something outside the engine's control.
    WaitExternal {
        /// What the step is waiting for.
        reason: String,
    },
}

impl Outcome {
    /// Build an [`Outcome::Hold`].
    pub fn hold(reason: impl Into<String>) -> Self {
        Self::Hold {
            reason: reason.into(),
        }
    }

    /// Build an [`Outcome::WaitExternal`].
    pub fn wait(reason: impl Into<String>) -> Self {
        Self::WaitExternal {
            reason: reason.into(),
        }
    }
}

/// Walks a plan one step at a time.
#[derive(Debug, Clone, Copy)]
pub struct PhaseController<'p> {
    plan: &'p Plan,
}

impl<'p> PhaseController<'p> {
    /// Create a controller over `plan`.
    pub const fn new(plan: &'p Plan) -> Self {
        Self { plan }
    }

    /// The plan being walked.
    pub const fn plan(self) -> &'p Plan {
        self.plan
    }

    /// The step at the record's position.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Invariant`] if the position lies outside the
    /// plan, which means the record belongs to a different plan.
    pub fn current_step(self, progress: &ProgressState) -> Result<&'p Step, EngineError> {
        self.plan
            .step_at(progress.phase, progress.sub_phase)
            .ok_or_else(|| {
                EngineError::invariant(format!(
                    "position {}.{} is outside plan {}",
                    progress.phase, progress.sub_phase, self.plan.name
                ))
            })
    }

    /// Apply a handler outcome to the record. Returns whether it advanced.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Invariant`] if the current phase does not
    /// exist.
    pub fn apply(
        self,
        progress: &mut ProgressState,
        outcome: &Outcome,
    ) -> Result<bool, EngineError> {
        if *outcome != Outcome::Advance {
            return Ok(false);
        }

        let len = self.plan.phase_len(progress.phase).ok_or_else(|| {
            EngineError::invariant(format!(
                "phase {} is outside plan {}",
                progress.phase, self.plan.name
            ))
        })?;
        let next_sub = usize::try_from(progress.sub_phase.saturating_add(1)).unwrap_or(usize::MAX);

        if next_sub < len {
            progress.advance_sub_phase();
        } else {
            progress.advance_phase();
            info!(
                phase = progress.phase,
                name = self.plan.phase_name(progress.phase).unwrap_or("<end>"),
                "entering phase"
            );
        }
        Ok(true)
    }
}
