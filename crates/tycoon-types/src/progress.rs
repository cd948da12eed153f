//! The persisted progression record.
//!
//! [`ProgressState`] is the only thing the engine remembers between ticks
//! and across restarts. It is written after every tick and read back once
//! at startup; a missing record means "start from the beginning".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::snapshot::CycleState;

/// Where the engine is in its plan and what it has already finished.
///
/// Invariants maintained by the methods on this type:
/// - `(phase, sub_phase)` only moves forward.
/// - Completion flags are only ever added.
/// - `investment_round` never decreases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressState {
    /// Current phase index.
    pub phase: u32,
    /// Current step within the phase.
    pub sub_phase: u32,
    /// Number of milestone offers accepted.
    pub investment_round: u32,
    /// Goals that are done and must not be redone.
    pub completion_flags: BTreeSet<String>,
    /// Highest milestone offer seen while waiting on the current step.
    pub peak_offer: f64,
    /// Cycle transitions counted while waiting on the current step.
    pub cycles_waited: u32,
    /// Cycle state seen on the previous tick of the current step.
    pub last_cycle_state: Option<CycleState>,
}

impl ProgressState {
    /// A fresh record positioned at the very first step.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `(phase, sub_phase)` position.
    pub const fn position(&self) -> (u32, u32) {
        (self.phase, self.sub_phase)
    }

    /// Whether a goal has been marked done.
    pub fn is_complete(&self, flag: &str) -> bool {
        self.completion_flags.contains(flag)
    }

    /// Mark a goal done. Returns `true` if the flag was newly set.
    pub fn mark_complete(&mut self, flag: impl Into<String>) -> bool {
        self.completion_flags.insert(flag.into())
    }

    /// Move to the next step within the current phase.
    pub const fn advance_sub_phase(&mut self) {
        self.sub_phase = self.sub_phase.saturating_add(1);
        self.reset_step_counters();
    }

    /// Move to the first step of the next phase.
    pub const fn advance_phase(&mut self) {
        self.phase = self.phase.saturating_add(1);
        self.sub_phase = 0;
        self.reset_step_counters();
    }

    /// Record that milestone `round` has been accepted.
    pub fn record_milestone(&mut self, round: u32) {
        self.investment_round = self.investment_round.max(round);
    }

    const fn reset_step_counters(&mut self) {
        self.peak_offer = 0.0;
        self.cycles_waited = 0;
        self.last_cycle_state = None;
    }
}
