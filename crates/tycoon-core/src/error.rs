//! Error types for the engine.
//!
//! Routine affordability failures are never errors: they surface as
//! [`Attempt::Blocked`](crate::executor::Attempt::Blocked) and end up as a
//! held tick. [`EngineError`] is reserved for the two kinds of failure the
//! tick boundary has to report: the collaborator misbehaving, and the plan
//! or progress record contradicting the snapshot.

use crate::collaborator::CollaboratorError;

/// Errors that can abort a tick.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The collaborator failed unexpectedly.
    #[error("collaborator error: {source}")]
    Collaborator {
        /// The underlying collaborator error.
        #[from]
        source: CollaboratorError,
    },

    /// Plan, progress, or snapshot data contradict each other.
    #[error("invariant violated: {message}")]
    Invariant {
        /// What was found to be inconsistent.
        message: String,
    },
}

impl EngineError {
    /// Build an [`EngineError::Invariant`].
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Whether the tick should be retried unchanged next time.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }
}
