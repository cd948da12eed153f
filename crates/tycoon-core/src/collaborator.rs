//! The external control surface the engine drives.
//!
//! The engine never talks to the controlled entity directly. Each tick it
//! asks a [`Collaborator`] for a fresh [`Snapshot`], prices candidate actions
//! through [`Collaborator::action_cost`], and attempts them one at a time.
//! The gang controller uses the narrower [`GangSurface`].
//!
//! The production implementation is the HTTP bridge in the engine binary.
//! The `scripted` simulator exists only for tests and behind the `testing`
//! feature, which dependent crates enable for their own tests.

use std::future::Future;

use tycoon_types::{Action, ActionResponse, GangAction, GangView, Snapshot};

#[cfg(any(test, feature = "testing"))]
pub mod scripted;

/// Errors raised by a collaborator.
///
/// Both variants are transient from the engine's point of view: the tick is
/// abandoned and retried unchanged on the next interval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or failed internally.
    #[error("collaborator unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The collaborator answered with something that could not be decoded.
    #[error("malformed collaborator response: {message}")]
    Malformed {
        /// Description of the decode failure.
        message: String,
    },
}

impl CollaboratorError {
    /// Build an [`CollaboratorError::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Build a [`CollaboratorError::Malformed`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Read and mutate access to the controlled entity.
pub trait Collaborator: Send {
    /// Fetch a fresh view of the entity.
    fn snapshot(&mut self) -> impl Future<Output = Result<Snapshot, CollaboratorError>> + Send;

    /// Current cost of performing `action`.
    fn action_cost(
        &mut self,
        action: &Action,
    ) -> impl Future<Output = Result<f64, CollaboratorError>> + Send;

    /// Attempt `action`. Refusals come back as
    /// [`ActionResponse::Rejected`], not as errors.
    fn attempt(
        &mut self,
        action: &Action,
    ) -> impl Future<Output = Result<ActionResponse, CollaboratorError>> + Send;
}

/// Read and mutate access to a gang.
pub trait GangSurface: Send {
    /// Fetch a fresh view of the gang.
    fn gang(&mut self) -> impl Future<Output = Result<GangView, CollaboratorError>> + Send;

    /// Attempt a gang action. Returns whether it took effect.
    fn attempt_gang(
        &mut self,
        action: &GangAction,
    ) -> impl Future<Output = Result<bool, CollaboratorError>> + Send;
}
