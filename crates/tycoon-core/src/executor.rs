//! Gated action executor.
//!
//! Every mutating call the engine makes goes through [`GatedExecutor`]. It
//! prices the action first and only attempts it when the tracked funds
//! exceed `cost × margin`. Anything short of success (unaffordable, refused,
//! or a purchase that delivered nothing) comes back as a value the caller
//! holds on, never as an error. Only collaborator failures propagate.
//!
//! The executor tracks funds locally for the duration of one tick so that a
//! sequence of attempts never spends past the snapshot's balance.

use tracing::debug;
use tycoon_types::{Action, ActionResponse};

use crate::collaborator::{Collaborator, CollaboratorError};

/// Why an attempt did not go through.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    /// The action costs more than the funds allow.
    InsufficientFunds {
        /// Cost quoted by the collaborator.
        cost: f64,
        /// Funds required after the margin is applied.
        required: f64,
        /// Funds available at the time of the check.
        available: f64,
    },
    /// The collaborator refused the action.
    Rejected {
        /// Reason given by the collaborator.
        reason: String,
    },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientFunds {
                required,
                available,
                ..
            } => write!(f, "needs {required:.0}, have {available:.0}"),
            Self::Rejected { reason } => write!(f, "rejected: {reason}"),
        }
    }
}

/// The result of a gated attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// The collaborator accepted the action.
    Done(ActionResponse),
    /// The action was not carried out; retry next tick.
    Blocked(BlockReason),
}

impl Attempt {
    /// Whether the action had any effect.
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Done(response) if response.succeeded())
    }

    /// Units delivered by a purchase; zero for anything else.
    pub const fn units(&self) -> f64 {
        match self {
            Self::Done(ActionResponse::Purchased { units }) => *units,
            _ => 0.0,
        }
    }
}

/// Wraps a collaborator with per-tick affordability gating.
pub struct GatedExecutor<'a, C> {
    collaborator: &'a mut C,
    funds: f64,
    margin: f64,
    last_block: Option<(String, BlockReason)>,
}

impl<'a, C: Collaborator> GatedExecutor<'a, C> {
    /// Create an executor starting from `funds`, requiring `margin × cost`
    /// to be available before any attempt.
    pub const fn new(collaborator: &'a mut C, funds: f64, margin: f64) -> Self {
        Self {
            collaborator,
            funds,
            margin,
            last_block: None,
        }
    }

    /// Funds still available this tick.
    pub const fn funds(&self) -> f64 {
        self.funds
    }

    /// The default safety margin.
    pub const fn margin(&self) -> f64 {
        self.margin
    }

    /// The most recent block, labelled with the action kind.
    pub const fn last_block(&self) -> Option<&(String, BlockReason)> {
        self.last_block.as_ref()
    }

    /// Attempt `action` under the default margin.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if pricing or attempting the action
    /// fails unexpectedly.
    pub async fn attempt(&mut self, action: &Action) -> Result<Attempt, CollaboratorError> {
        self.attempt_with_margin(action, self.margin).await
    }

    /// Attempt `action`, requiring `margin × cost` to be available.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if pricing or attempting the action
    /// fails unexpectedly.
    pub async fn attempt_with_margin(
        &mut self,
        action: &Action,
        margin: f64,
    ) -> Result<Attempt, CollaboratorError> {
        let cost = self.collaborator.action_cost(action).await?;
        let required = cost * margin;
        // Funds must exceed the requirement; free actions always go through.
        if required > 0.0 && required >= self.funds {
            let reason = BlockReason::InsufficientFunds {
                cost,
                required,
                available: self.funds,
            };
            debug!(
                action = action.label(),
                cost,
                funds = self.funds,
                "action blocked: insufficient funds"
            );
            return Ok(self.block(action, reason));
        }

        let response = self.collaborator.attempt(action).await?;
        match response {
            ActionResponse::Rejected { reason } => {
                debug!(action = action.label(), %reason, "action blocked: rejected");
                Ok(self.block(action, BlockReason::Rejected { reason }))
            }
            response => {
                if response.succeeded() {
                    self.funds -= cost;
                }
                Ok(Attempt::Done(response))
            }
        }
    }

    fn block(&mut self, action: &Action, reason: BlockReason) -> Attempt {
        self.last_block = Some((action.label().to_owned(), reason.clone()));
        Attempt::Blocked(reason)
    }
}
