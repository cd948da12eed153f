//! Phased progression engine for the Tycoon automation.
//!
//! This crate owns the per-tick cycle that drives a controlled entity
//! through a data-driven build-out plan: Snapshot, Step, Commit, Pricing.
//! Persistence lives in `tycoon-store`; the HTTP bridge and CLI live in the
//! `tycoon-engine` binary.
//!
//! # Modules
//!
//! - [`collaborator`] -- [`Collaborator`] and [`GangSurface`] traits. The
//!   in-process `ScriptedCollaborator` simulator is compiled for tests and
//!   behind the `testing` feature.
//! - [`executor`] -- Affordability-gated action execution.
//! - [`balancer`] -- Per-location deficit computation and top-up purchasing.
//! - [`pricing`] -- The ordered-rule price feedback controller.
//! - [`plan`] -- Plan and step definitions, including the built-in plans.
//! - [`steps`] -- One handler per step kind.
//! - [`phase`] -- Step outcomes and forward-only position tracking.
//! - [`tick`] -- A single engine tick and its report.
//! - [`runner`] -- The persisted tick loop and the gang loop.
//! - [`gang`] -- The gang steady-state controller.
//! - [`config`] -- Configuration loading from `tycoon.yaml`.
//! - [`error`] -- Engine error types.
//!
//! [`Collaborator`]: collaborator::Collaborator
//! [`GangSurface`]: collaborator::GangSurface

pub mod balancer;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod executor;
pub mod gang;
pub mod phase;
pub mod plan;
pub mod pricing;
pub mod runner;
pub mod steps;
pub mod tick;

pub use error::EngineError;
pub use phase::{Outcome, PhaseController};
pub use plan::Plan;
pub use runner::{NoOpCallback, RunnerError, TickCallback};
pub use tick::{TickOutcome, TickReport, run_tick};
