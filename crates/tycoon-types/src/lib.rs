//! Shared type definitions for the Tycoon progression engine.
//!
//! This crate is the single source of truth for the data that flows between
//! the engine, the progress store, the status API and the bridge to the
//! controlled entity. Everything here is plain `serde` data with no I/O.
//!
//! # Modules
//!
//! - [`snapshot`] -- Read-only per-tick view of the controlled entity
//! - [`progress`] -- The persisted, resumable progression record
//! - [`actions`] -- The mutating action vocabulary and its responses
//! - [`price`] -- Exact sell-price multipliers and their `MP*x` wire form
//! - [`gang`] -- Views and actions for the gang steady-state controller

pub mod actions;
pub mod gang;
pub mod price;
pub mod progress;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use actions::{Action, ActionResponse, PurchaseMode};
pub use gang::{AscensionView, GangAction, GangView, MemberView, RivalView};
pub use price::{ObservedPrice, PriceMultiplier, PriceParseError};
pub use progress::ProgressState;
pub use snapshot::{
    CycleState, DivisionView, LocationView, MilestoneOffer, ResourceView, SellPolicy, Snapshot,
    StaffingView, StorageView,
};
