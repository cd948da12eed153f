//! Status API server for the Tycoon engine.
//!
//! An Axum HTTP server exposing what the engine is doing:
//!
//! - **REST endpoints** for the latest tick report, the persisted progress
//!   record, and recent history
//! - **`WebSocket` endpoint** (`/ws/ticks`) streaming every tick report via
//!   [`tokio::sync::broadcast`]
//!
//! The engine binary updates [`AppState`] from its tick callback; handlers
//! only read it, so the API never blocks the tick loop.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, spawn_server, start_server};
pub use state::{AppState, EngineStatus};
