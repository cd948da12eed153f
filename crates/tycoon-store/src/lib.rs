//! Durable persistence for the Tycoon [`ProgressState`].
//!
//! The engine writes its progress record once at the end of every tick and
//! reads it back once at startup. The record is a single flat JSON document
//! stored under a fixed key; absence of the record means "start from the
//! beginning".
//!
//! # Backends
//!
//! ```text
//! ProgressStore (enum dispatch)
//!     |-- File       JSON file on local disk (default)
//!     |-- Memory     shared in-process cell (tests)
//!     +-- Dragonfly  Redis-compatible key (fred)
//! ```
//!
//! # Modules
//!
//! - [`file`] -- Atomic JSON file backend
//! - [`memory`] -- In-memory backend
//! - [`dragonfly`] -- `Dragonfly` backend
//! - [`error`] -- Shared error types
//!
//! [`ProgressState`]: tycoon_types::ProgressState

pub mod dragonfly;
pub mod error;
pub mod file;
pub mod memory;

use tycoon_types::ProgressState;

pub use dragonfly::DragonflyProgressStore;
pub use error::StoreError;
pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;

/// A progress store backend.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible.
#[derive(Clone)]
pub enum ProgressStore {
    /// JSON file on local disk.
    File(FileProgressStore),
    /// Shared in-memory cell.
    Memory(MemoryProgressStore),
    /// Key in a `Dragonfly` instance.
    Dragonfly(DragonflyProgressStore),
}

impl ProgressStore {
    /// Load the persisted record, or `None` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend is unreachable or the stored
    /// record cannot be decoded.
    pub async fn load(&self) -> Result<Option<ProgressState>, StoreError> {
        match self {
            Self::File(store) => store.load().await,
            Self::Memory(store) => Ok(store.load().await),
            Self::Dragonfly(store) => store.load().await,
        }
    }

    /// Persist the record, replacing whatever was stored before.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save(&self, state: &ProgressState) -> Result<(), StoreError> {
        match self {
            Self::File(store) => store.save(state).await,
            Self::Memory(store) => {
                store.save(state).await;
                Ok(())
            }
            Self::Dragonfly(store) => store.save(state).await,
        }
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory(_) => "memory",
            Self::Dragonfly(_) => "dragonfly",
        }
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(store) => f.debug_tuple("File").field(&store.path()).finish(),
            Self::Memory(_) => f.write_str("Memory"),
            Self::Dragonfly(store) => f.debug_tuple("Dragonfly").field(&store.key()).finish(),
        }
    }
}
