//! In-memory backend.
//!
//! Clones share the same cell, so a test can hand one clone to the engine
//! and inspect what was persisted through another.

use std::sync::Arc;

use tokio::sync::RwLock;
use tycoon_types::ProgressState;

/// Progress held in a shared in-process cell.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    cell: Arc<RwLock<Option<ProgressState>>>,
    saves: Arc<RwLock<u64>>,
}

impl MemoryProgressStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a record, as if a previous run had saved it.
    pub fn with_state(state: ProgressState) -> Self {
        Self {
            cell: Arc::new(RwLock::new(Some(state))),
            saves: Arc::new(RwLock::new(0)),
        }
    }

    /// Current record, if any.
    pub async fn load(&self) -> Option<ProgressState> {
        self.cell.read().await.clone()
    }

    /// Replace the record.
    pub async fn save(&self, state: &ProgressState) {
        *self.cell.write().await = Some(state.clone());
        let mut saves = self.saves.write().await;
        *saves = saves.saturating_add(1);
    }

    /// Number of saves performed through any clone.
    pub async fn save_count(&self) -> u64 {
        *self.saves.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_the_record() {
        let store = MemoryProgressStore::new();
        let observer = store.clone();

        let mut state = ProgressState::new();
        state.mark_complete("seeded");
        store.save(&state).await;

        assert_eq!(observer.load().await, Some(state));
        assert_eq!(observer.save_count().await, 1);
    }
}
