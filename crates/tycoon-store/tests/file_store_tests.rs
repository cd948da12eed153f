//! Integration tests for the JSON file progress store.

#![allow(clippy::unwrap_used)]

use tycoon_store::{FileProgressStore, ProgressStore, StoreError};
use tycoon_types::{CycleState, ProgressState};

#[tokio::test]
async fn missing_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProgressStore::new(dir.path().join("progress.json"));
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_load_preserves_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProgressStore::File(FileProgressStore::new(
        dir.path().join("nested").join("progress.json"),
    ));

    let mut state = ProgressState::new();
    state.advance_phase();
    state.advance_phase();
    state.advance_sub_phase();
    state.record_milestone(1);
    state.mark_complete("materials_round_one");
    state.peak_offer = 1.5e11;
    state.cycles_waited = 3;
    state.last_cycle_state = Some(CycleState::Export);

    store.save(&state).await.unwrap();
    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded, state);
}

#[tokio::test]
async fn save_overwrites_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let store = FileProgressStore::new(&path);

    let mut state = ProgressState::new();
    store.save(&state).await.unwrap();
    state.advance_sub_phase();
    store.save(&state).await.unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.position(), (0, 1));
    assert!(!dir.path().join("progress.json.tmp").exists());
}

#[tokio::test]
async fn flat_record_from_an_older_run_still_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    std::fs::write(
        &path,
        r#"{"phase":4,"sub_phase":0,"investment_round":2,"completion_flags":["round_one","round_two"]}"#,
    )
    .unwrap();

    let loaded = FileProgressStore::new(&path).load().await.unwrap().unwrap();
    assert_eq!(loaded.position(), (4, 0));
    assert_eq!(loaded.investment_round, 2);
    assert!(loaded.is_complete("round_two"));
    assert!(loaded.last_cycle_state.is_none());
}

#[tokio::test]
async fn corrupt_record_is_an_error_not_a_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    std::fs::write(&path, "{ not json").unwrap();

    let result = FileProgressStore::new(&path).load().await;
    assert!(matches!(result, Err(StoreError::Serialization(_))));
}
