//! Integration tests for the persisted record across process boundaries.

use openams::state::LockMode;
use openams::{ProvisioningState, StateLock, StateStore};
use proptest::prelude::*;
use tempfile::TempDir;

fn store(temp: &TempDir) -> StateStore {
    StateStore::new(temp.path().join("state.json"))
}

#[test]
fn truncated_record_reads_as_empty() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    std::fs::write(store.path(), r#"{"fps_uuid": "1a2"#).unwrap();

    assert!(store.load().is_empty());
}

#[test]
fn record_written_by_one_store_is_read_by_another() {
    let temp = TempDir::new().unwrap();
    let mut state = ProvisioningState::new();
    state.record_fps("1A2B3C".parse().unwrap()).unwrap();
    store(&temp).save(&state).unwrap();

    let raw = std::fs::read_to_string(temp.path().join("state.json")).unwrap();
    assert_eq!(raw.trim(), r#"{"fps_uuid":"1a2b3c"}"#);
    assert_eq!(store(&temp).load(), state);
}

#[test]
fn front_end_lock_fails_fast_while_held() {
    let temp = TempDir::new().unwrap();
    let _held = StateLock::acquire(temp.path(), LockMode::Wait).unwrap();

    let err = StateLock::acquire(temp.path(), LockMode::TryOnce).unwrap_err();
    assert!(err.to_string().contains("Another provisioning process"));
}

proptest! {
    #[test]
    fn save_of_load_is_identity(fps in proptest::option::of("[0-9a-f]{12}"), mainboard in proptest::option::of("[0-9a-f]{12}")) {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let mut state = ProvisioningState::new();
        if let Some(fps) = &fps {
            state.record_fps(fps.parse().unwrap()).unwrap();
        }
        if let Some(mainboard) = &mainboard
            && Some(mainboard) != fps.as_ref()
        {
            state.record_mainboard(mainboard.parse().unwrap()).unwrap();
        }

        store.save(&state).unwrap();
        let loaded = store.load();
        store.save(&loaded).unwrap();
        prop_assert_eq!(store.load(), state);
    }
}
