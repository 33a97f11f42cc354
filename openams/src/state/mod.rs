//! Persisted provisioning progress.
//!
//! The front end records the FPS identity; the continuation records the
//! mainboard identity. Each field is set once. Re-runs treat a set field as
//! a completed checkpoint instead of deriving it again.

mod lock;
mod store;

pub use lock::{LockMode, StateLock};
pub use store::StateStore;

use crate::discovery::Identifier;
use crate::errors::{ProvisionError, ProvisionResult};
use serde::{Deserialize, Serialize};

/// The single persisted record, serialized as
/// `{"fps_uuid": "...", "mainboard_uuid": "..."}` with absent keys for
/// unknown identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningState {
    #[serde(rename = "fps_uuid", default, skip_serializing_if = "Option::is_none")]
    fps: Option<Identifier>,

    #[serde(
        rename = "mainboard_uuid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    mainboard: Option<Identifier>,
}

impl ProvisioningState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fps(&self) -> Option<&Identifier> {
        self.fps.as_ref()
    }

    pub fn mainboard(&self) -> Option<&Identifier> {
        self.mainboard.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.fps.is_none() && self.mainboard.is_none()
    }

    /// Both boards are identified.
    pub fn is_complete(&self) -> bool {
        self.fps.is_some() && self.mainboard.is_some()
    }

    /// Record the sensor board identity.
    ///
    /// Returns `Ok(false)` when the same identity is already recorded.
    /// A different identity is rejected: the field is immutable once set.
    pub fn record_fps(&mut self, id: Identifier) -> ProvisionResult<bool> {
        set_once("fps_uuid", &mut self.fps, id)
    }

    /// Record the mainboard identity. It must differ from the FPS identity.
    pub fn record_mainboard(&mut self, id: Identifier) -> ProvisionResult<bool> {
        if self.fps.as_ref() == Some(&id) {
            return Err(ProvisionError::InvalidState(format!(
                "mainboard identity {} equals the FPS identity",
                id
            )));
        }
        set_once("mainboard_uuid", &mut self.mainboard, id)
    }

    /// (component, identifier or `N/A`) rows for summaries.
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let show = |id: Option<&Identifier>| id.map_or_else(|| "N/A".to_string(), |i| i.to_string());
        vec![("FPS", show(self.fps())), ("Mainboard", show(self.mainboard()))]
    }
}

fn set_once(
    field: &str,
    slot: &mut Option<Identifier>,
    id: Identifier,
) -> ProvisionResult<bool> {
    match slot {
        None => {
            *slot = Some(id);
            Ok(true)
        }
        Some(existing) if *existing == id => Ok(false),
        Some(existing) => Err(ProvisionError::InvalidState(format!(
            "{} already recorded as {}, refusing to replace it with {}",
            field, existing, id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        s.parse().unwrap()
    }

    #[test]
    fn test_serializes_with_wire_keys() {
        let mut state = ProvisioningState::new();
        assert_eq!(serde_json::to_string(&state).unwrap(), "{}");

        state.record_fps(id("1a2b3c")).unwrap();
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"fps_uuid":"1a2b3c"}"#
        );

        state.record_mainboard(id("4d5e6f")).unwrap();
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"fps_uuid":"1a2b3c","mainboard_uuid":"4d5e6f"}"#
        );
    }

    #[test]
    fn test_fps_is_set_once() {
        let mut state = ProvisioningState::new();
        assert!(state.record_fps(id("1a2b3c")).unwrap());
        assert!(!state.record_fps(id("1A2B3C")).unwrap());

        let err = state.record_fps(id("ffff")).unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidState(_)));
        assert_eq!(state.fps(), Some(&id("1a2b3c")));
    }

    #[test]
    fn test_mainboard_must_differ_from_fps() {
        let mut state = ProvisioningState::new();
        state.record_fps(id("1a2b3c")).unwrap();

        assert!(state.record_mainboard(id("1a2b3c")).is_err());
        assert!(state.mainboard().is_none());

        assert!(state.record_mainboard(id("4d5e6f")).unwrap());
        assert!(state.is_complete());
    }

    #[test]
    fn test_summary_rows() {
        let mut state = ProvisioningState::new();
        state.record_fps(id("1a2b3c")).unwrap();
        assert_eq!(
            state.summary_rows(),
            vec![
                ("FPS", "1a2b3c".to_string()),
                ("Mainboard", "N/A".to_string())
            ]
        );
    }
}
