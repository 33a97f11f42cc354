use std::path::{Path, PathBuf};

use super::ProvisioningState;
use crate::errors::{ProvisionError, ProvisionResult};
use crate::util::write_atomic;

/// Whole-record JSON store for [`ProvisioningState`].
///
/// Reads never fail: a missing, empty or unparseable file is an empty
/// state, so provisioning stays resumable after a torn write. Writes replace
/// the file atomically.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ProvisioningState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No state file, starting empty");
                return ProvisioningState::default();
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Could not read state file ({}). Starting with empty state.", e
                );
                return ProvisioningState::default();
            }
        };

        if content.trim().is_empty() {
            return ProvisioningState::default();
        }

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Could not parse state file ({}). Starting with empty state.", e
                );
                ProvisioningState::default()
            }
        }
    }

    pub fn save(&self, state: &ProvisioningState) -> ProvisionResult<()> {
        let json = serde_json::to_vec(state)
            .map_err(|e| ProvisionError::Storage(format!("failed to encode state: {}", e)))?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), "Saved provisioning state");
        Ok(())
    }
}
