use crate::errors::{ProvisionError, ProvisionResult};
use std::path::{Path, PathBuf};

/// Directory structure constants
pub mod files {
    /// Persisted provisioning state
    pub const STATE_FILE: &str = "state.json";

    /// Exclusive lock guarding the state file
    pub const LOCK_FILE: &str = ".lock";

    /// Optional user configuration
    pub const CONFIG_FILE: &str = "config.json";

    /// Subdirectory for log files
    pub const LOGS_DIR: &str = "logs";

    /// Durable log file name
    pub const LOG_FILE: &str = "openams.log";

    /// Scratch directory for files staged before a privileged install
    pub const TMP_DIR: &str = "tmp";
}

// ============================================================================
// FILESYSTEM LAYOUT (home directory)
// ============================================================================

#[derive(Clone, Debug)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Provisioning state: ~/.openams/state.json
    pub fn state_file(&self) -> PathBuf {
        self.home_dir.join(files::STATE_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.home_dir.join(files::LOCK_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.home_dir.join(files::CONFIG_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(files::LOGS_DIR)
    }

    /// Durable log: ~/.openams/logs/openams.log
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(files::LOG_FILE)
    }

    /// Scratch directory: ~/.openams/tmp
    ///
    /// Unit files and interface stanzas are rendered here and then
    /// installed into system directories by a (possibly elevated) command.
    pub fn temp_dir(&self) -> PathBuf {
        self.home_dir.join(files::TMP_DIR)
    }

    /// Create home and scratch directories.
    ///
    /// The logs directory is left to the logger, which tolerates failure.
    pub fn prepare(&self) -> ProvisionResult<()> {
        std::fs::create_dir_all(&self.home_dir)
            .map_err(|e| ProvisionError::Storage(format!("failed to create home: {e}")))?;

        std::fs::create_dir_all(self.temp_dir())
            .map_err(|e| ProvisionError::Storage(format!("failed to create tmp dir: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_derive_from_home() {
        let layout = FilesystemLayout::new(PathBuf::from("/srv/openams"));
        assert_eq!(layout.state_file(), PathBuf::from("/srv/openams/state.json"));
        assert_eq!(layout.lock_file(), PathBuf::from("/srv/openams/.lock"));
        assert_eq!(
            layout.log_file(),
            PathBuf::from("/srv/openams/logs/openams.log")
        );
    }

    #[test]
    fn test_prepare_creates_directories() {
        let temp = TempDir::new().unwrap();
        let layout = FilesystemLayout::new(temp.path().join("home"));
        layout.prepare().unwrap();

        assert!(layout.home_dir().is_dir());
        assert!(layout.temp_dir().is_dir());
    }
}
