//! Configuration for OpenAMS provisioning.
//!
//! Every component receives its settings from [`ProvisionOptions`]; nothing
//! reads paths or intervals from the environment on its own. Options are
//! layered: built-in defaults, then `<home>/config.json`, then CLI flags.

use crate::errors::{ProvisionError, ProvisionResult};
use crate::layout::FilesystemLayout;
use crate::util::invoking_user;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the provisioning home directory.
pub const OPENAMS_HOME_ENV: &str = "OPENAMS_HOME";

/// Directory name under the user's home when no override is given.
pub const OPENAMS_DIR: &str = ".openams";

// ============================================================================
// Top-level options
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionOptions {
    /// Root of the state file, lock, logs and scratch files.
    #[serde(skip)]
    pub home_dir: PathBuf,

    /// Prefix privileged commands (package manager, systemctl, dfu-util,
    /// writes under /etc and /usr/local) with `sudo`.
    pub privileged: bool,

    pub poll: PollOptions,
    pub can: CanOptions,
    pub probes: ProbeOptions,
    pub host: HostOptions,
    pub firmware: FirmwareOptions,
    pub service: ServiceOptions,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            privileged: true,
            poll: PollOptions::default(),
            can: CanOptions::default(),
            probes: ProbeOptions::default(),
            host: HostOptions::default(),
            firmware: FirmwareOptions::default(),
            service: ServiceOptions::default(),
        }
    }
}

impl ProvisionOptions {
    /// Load options for `home_dir`, applying `<home>/config.json` when present.
    ///
    /// A missing config file yields the defaults. A config file that exists
    /// but does not parse is a configuration error, never silently ignored.
    pub fn load(home_dir: &Path) -> ProvisionResult<Self> {
        let layout = FilesystemLayout::new(home_dir.to_path_buf());
        let config_path = layout.config_file();

        let mut options = match std::fs::read_to_string(&config_path) {
            Ok(content) => serde_json::from_str::<ProvisionOptions>(&content).map_err(|e| {
                ProvisionError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProvisionOptions::default(),
            Err(e) => {
                return Err(ProvisionError::Config(format!(
                    "failed to read {}: {}",
                    config_path.display(),
                    e
                )));
            }
        };

        options.home_dir = home_dir.to_path_buf();
        tracing::debug!(home = %home_dir.display(), "Loaded provisioning options");
        Ok(options)
    }

    pub fn layout(&self) -> FilesystemLayout {
        FilesystemLayout::new(self.home_dir.clone())
    }
}

/// Resolve the home directory: `OPENAMS_HOME`, else `~/.openams`.
pub fn default_home_dir() -> PathBuf {
    if let Ok(home) = std::env::var(OPENAMS_HOME_ENV)
        && !home.is_empty()
    {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|h| h.join(OPENAMS_DIR))
        .unwrap_or_else(|| PathBuf::from("/var/lib/openams"))
}

fn user_home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"))
}

// ============================================================================
// Polling
// ============================================================================

/// Fixed polling cadence. There is no backoff: the awaited conditions are a
/// human plugging something in or a fixed enumeration delay.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOptions {
    /// Poll period for waits with an operator present.
    pub interactive_interval_ms: u64,

    /// Poll period for the continuation's waits.
    pub continuation_interval_ms: u64,

    /// Upper bound on each continuation wait.
    pub continuation_timeout_secs: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interactive_interval_ms: 1000,
            continuation_interval_ms: 2000,
            continuation_timeout_secs: 900,
        }
    }
}

impl PollOptions {
    pub fn interactive_interval(&self) -> Duration {
        Duration::from_millis(self.interactive_interval_ms)
    }

    pub fn continuation_interval(&self) -> Duration {
        Duration::from_millis(self.continuation_interval_ms)
    }

    pub fn continuation_timeout(&self) -> Duration {
        Duration::from_secs(self.continuation_timeout_secs)
    }
}

// ============================================================================
// CAN link
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CanOptions {
    pub interface: String,
    pub bitrate: u32,
    pub txqueuelen: u32,

    /// ifupdown drop-in directory receiving the interface stanza.
    pub interfaces_dir: PathBuf,
}

impl Default for CanOptions {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            bitrate: 1_000_000,
            txqueuelen: 1024,
            interfaces_dir: PathBuf::from("/etc/network/interfaces.d"),
        }
    }
}

// ============================================================================
// Probes
// ============================================================================

/// External status probes. Each is an argv vector; no shell is involved.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeOptions {
    /// Lists devices in DFU mode.
    pub bootloader_list: Vec<String>,

    /// Substring of `bootloader_list` output marking an STM32 in DFU mode.
    pub bootloader_marker: String,

    /// Prefix of the link probe; the interface name is appended.
    pub link_show: Vec<String>,

    /// Replaces the Klipper `canbus_query.py` invocation when set.
    pub identity_query: Option<Vec<String>>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            bootloader_list: vec!["dfu-util".to_string(), "-l".to_string()],
            bootloader_marker: "Found DFU: [0483:df11]".to_string(),
            link_show: vec!["ip".to_string(), "link".to_string(), "show".to_string()],
            identity_query: None,
        }
    }
}

// ============================================================================
// Host application (Klipper)
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HostOptions {
    /// systemd unit name of the host application.
    pub service_name: String,

    pub klipper_dir: PathBuf,
    pub klipper_repo: String,
    pub katapult_dir: PathBuf,
    pub katapult_repo: String,

    /// Interpreter used for Klipper's helper scripts.
    pub python: PathBuf,

    /// Directory holding `printer.cfg`.
    pub printer_config_dir: PathBuf,

    /// File name of the generated include.
    pub generated_config: String,
}

impl Default for HostOptions {
    fn default() -> Self {
        let home = user_home();
        Self {
            service_name: "klipper".to_string(),
            klipper_dir: home.join("klipper"),
            klipper_repo: "https://github.com/Klipper3d/klipper".to_string(),
            katapult_dir: home.join("katapult"),
            katapult_repo: "https://github.com/Arksine/katapult".to_string(),
            python: home.join("klippy-env").join("bin").join("python"),
            printer_config_dir: home.join("printer_data").join("config"),
            generated_config: "openams.cfg".to_string(),
        }
    }
}

impl HostOptions {
    pub fn printer_config(&self) -> PathBuf {
        self.printer_config_dir.join("printer.cfg")
    }

    pub fn generated_config_path(&self) -> PathBuf {
        self.printer_config_dir.join(&self.generated_config)
    }
}

// ============================================================================
// Firmware
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareOptions {
    /// Directory holding `.config-<image>-<board>-<mode>` build profiles.
    pub profile_dir: PathBuf,

    /// STM32CubeProgrammer CLI used to set option bytes. Looked up on
    /// `PATH` unless it contains a path separator.
    pub programmer: String,
}

impl Default for FirmwareOptions {
    fn default() -> Self {
        Self {
            profile_dir: user_home().join("openams").join("firmware"),
            programmer: "STM32_Programmer_CLI".to_string(),
        }
    }
}

// ============================================================================
// Continuation service
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    pub name: String,
    pub description: String,
    pub unit_dir: PathBuf,
    pub bin_dir: PathBuf,

    /// Non-privileged account the continuation runs as.
    pub user: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            name: "openams-daemon".to_string(),
            description: "OpenAMS CAN bus identity continuation".to_string(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            bin_dir: PathBuf::from("/usr/local/bin"),
            user: invoking_user(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let options = ProvisionOptions::load(temp.path()).unwrap();

        assert_eq!(options.home_dir, temp.path());
        assert_eq!(options.poll.continuation_timeout_secs, 900);
        assert_eq!(options.can.interface, "can0");
        assert_eq!(options.probes.bootloader_marker, "Found DFU: [0483:df11]");
    }

    #[test]
    fn test_load_partial_config_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.json"),
            r#"{"privileged": false, "poll": {"continuation_timeout_secs": 60}}"#,
        )
        .unwrap();

        let options = ProvisionOptions::load(temp.path()).unwrap();
        assert!(!options.privileged);
        assert_eq!(options.poll.continuation_timeout(), Duration::from_secs(60));
        assert_eq!(options.poll.continuation_interval(), Duration::from_secs(2));
        assert_eq!(options.service.name, "openams-daemon");
    }

    #[test]
    fn test_load_rejects_malformed_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.json"), "{ not json").unwrap();

        let err = ProvisionOptions::load(temp.path()).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }
}
