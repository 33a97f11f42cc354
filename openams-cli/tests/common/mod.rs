#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Isolated provisioning home for one CLI invocation sequence.
pub struct TestContext {
    pub cmd: Command,
    pub home: PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Another command against the same home.
    pub fn new_cmd(&self) -> Command {
        command(&self.home)
    }

    pub fn write_config(&self, json: &str) {
        std::fs::write(self.home.join("config.json"), json).expect("Failed to write config.json");
    }

    pub fn write_state(&self, json: &str) {
        std::fs::write(self.home.join("state.json"), json).expect("Failed to write state.json");
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.home.join(relative)
    }
}

fn command(home: &Path) -> Command {
    let bin_path = env!("CARGO_BIN_EXE_openams");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("OPENAMS_HOME");
    cmd.env("RUST_LOG", "warn");
    cmd.arg("--home").arg(home).arg("--no-sudo");
    cmd
}

pub fn openams() -> TestContext {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let home = temp_dir.path().join("home");
    std::fs::create_dir_all(&home).expect("Failed to create home");

    TestContext {
        cmd: command(&home),
        home,
        _temp_dir: temp_dir,
    }
}
