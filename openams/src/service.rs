//! systemd unit lifecycle.
//!
//! Installs the continuation as an unattended service so it survives the
//! host reboot, and removes it again once the continuation has finished.
//! The host application's unit (Klipper) is driven through the same verbs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{ProvisionError, ProvisionResult};
use crate::options::ServiceOptions;
use crate::runner::{CommandRunner, CommandSpec};
use crate::util::stage_file;

/// Declarative description of an unattended unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub name: String,
    pub description: String,
    pub exec_start: Vec<String>,
    pub user: String,
    pub environment: Vec<(String, String)>,
}

impl UnitSpec {
    pub fn unit_name(&self) -> String {
        unit_name(&self.name)
    }

    /// Render the unit file.
    ///
    /// Restart is bounded by the start limit so a continuation that timed
    /// out does not spin forever.
    pub fn render(&self) -> String {
        let mut unit = String::new();
        unit.push_str("[Unit]\n");
        unit.push_str(&format!("Description={}\n", self.description));
        unit.push_str("Wants=network-online.target\n");
        unit.push_str("After=network-online.target network.target\n");
        unit.push_str("StartLimitIntervalSec=3600\n");
        unit.push_str("StartLimitBurst=3\n");
        unit.push('\n');
        unit.push_str("[Service]\n");
        unit.push_str("Type=simple\n");
        for (key, value) in &self.environment {
            unit.push_str(&format!("Environment=\"{}={}\"\n", key, value));
        }
        unit.push_str(&format!("ExecStart={}\n", self.exec_start.join(" ")));
        unit.push_str("Restart=on-failure\n");
        unit.push_str("RestartSec=10\n");
        unit.push_str(&format!("User={}\n", self.user));
        unit.push('\n');
        unit.push_str("[Install]\n");
        unit.push_str("WantedBy=multi-user.target\n");
        unit
    }
}

fn unit_name(name: &str) -> String {
    if name.ends_with(".service") {
        name.to_string()
    } else {
        format!("{}.service", name)
    }
}

#[derive(Clone)]
pub struct ServiceManager {
    runner: Arc<dyn CommandRunner>,
    options: ServiceOptions,
    privileged: bool,
    scratch_dir: PathBuf,
}

impl ServiceManager {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        options: &ServiceOptions,
        privileged: bool,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            runner,
            options: options.clone(),
            privileged,
            scratch_dir,
        }
    }

    /// Where the unit file for `name` lives.
    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.options.unit_dir.join(unit_name(name))
    }

    /// Where the executable for `name` is installed.
    pub fn binary_path(&self, name: &str) -> PathBuf {
        self.options.bin_dir.join(name)
    }

    /// The continuation's unit: this program, copied, run with `continue`.
    pub fn continuation_unit(&self, home_dir: &Path) -> UnitSpec {
        let name = self.options.name.clone();
        UnitSpec {
            exec_start: vec![
                self.binary_path(&name).display().to_string(),
                "continue".to_string(),
                "--home".to_string(),
                home_dir.display().to_string(),
            ],
            description: self.options.description.clone(),
            user: self.options.user.clone(),
            environment: vec![("RUST_LOG".to_string(), "info".to_string())],
            name,
        }
    }

    fn systemctl<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("systemctl")
            .args(args)
            .elevated(self.privileged)
    }

    /// Copy `binary`, write the unit, enable and start it.
    pub async fn install(&self, binary: &Path, unit: &UnitSpec) -> ProvisionResult<()> {
        if !binary.is_file() {
            return Err(ProvisionError::PreconditionUnmet(format!(
                "service executable {} not found",
                binary.display()
            )));
        }

        let binary_dst = self.binary_path(&unit.name);
        let unit_dst = self.unit_path(&unit.name);
        tracing::info!(
            unit = %unit.unit_name(),
            binary = %binary_dst.display(),
            "Installing service"
        );

        self.runner
            .run_ok(
                &CommandSpec::new("install")
                    .args(["-m", "0755"])
                    .path_arg(binary)
                    .path_arg(&binary_dst)
                    .elevated(self.privileged),
            )
            .await?;

        let staged = stage_file(&self.scratch_dir, &unit.render())?;
        self.runner
            .run_ok(
                &CommandSpec::new("install")
                    .args(["-m", "0644"])
                    .path_arg(staged.path())
                    .path_arg(&unit_dst)
                    .elevated(self.privileged),
            )
            .await?;

        self.runner.run_ok(&self.systemctl(["daemon-reload"])).await?;
        self.runner
            .run_ok(&self.systemctl(["enable", "--now", unit.unit_name().as_str()]))
            .await?;

        tracing::info!(unit = %unit.unit_name(), "Service installed and started");
        Ok(())
    }

    /// Disable the unit and delete its unit file and executable.
    ///
    /// The stop is queued last and without blocking: when the continuation
    /// removes itself, that stop ends this very process.
    pub async fn uninstall(&self, name: &str) -> ProvisionResult<()> {
        let unit = unit_name(name);
        tracing::info!(unit = %unit, "Uninstalling service");

        let disabled = self.runner.run(&self.systemctl(["disable", unit.as_str()])).await?;
        if disabled != 0 {
            tracing::warn!(unit = %unit, "Service was not enabled");
        }

        for path in [self.unit_path(name), self.binary_path(name)] {
            self.runner
                .run_ok(
                    &CommandSpec::new("rm")
                        .arg("-f")
                        .path_arg(&path)
                        .elevated(self.privileged),
                )
                .await?;
        }

        self.runner.run_ok(&self.systemctl(["daemon-reload"])).await?;
        tracing::info!(unit = %unit, "Service uninstalled");

        let stopped = self
            .runner
            .run(&self.systemctl(["stop", "--no-block", unit.as_str()]))
            .await?;
        if stopped != 0 {
            tracing::debug!(unit = %unit, "Service was not running");
        }
        Ok(())
    }

    pub async fn is_active(&self, name: &str) -> ProvisionResult<bool> {
        let captured = self
            .runner
            .capture(&CommandSpec::new("systemctl").args(["is-active", unit_name(name).as_str()]))
            .await?;
        Ok(captured.stdout.trim() == "active")
    }

    pub async fn stop(&self, name: &str) -> ProvisionResult<()> {
        self.runner
            .run_ok(&self.systemctl(["stop", unit_name(name).as_str()]))
            .await
    }

    pub async fn enable_and_start(&self, name: &str) -> ProvisionResult<()> {
        let unit = unit_name(name);
        self.runner
            .run_ok(&self.systemctl(["enable", unit.as_str()]))
            .await?;
        self.runner
            .run_ok(&self.systemctl(["start", unit.as_str()]))
            .await
    }
}
