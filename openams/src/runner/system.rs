use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::stream::{echo_and_log, forward_lines};
use super::{Captured, CommandRunner, CommandSpec, OutputMode};
use crate::errors::{ProvisionError, ProvisionResult};

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    mode: OutputMode,
}

impl SystemRunner {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.get_args());
        if let Some(dir) = spec.get_current_dir() {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn spawn_error(spec: &CommandSpec, err: std::io::Error) -> ProvisionError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ProvisionError::ToolMissing(spec.program().to_string())
    } else {
        ProvisionError::Io(err)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> ProvisionResult<i32> {
        tracing::info!("Running: {}", spec);
        let mut cmd = Self::command(spec);

        let status = match self.mode {
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
                cmd.status().await.map_err(|e| spawn_error(spec, e))?
            }
            OutputMode::Stream => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
                let mut child = cmd.spawn().map_err(|e| spawn_error(spec, e))?;

                match (child.stdout.take(), child.stderr.take()) {
                    (Some(stdout), Some(stderr)) => {
                        forward_lines(stdout, stderr, echo_and_log).await;
                    }
                    _ => tracing::warn!(command = %spec, "Child pipes unavailable; output not mirrored"),
                }
                child.wait().await?
            }
        };

        let code = exit_code(status);
        if code != 0 {
            tracing::warn!(command = %spec, code, "Command exited with non-zero status");
        }
        Ok(code)
    }

    async fn capture(&self, spec: &CommandSpec) -> ProvisionResult<Captured> {
        tracing::debug!("Probing: {}", spec);
        let output = Self::command(spec)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(spec, e))?;

        Ok(Captured {
            code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
