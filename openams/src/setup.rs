//! Build and flash toolchain installation.

use std::sync::Arc;

use crate::errors::ProvisionResult;
use crate::runner::{CommandRunner, CommandSpec};
use crate::util::find_in_path;

/// (tool looked up on `PATH`, package providing it)
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("arm-none-eabi-gcc", "gcc-arm-none-eabi"),
    ("make", "make"),
    ("dfu-util", "dfu-util"),
    ("git", "git"),
    ("python3", "python3-venv"),
];

/// Packages whose tool is not on `PATH`.
pub fn missing_packages() -> Vec<&'static str> {
    REQUIRED_TOOLS
        .iter()
        .filter(|(tool, _)| find_in_path(tool).is_none())
        .map(|(_, package)| *package)
        .collect()
}

pub struct PackageInstaller {
    runner: Arc<dyn CommandRunner>,
    privileged: bool,
}

impl PackageInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>, privileged: bool) -> Self {
        Self { runner, privileged }
    }

    /// Install whatever is missing. Returns the packages installed.
    pub async fn ensure(&self) -> ProvisionResult<Vec<&'static str>> {
        let missing = missing_packages();
        if missing.is_empty() {
            tracing::info!("Build and flash tools already installed");
            return Ok(missing);
        }
        self.install(&missing).await?;
        Ok(missing)
    }

    pub async fn install(&self, packages: &[&str]) -> ProvisionResult<()> {
        tracing::info!(packages = %packages.join(" "), "Installing system packages");

        let code = self
            .runner
            .run(&CommandSpec::new("apt-get").arg("update").elevated(self.privileged))
            .await?;
        if code != 0 {
            tracing::warn!(code, "Package index refresh failed, installing from cached index");
        }

        self.runner
            .run_ok(
                &CommandSpec::new("apt-get")
                    .args(["install", "-y"])
                    .args(packages.iter().copied())
                    .elevated(self.privileged),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProvisionError;
    use crate::runner::Captured;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct AptRunner {
        update_code: i32,
        install_code: i32,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for AptRunner {
        async fn run(&self, spec: &CommandSpec) -> ProvisionResult<i32> {
            let line = spec.to_string();
            self.calls.lock().unwrap().push(line.clone());
            Ok(if line.contains("update") {
                self.update_code
            } else {
                self.install_code
            })
        }

        async fn capture(&self, _spec: &CommandSpec) -> ProvisionResult<Captured> {
            Ok(Captured::default())
        }
    }

    #[tokio::test]
    async fn test_failed_update_still_installs() {
        let runner = Arc::new(AptRunner {
            update_code: 100,
            install_code: 0,
            calls: Mutex::new(Vec::new()),
        });
        PackageInstaller::new(runner.clone(), true)
            .install(&["make", "git"])
            .await
            .unwrap();

        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec!["sudo apt-get update", "sudo apt-get install -y make git"]
        );
    }

    #[tokio::test]
    async fn test_failed_install_is_fatal() {
        let runner = Arc::new(AptRunner {
            update_code: 0,
            install_code: 100,
            calls: Mutex::new(Vec::new()),
        });
        let err = PackageInstaller::new(runner, false)
            .install(&["dfu-util"])
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::CommandFailed { code: 100, .. }));
    }
}
