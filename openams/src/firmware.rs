//! Firmware build and flash chain.
//!
//! Each board receives two images: the Katapult bootloader at the start of
//! flash (with a mass erase) and Klipper at the 8 KiB application offset.
//! Both are built from upstream checkouts using a prepared `.config`
//! profile per image, board and transport mode.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{ProvisionError, ProvisionResult};
use crate::options::{FirmwareOptions, HostOptions};
use crate::poll::Poller;
use crate::probe::HardwareProbes;
use crate::runner::{CommandRunner, CommandSpec};
use crate::util::find_in_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Fps,
    Mainboard,
}

impl Board {
    pub fn as_str(&self) -> &'static str {
        match self {
            Board::Fps => "fps",
            Board::Mainboard => "mainboard",
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Board {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fps" => Ok(Board::Fps),
            "mainboard" | "openams" => Ok(Board::Mainboard),
            other => Err(ProvisionError::Config(format!(
                "unknown board '{}' (expected fps or mainboard)",
                other
            ))),
        }
    }
}

/// How the board talks to the host once Klipper runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    /// USB-to-CAN bridge: the board itself is the host's CAN adapter.
    Bridge,
    /// Plain CAN node behind an existing adapter.
    Canbus,
}

impl FlashMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashMode::Bridge => "bridge",
            FlashMode::Canbus => "canbus",
        }
    }
}

impl fmt::Display for FlashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlashMode {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bridge" => Ok(FlashMode::Bridge),
            "canbus" => Ok(FlashMode::Canbus),
            other => Err(ProvisionError::Config(format!(
                "unknown mode '{}' (expected bridge or canbus)",
                other
            ))),
        }
    }
}

/// What to do when an optional external tool is not installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolPolicy {
    /// Missing tool is fatal.
    #[default]
    Require,
    /// Skip the sub-step with a warning.
    AllowMissing,
}

/// One of the two images flashed onto a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Image {
    Katapult,
    Klipper,
}

impl Image {
    pub fn as_str(&self) -> &'static str {
        match self {
            Image::Katapult => "katapult",
            Image::Klipper => "klipper",
        }
    }

    /// DFU target address.
    pub fn dfu_target(&self) -> &'static str {
        match self {
            Image::Katapult => "0x08000000:force:mass-erase",
            Image::Klipper => "0x08002000",
        }
    }

    fn artifact_name(&self) -> String {
        format!("{}.bin", self.as_str())
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployRequest {
    pub board: Board,
    pub mode: FlashMode,
    pub programmer: ToolPolicy,
}

#[derive(Clone)]
pub struct FirmwareDeployer {
    runner: Arc<dyn CommandRunner>,
    host: HostOptions,
    firmware: FirmwareOptions,
    probes: HardwareProbes,
    poller: Poller,
    privileged: bool,
}

impl FirmwareDeployer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        host: &HostOptions,
        firmware: &FirmwareOptions,
        probes: HardwareProbes,
        poller: Poller,
        privileged: bool,
    ) -> Self {
        Self {
            runner,
            host: host.clone(),
            firmware: firmware.clone(),
            probes,
            poller,
            privileged,
        }
    }

    /// Build and flash both images onto the board in DFU mode.
    pub async fn deploy(&self, request: &DeployRequest) -> ProvisionResult<()> {
        tracing::info!(
            board = %request.board,
            mode = %request.mode,
            "Deploying firmware"
        );

        let katapult = self.build(Image::Katapult, request).await?;
        self.wait_for_bootloader().await?;
        self.set_option_bytes(request.programmer).await?;
        self.flash(Image::Katapult, &katapult).await?;

        let klipper = self.build(Image::Klipper, request).await?;
        self.flash(Image::Klipper, &klipper).await?;

        tracing::info!(board = %request.board, "Firmware deployed");
        Ok(())
    }

    /// Block until an STM32 enumerates in DFU mode.
    pub async fn wait_for_bootloader(&self) -> ProvisionResult<()> {
        let probes = &self.probes;
        self.poller
            .require_true("STM32 device in DFU mode", || probes.bootloader_present())
            .await
    }

    fn source_dir(&self, image: Image) -> &Path {
        match image {
            Image::Katapult => &self.host.katapult_dir,
            Image::Klipper => &self.host.klipper_dir,
        }
    }

    fn source_repo(&self, image: Image) -> &str {
        match image {
            Image::Katapult => &self.host.katapult_repo,
            Image::Klipper => &self.host.klipper_repo,
        }
    }

    /// `.config-<image>-<board>-<mode>` in the profile directory.
    pub fn profile_path(&self, image: Image, request: &DeployRequest) -> PathBuf {
        self.firmware.profile_dir.join(format!(
            ".config-{}-{}-{}",
            image, request.board, request.mode
        ))
    }

    /// Clone the checkout, or update an existing one.
    ///
    /// A failed update of an existing checkout only warns; the tree on disk
    /// is still buildable.
    async fn sync_source(&self, image: Image) -> ProvisionResult<()> {
        let dir = self.source_dir(image);
        if dir.is_dir() {
            tracing::info!(dir = %dir.display(), "Updating {}", image);
            let code = self
                .runner
                .run(&CommandSpec::new("git").arg("-C").path_arg(dir).arg("pull"))
                .await?;
            if code != 0 {
                tracing::warn!(code, "git pull failed for {}, building existing tree", image);
            }
            return Ok(());
        }

        tracing::info!(dir = %dir.display(), "Cloning {}", image);
        self.runner
            .run_ok(
                &CommandSpec::new("git")
                    .arg("clone")
                    .arg(self.source_repo(image))
                    .path_arg(dir),
            )
            .await
    }

    /// Check out, configure and build `image`. Returns the artifact path.
    pub async fn build(&self, image: Image, request: &DeployRequest) -> ProvisionResult<PathBuf> {
        self.sync_source(image).await?;

        let dir = self.source_dir(image);
        let profile = self.profile_path(image, request);
        if !profile.is_file() {
            return Err(ProvisionError::PreconditionUnmet(format!(
                "build profile {} not found",
                profile.display()
            )));
        }
        tracing::info!(profile = %profile.display(), "Using {} configuration", image);
        std::fs::copy(&profile, dir.join(".config")).map_err(|e| {
            ProvisionError::Storage(format!(
                "failed to copy {} into {}: {}",
                profile.display(),
                dir.display(),
                e
            ))
        })?;

        tracing::info!("Building {}", image);
        self.runner
            .run_ok(&CommandSpec::new("make").current_dir(dir))
            .await?;

        let artifact = dir.join("out").join(image.artifact_name());
        if !artifact.is_file() {
            return Err(ProvisionError::PreconditionUnmet(format!(
                "{} build finished but {} is missing",
                image,
                artifact.display()
            )));
        }
        Ok(artifact)
    }

    /// Clear `nBOOT_SEL` so the BOOT0 pin selects the bootloader.
    ///
    /// Returns whether the option bytes were written.
    pub async fn set_option_bytes(&self, policy: ToolPolicy) -> ProvisionResult<bool> {
        let Some(programmer) = find_in_path(&self.firmware.programmer) else {
            return match policy {
                ToolPolicy::Require => Err(ProvisionError::ToolMissing(
                    self.firmware.programmer.clone(),
                )),
                ToolPolicy::AllowMissing => {
                    tracing::warn!(
                        tool = %self.firmware.programmer,
                        "Programmer not installed, leaving option bytes unchanged"
                    );
                    Ok(false)
                }
            };
        };

        tracing::info!(programmer = %programmer.display(), "Setting option bytes (nBOOT_SEL=0)");
        self.runner
            .run_ok(
                &CommandSpec::new(programmer.display().to_string())
                    .args(["-c", "port=USB1", "-ob", "nBOOT_SEL=0"])
                    .elevated(self.privileged),
            )
            .await?;
        Ok(true)
    }

    pub async fn flash(&self, image: Image, artifact: &Path) -> ProvisionResult<()> {
        tracing::info!(target_addr = image.dfu_target(), "Flashing {}", image);
        self.runner
            .run_ok(
                &CommandSpec::new("dfu-util")
                    .args(["-a", "0", "-s", image.dfu_target(), "-D"])
                    .path_arg(artifact)
                    .elevated(self.privileged),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CanOptions, ProbeOptions};
    use crate::runner::Captured;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Every command succeeds; `dfu-util -l` reports a device.
    #[derive(Default)]
    struct DfuReadyRunner {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for DfuReadyRunner {
        async fn run(&self, spec: &CommandSpec) -> ProvisionResult<i32> {
            self.calls.lock().unwrap().push(spec.to_string());
            Ok(0)
        }

        async fn capture(&self, spec: &CommandSpec) -> ProvisionResult<Captured> {
            self.calls.lock().unwrap().push(spec.to_string());
            Ok(Captured {
                code: 0,
                stdout: "Found DFU: [0483:df11] ver=0200, devnum=5\n".to_string(),
            })
        }
    }

    struct Fixture {
        _temp: TempDir,
        host: HostOptions,
        firmware: FirmwareOptions,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let host = HostOptions {
            klipper_dir: temp.path().join("klipper"),
            katapult_dir: temp.path().join("katapult"),
            ..HostOptions::default()
        };
        let firmware = FirmwareOptions {
            profile_dir: temp.path().join("profiles"),
            programmer: temp.path().join("bin").join("absent").display().to_string(),
        };
        std::fs::create_dir_all(&firmware.profile_dir).unwrap();
        for image in ["katapult", "klipper"] {
            let out = temp.path().join(image).join("out");
            std::fs::create_dir_all(&out).unwrap();
            std::fs::write(out.join(format!("{image}.bin")), b"bin").unwrap();
            std::fs::write(
                firmware.profile_dir.join(format!(".config-{image}-fps-bridge")),
                "CONFIG_MACH_STM32=y\n",
            )
            .unwrap();
        }
        Fixture {
            _temp: temp,
            host,
            firmware,
        }
    }

    fn deployer(runner: Arc<dyn CommandRunner>, fx: &Fixture) -> FirmwareDeployer {
        let probes = HardwareProbes::new(
            runner.clone(),
            &ProbeOptions::default(),
            &CanOptions::default(),
        );
        FirmwareDeployer::new(
            runner,
            &fx.host,
            &fx.firmware,
            probes,
            Poller::new(Duration::from_millis(10)),
            true,
        )
    }

    const FPS_BRIDGE: DeployRequest = DeployRequest {
        board: Board::Fps,
        mode: FlashMode::Bridge,
        programmer: ToolPolicy::AllowMissing,
    };

    #[test]
    fn test_parse_board_and_mode() {
        assert_eq!("FPS".parse::<Board>().unwrap(), Board::Fps);
        assert_eq!("openams".parse::<Board>().unwrap(), Board::Mainboard);
        assert_eq!("canbus".parse::<FlashMode>().unwrap(), FlashMode::Canbus);
        assert!("usb".parse::<FlashMode>().is_err());
    }

    #[tokio::test]
    async fn test_deploy_flashes_bootloader_then_application() {
        let fx = fixture();
        let runner = Arc::new(DfuReadyRunner::default());
        deployer(runner.clone(), &fx).deploy(&FPS_BRIDGE).await.unwrap();

        let calls = runner.calls.lock().unwrap().clone();
        let flashes: Vec<&String> = calls.iter().filter(|c| c.contains("dfu-util -a")).collect();
        assert_eq!(flashes.len(), 2);
        assert!(flashes[0].starts_with("sudo dfu-util -a 0 -s 0x08000000:force:mass-erase -D"));
        assert!(flashes[0].ends_with("katapult.bin"));
        assert!(flashes[1].starts_with("sudo dfu-util -a 0 -s 0x08002000 -D"));
        assert!(flashes[1].ends_with("klipper.bin"));

        let config = fx.host.klipper_dir.join(".config");
        assert_eq!(std::fs::read_to_string(config).unwrap(), "CONFIG_MACH_STM32=y\n");
    }

    #[tokio::test]
    async fn test_missing_profile_is_precondition_unmet() {
        let fx = fixture();
        let runner = Arc::new(DfuReadyRunner::default());
        let request = DeployRequest {
            mode: FlashMode::Canbus,
            ..FPS_BRIDGE
        };

        let err = deployer(runner, &fx).deploy(&request).await.unwrap_err();
        assert!(matches!(err, ProvisionError::PreconditionUnmet(_)));
        assert!(err.to_string().contains(".config-katapult-fps-canbus"));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_precondition_unmet() {
        let fx = fixture();
        std::fs::remove_file(fx.host.katapult_dir.join("out").join("katapult.bin")).unwrap();
        let runner = Arc::new(DfuReadyRunner::default());

        let err = deployer(runner.clone(), &fx)
            .build(Image::Katapult, &FPS_BRIDGE)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("katapult.bin is missing"));
    }

    #[tokio::test]
    async fn test_programmer_policy() {
        let fx = fixture();
        let runner = Arc::new(DfuReadyRunner::default());
        let deployer = deployer(runner.clone(), &fx);

        assert!(!deployer.set_option_bytes(ToolPolicy::AllowMissing).await.unwrap());
        let err = deployer.set_option_bytes(ToolPolicy::Require).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ToolMissing(_)));
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
