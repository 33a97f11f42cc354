//! Hardware-presence probes.
//!
//! Each probe turns an external command into a boolean right here, so
//! waits upstream only ever see typed readiness.

use std::sync::Arc;

use crate::errors::ProvisionResult;
use crate::options::{CanOptions, ProbeOptions};
use crate::runner::{CommandRunner, CommandSpec};

#[derive(Clone)]
pub struct HardwareProbes {
    runner: Arc<dyn CommandRunner>,
    probes: ProbeOptions,
    interface: String,
}

impl HardwareProbes {
    pub fn new(runner: Arc<dyn CommandRunner>, probes: &ProbeOptions, can: &CanOptions) -> Self {
        Self {
            runner,
            probes: probes.clone(),
            interface: can.interface.clone(),
        }
    }

    /// An STM32 is enumerated in DFU (bootloader) mode.
    pub async fn bootloader_present(&self) -> ProvisionResult<bool> {
        let spec = CommandSpec::from_argv(&self.probes.bootloader_list)?;
        let captured = self.runner.capture(&spec).await?;
        Ok(captured.stdout.contains(&self.probes.bootloader_marker))
    }

    /// The CAN network interface exists.
    pub async fn link_present(&self) -> ProvisionResult<bool> {
        let spec = CommandSpec::from_argv(&self.probes.link_show)?.arg(&self.interface);
        Ok(self.runner.capture(&spec).await?.success())
    }
}
