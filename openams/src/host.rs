//! Klipper host application.
//!
//! Stopping and restarting the Klipper unit around flashing, detecting the
//! transport mode from `printer.cfg`, and binding the discovered identities
//! into a generated include file.

use std::path::{Path, PathBuf};

use crate::discovery::Identifier;
use crate::errors::{ProvisionError, ProvisionResult};
use crate::firmware::FlashMode;
use crate::options::{CanOptions, HostOptions, ProbeOptions};
use crate::runner::CommandSpec;
use crate::service::ServiceManager;
use crate::state::ProvisioningState;
use crate::util::write_atomic;

/// Marker of a CAN-attached MCU in `printer.cfg`.
const CANBUS_MARKER: &str = "canbus_serial";

#[derive(Clone)]
pub struct HostApplication {
    services: ServiceManager,
    host: HostOptions,
    can: CanOptions,
    probes: ProbeOptions,
}

impl HostApplication {
    pub fn new(
        services: ServiceManager,
        host: &HostOptions,
        can: &CanOptions,
        probes: &ProbeOptions,
    ) -> Self {
        Self {
            services,
            host: host.clone(),
            can: can.clone(),
            probes: probes.clone(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.host.service_name
    }

    /// Stop Klipper if it is running. Returns whether it was stopped.
    pub async fn stop_if_active(&self) -> ProvisionResult<bool> {
        if !self.services.is_active(&self.host.service_name).await? {
            tracing::info!(unit = %self.host.service_name, "Host application not running");
            return Ok(false);
        }
        tracing::info!(unit = %self.host.service_name, "Stopping host application");
        self.services.stop(&self.host.service_name).await?;
        Ok(true)
    }

    pub async fn start(&self) -> ProvisionResult<()> {
        tracing::info!(unit = %self.host.service_name, "Enabling and starting host application");
        self.services.enable_and_start(&self.host.service_name).await
    }

    /// The existing printer configuration decides the transport: an MCU
    /// addressed by `canbus_serial` means canbus, anything else bridge.
    pub fn detect_mode(&self) -> FlashMode {
        detect_mode(&self.host.printer_config())
    }

    /// The identity query: the configured override, or Klipper's
    /// `canbus_query.py` for the CAN interface.
    pub fn query_spec(&self) -> ProvisionResult<CommandSpec> {
        if let Some(argv) = &self.probes.identity_query {
            return CommandSpec::from_argv(argv);
        }
        let script = self.host.klipper_dir.join("scripts").join("canbus_query.py");
        Ok(CommandSpec::new(self.host.python.display().to_string())
            .path_arg(&script)
            .arg(&self.can.interface))
    }

    /// Write the generated include and reference it from `printer.cfg`.
    ///
    /// Requires both identities. Returns the generated file's path.
    pub fn write_config(&self, state: &ProvisioningState) -> ProvisionResult<PathBuf> {
        let (Some(fps), Some(mainboard)) = (state.fps(), state.mainboard()) else {
            return Err(ProvisionError::PreconditionUnmet(
                "both board identities are required to generate the host configuration"
                    .to_string(),
            ));
        };

        let printer_cfg = self.host.printer_config();
        if !printer_cfg.is_file() {
            return Err(ProvisionError::PreconditionUnmet(format!(
                "{} not found",
                printer_cfg.display()
            )));
        }

        let generated = self.host.generated_config_path();
        write_atomic(&generated, render_config(fps, mainboard).as_bytes())?;
        tracing::info!(path = %generated.display(), "Wrote host configuration");

        if ensure_include(&printer_cfg, &self.host.generated_config)? {
            tracing::info!(path = %printer_cfg.display(), "Added include to printer configuration");
        }
        Ok(generated)
    }
}

pub fn detect_mode(printer_cfg: &Path) -> FlashMode {
    match std::fs::read_to_string(printer_cfg) {
        Ok(contents) if contents.contains(CANBUS_MARKER) => FlashMode::Canbus,
        Ok(_) => FlashMode::Bridge,
        Err(_) => {
            tracing::debug!(path = %printer_cfg.display(), "No printer configuration, assuming bridge");
            FlashMode::Bridge
        }
    }
}

pub fn render_config(fps: &Identifier, mainboard: &Identifier) -> String {
    format!(
        "# Generated by openams. Regenerate with `openams host-config`.\n\
         \n\
         [mcu fps]\n\
         canbus_uuid: {fps}\n\
         \n\
         [mcu openams]\n\
         canbus_uuid: {mainboard}\n"
    )
}

fn include_line(name: &str) -> String {
    format!("[include {}]", name)
}

/// Prepend the include to `printer_cfg` unless a line already has it.
fn ensure_include(printer_cfg: &Path, name: &str) -> ProvisionResult<bool> {
    let contents = std::fs::read_to_string(printer_cfg)?;
    let line = include_line(name);
    if contents.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }
    write_atomic(printer_cfg, format!("{}\n{}", line, contents).as_bytes())?;
    Ok(true)
}
