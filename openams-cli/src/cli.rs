use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use openams::options::{OPENAMS_HOME_ENV, ProvisionOptions, default_home_dir};

use crate::commands;

#[derive(Parser, Debug)]
#[command(name = "openams", author, version, about = "OpenAMS board provisioning")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Provisioning home holding state, lock and logs [default: ~/.openams]
    #[arg(long, global = true, env = OPENAMS_HOME_ENV)]
    pub home: Option<PathBuf>,

    /// Run privileged commands directly instead of through sudo
    #[arg(long, global = true)]
    pub no_sudo: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalFlags {
    pub fn home_dir(&self) -> PathBuf {
        self.home.clone().unwrap_or_else(default_home_dir)
    }

    /// Defaults, then `<home>/config.json`, then flags.
    pub fn load_options(&self) -> anyhow::Result<ProvisionOptions> {
        let mut options = ProvisionOptions::load(&self.home_dir())?;
        if self.no_sudo {
            options.privileged = false;
        }
        Ok(options)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive provisioning: flash both boards and hand off to the service
    Assist(commands::assist::AssistArgs),

    /// Finish provisioning after the reboot (run by the service)
    Continue(commands::resume::ContinueArgs),

    /// Install the build and flash toolchain
    Setup(commands::setup::SetupArgs),

    /// Build and flash Katapult and Klipper onto a board in DFU mode
    Deploy(commands::deploy::DeployArgs),

    /// Configure the CAN interface and bring it up
    SetupCanbus(commands::canbus::SetupCanbusArgs),

    /// List the board identities answering on the CAN bus
    Query(commands::query::QueryArgs),

    /// Write the Klipper configuration for the recorded identities
    HostConfig(commands::host_config::HostConfigArgs),

    /// Show recorded identities
    Status(commands::status::StatusArgs),

    /// Install or remove the continuation service by hand
    Service(commands::service::ServiceArgs),
}

impl Commands {
    /// Name logged at startup.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Assist(_) => "assist",
            Commands::Continue(_) => "continue",
            Commands::Setup(_) => "setup",
            Commands::Deploy(_) => "deploy",
            Commands::SetupCanbus(_) => "setup-canbus",
            Commands::Query(_) => "query",
            Commands::HostConfig(_) => "host-config",
            Commands::Status(_) => "status",
            Commands::Service(_) => "service",
        }
    }
}
