use std::path::PathBuf;

use clap::{Args, Subcommand};
use openams::OutputMode;

#[derive(Args, Debug)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub action: ServiceAction,
}

#[derive(Subcommand, Debug)]
pub enum ServiceAction {
    /// Install and start the continuation service
    Install {
        /// Executable to install [default: this executable]
        #[arg(long)]
        binary: Option<PathBuf>,
    },
    /// Stop and remove the continuation service
    Uninstall,
}

pub async fn execute(args: ServiceArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let mut ctx = super::context(options, OutputMode::Inherit);
    let services = ctx.services();

    match args.action {
        ServiceAction::Install { binary } => {
            if let Some(binary) = binary {
                ctx = ctx.with_continuation_binary(binary);
            }
            let unit = services.continuation_unit(ctx.home_dir());
            services.install(&ctx.continuation_binary()?, &unit).await?;
            println!("Installed {}", services.unit_path(&unit.name).display());
        }
        ServiceAction::Uninstall => {
            let name = ctx.options().service.name.clone();
            services.uninstall(&name).await?;
            println!("Removed {}", name);
        }
    }
    Ok(())
}
