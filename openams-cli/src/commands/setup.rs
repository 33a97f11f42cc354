use std::sync::Arc;

use clap::Args;
use openams::setup::{PackageInstaller, REQUIRED_TOOLS};
use openams::{OutputMode, SystemRunner};

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Install every package even if its tool is already on PATH
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: SetupArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let installer = PackageInstaller::new(
        Arc::new(SystemRunner::new(OutputMode::Inherit)),
        options.privileged,
    );

    if args.force {
        let packages: Vec<&str> = REQUIRED_TOOLS.iter().map(|(_, p)| *p).collect();
        installer.install(&packages).await?;
    } else {
        installer.ensure().await?;
    }

    println!("Setup complete. Run `openams deploy` or `openams assist` to continue.");
    Ok(())
}
