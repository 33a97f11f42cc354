use clap::Args;
use openams::state::LockMode;
use openams::{OutputMode, StateLock};

#[derive(Args, Debug)]
pub struct HostConfigArgs {}

pub async fn execute(_args: HostConfigArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let _lock = StateLock::acquire(&options.home_dir, LockMode::TryOnce)?;

    let ctx = super::context(options, OutputMode::Inherit);
    let path = ctx.host().write_config(ctx.state())?;

    println!("Wrote {}", path.display());
    Ok(())
}
