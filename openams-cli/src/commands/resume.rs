use clap::Args;
use openams::state::LockMode;
use openams::{OutputMode, Sequencer, StateLock};

#[derive(Args, Debug)]
pub struct ContinueArgs {}

pub async fn execute(_args: ContinueArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let layout = options.layout();
    layout.prepare()?;

    // The service may start before the front end has exited.
    let home = layout.home_dir().to_path_buf();
    let _lock =
        tokio::task::spawn_blocking(move || StateLock::acquire(&home, LockMode::Wait)).await??;

    let mut ctx = super::context(options, OutputMode::Stream);
    Sequencer::continuation().run(&mut ctx).await?;
    Ok(())
}
