use clap::Args;
use openams::firmware::ToolPolicy;
use openams::state::LockMode;
use openams::{OutputMode, Sequencer, StateLock};

#[derive(Args, Debug)]
pub struct AssistArgs {
    /// Fail when STM32_Programmer_CLI is not installed instead of skipping
    /// the option-byte step
    #[arg(long)]
    pub require_programmer: bool,
}

pub async fn execute(args: AssistArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let layout = options.layout();
    layout.prepare()?;
    let _lock = StateLock::acquire(layout.home_dir(), LockMode::TryOnce)?;

    let policy = if args.require_programmer {
        ToolPolicy::Require
    } else {
        ToolPolicy::AllowMissing
    };

    println!("OpenAMS provisioning assistant");
    println!("All actions are logged to {}", layout.log_file().display());

    let mut ctx = super::context(options, OutputMode::Inherit);
    Sequencer::front_end(policy).run(&mut ctx).await?;

    println!();
    println!("The continuation service is installed. Restart the printer now;");
    println!("provisioning finishes on its own once both boards are on the CAN bus.");
    Ok(())
}
