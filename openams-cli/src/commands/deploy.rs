use clap::Args;
use openams::OutputMode;
use openams::firmware::{Board, DeployRequest, FlashMode, ToolPolicy};

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Board to flash (fps or mainboard)
    #[arg(long)]
    pub board: Board,

    /// Transport mode (bridge or canbus) [default: detected from printer.cfg]
    #[arg(long)]
    pub mode: Option<FlashMode>,

    /// Skip setting option bytes when STM32_Programmer_CLI is not installed
    #[arg(long)]
    pub allow_missing_programmer: bool,
}

pub async fn execute(args: DeployArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let ctx = super::context(options, OutputMode::Inherit);

    let mode = match args.mode {
        Some(mode) => mode,
        None => {
            let detected = ctx.host().detect_mode();
            println!("Detected {} mode from printer.cfg", detected);
            detected
        }
    };
    let request = DeployRequest {
        board: args.board,
        mode,
        programmer: if args.allow_missing_programmer {
            ToolPolicy::AllowMissing
        } else {
            ToolPolicy::Require
        },
    };

    println!("Plug in the {} in DFU mode...", request.board);
    ctx.deployer(ctx.interactive_poller())
        .deploy(&request)
        .await?;

    println!("Deployment complete. Verify operation on the {} board.", request.board);
    Ok(())
}
