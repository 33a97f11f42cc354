use clap::Args;
use openams::OutputMode;

#[derive(Args, Debug)]
pub struct SetupCanbusArgs {
    /// CAN interface [default: from config]
    #[arg(long)]
    pub interface: Option<String>,

    /// Bus bitrate [default: from config]
    #[arg(long)]
    pub bitrate: Option<u32>,
}

pub async fn execute(args: SetupCanbusArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut options = global.load_options()?;
    if let Some(interface) = args.interface {
        options.can.interface = interface;
    }
    if let Some(bitrate) = args.bitrate {
        options.can.bitrate = bitrate;
    }

    let ctx = super::context(options, OutputMode::Inherit);
    ctx.can().apply().await?;

    let can = &ctx.options().can;
    println!("{} configured at {} bit/s", can.interface, can.bitrate);
    Ok(())
}
