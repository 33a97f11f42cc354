use clap::Args;
use openams::OutputMode;

#[derive(Args, Debug)]
pub struct QueryArgs {}

pub async fn execute(_args: QueryArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let ctx = super::context(options, OutputMode::Stream);

    let found = ctx.discovery()?.discover().await?;
    if found.is_empty() {
        eprintln!("No boards answered on {}", ctx.options().can.interface);
    }
    for id in &found {
        println!("{}", id);
    }
    Ok(())
}
