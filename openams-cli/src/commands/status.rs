use clap::Args;
use comfy_table::Table;
use openams::StateStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the raw state record as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StatusArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let layout = options.layout();
    let state = StateStore::new(layout.state_file()).load();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Component", "UUID"]);
    for (component, uuid) in state.summary_rows() {
        table.add_row(vec![component.to_string(), uuid]);
    }

    println!("OpenAMS setup summary");
    println!("{table}");
    println!("Log file: {}", layout.log_file().display());
    Ok(())
}
