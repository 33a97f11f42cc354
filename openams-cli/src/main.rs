mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use openams::errors::ProvisionError;
use openams::layout::FilesystemLayout;
use openams::logging::REPORT_TARGET;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_file = FilesystemLayout::new(cli.global.home_dir()).log_file();
    let guard = openams::logging::init(Some(&log_file), cli.global.verbose);
    tracing::debug!(command = cli.command.name(), "Starting");

    let result = run(cli).await;
    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            report(&e);
            1
        }
    };

    // Flush the log writer; process::exit skips destructors.
    drop(guard);
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Assist(args) => commands::assist::execute(args, &global).await,
        Commands::Continue(args) => commands::resume::execute(args, &global).await,
        Commands::Setup(args) => commands::setup::execute(args, &global).await,
        Commands::Deploy(args) => commands::deploy::execute(args, &global).await,
        Commands::SetupCanbus(args) => commands::canbus::execute(args, &global).await,
        Commands::Query(args) => commands::query::execute(args, &global).await,
        Commands::HostConfig(args) => commands::host_config::execute(args, &global).await,
        Commands::Status(args) => commands::status::execute(args, &global).await,
        Commands::Service(args) => commands::service::execute(args, &global).await,
    }
}

fn report(error: &anyhow::Error) {
    let timed_out = error
        .downcast_ref::<ProvisionError>()
        .is_some_and(ProvisionError::is_timeout);

    tracing::error!(target: REPORT_TARGET, timed_out, "Fatal: {:#}", error);
    eprintln!("Error: {:#}", error);
    if timed_out {
        eprintln!(
            "The boards never appeared on the CAN bus. Check wiring and power, then re-run `openams continue`."
        );
    } else {
        eprintln!("Re-run the same command to resume; completed stages are skipped.");
    }
}
