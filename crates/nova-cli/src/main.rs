use clap::Parser;
use nova_cli::cli::{Cli, Commands};
use nova_cli::config::load_config;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::run::RunOverrides;

/// Exit status when the run finished but some scenarios failed.
const EXIT_PARTIAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match dispatch(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_PARTIAL),
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Validate { project } => commands::validate::handle(config, &project),
        Commands::Resolve { project, out } => commands::resolve::handle(config, &project, &out),
        Commands::Run {
            project,
            out,
            results,
            mode,
            threads,
            timeout,
            timeseries,
            fail_fast,
        } => commands::run::handle(
            config,
            &project,
            RunOverrides {
                out,
                results,
                mode,
                threads,
                timeout,
                timeseries,
                fail_fast,
            },
        ),
    }
}
