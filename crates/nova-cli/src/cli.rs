use crate::config::ServiceMode;
use clap::{Parser, Subcommand, ValueHint};
use nova_core::Resolution;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch DER scenario comparisons against an optimization service", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Configuration file (defaults to ./nova.toml when present)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every command that pairs scenarios.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Default request template (JSON or YAML)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub template: Option<PathBuf>,

    /// Directory with one subfolder per site
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub projects: Option<PathBuf>,

    /// Sampling interval for load and production profiles
    #[arg(long, value_parser = parse_resolution)]
    pub resolution: Option<Resolution>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pair and resolve every site's scenarios, then report what would run
    Validate {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Write resolved requests and a request manifest without calling the service
    Resolve {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output directory for resolved requests
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: PathBuf,
    },
    /// Optimize every pairing and write the comparison metrics
    Run {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output directory for metrics, timeseries and the run manifest
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: Option<PathBuf>,

        /// Stored results directory used in replay mode
        #[arg(long, value_hint = ValueHint::DirPath)]
        results: Option<PathBuf>,

        /// Where optimization results come from
        #[arg(long, value_enum)]
        mode: Option<ServiceMode>,

        /// Worker threads (0 = one per CPU)
        #[arg(long)]
        threads: Option<usize>,

        /// Per-call timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Also write per-scenario dispatch timeseries
        #[arg(long)]
        timeseries: bool,

        /// Stop dispatching after the first failed scenario
        #[arg(long)]
        fail_fast: bool,
    },
}

fn parse_resolution(raw: &str) -> Result<Resolution, String> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "nova", "--log-level", "debug", "run", "--mode", "replay", "--threads", "4",
            "--resolution", "half_hourly", "--timeseries",
        ])
        .unwrap();
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        match cli.command {
            Commands::Run {
                project,
                mode,
                threads,
                timeseries,
                ..
            } => {
                assert_eq!(mode, Some(ServiceMode::Replay));
                assert_eq!(threads, Some(4));
                assert_eq!(project.resolution, Some(Resolution::HalfHourly));
                assert!(timeseries);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
