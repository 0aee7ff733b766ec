use anyhow::{Context, Result};
use nova_batch::{BatchRunner, RunSummary};
use nova_cli::cli::ProjectArgs;
use nova_cli::config::{NovaConfig, ServiceMode};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tabwriter::TabWriter;
use tracing::warn;

use super::{apply_project_args, load_pairings};

/// Flags that override the `[paths]`, `[service]`, `[outputs]` and `[batch]` sections.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub out: Option<PathBuf>,
    pub results: Option<PathBuf>,
    pub mode: Option<ServiceMode>,
    pub threads: Option<usize>,
    pub timeout: Option<u64>,
    pub timeseries: bool,
    pub fail_fast: bool,
}

impl RunOverrides {
    fn apply(self, config: &mut NovaConfig) {
        if let Some(out) = self.out {
            config.paths.output = out;
        }
        if let Some(results) = self.results {
            config.paths.results = results;
        }
        if let Some(mode) = self.mode {
            config.service.mode = mode;
        }
        if let Some(threads) = self.threads {
            config.batch.threads = threads;
        }
        if let Some(timeout) = self.timeout {
            config.service.timeout_seconds = timeout;
        }
        config.outputs.timeseries |= self.timeseries;
        config.batch.fail_fast |= self.fail_fast;
    }
}

/// Returns whether every scenario produced a metric record.
pub fn handle(mut config: NovaConfig, project: &ProjectArgs, overrides: RunOverrides) -> Result<bool> {
    apply_project_args(&mut config, project);
    overrides.apply(&mut config);

    let outcome = load_pairings(&config)?;
    let runner = BatchRunner::new(config.service()?, config.run_config()?);
    let abort = runner.abort_flag();
    ctrlc::set_handler(move || {
        warn!("interrupted; finishing running scenarios and skipping the rest");
        abort.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;
    let summary = runner.run(outcome)?;
    print_summary(&summary)?;
    Ok(!summary.has_failures())
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "SITE\tSCENARIO\tNPV\tWARNINGS")?;
    for record in &summary.records {
        writeln!(
            writer,
            "{}\t{}\t{:.2}\t{}",
            record.site.id,
            record.scenario_id,
            record.npv,
            record.warnings.len()
        )?;
    }
    writer.flush()?;

    for entry in &summary.errors.entries {
        eprintln!(
            "{}/{} [{}]: {}",
            entry.site,
            entry.scenario,
            entry.kind.as_str(),
            entry.message
        );
    }
    println!(
        "Run {}: {} ok, {} failed, {} skipped (manifest: {})",
        summary.run_id,
        summary.success,
        summary.failure,
        summary.skipped,
        summary.manifest_path.display()
    );
    Ok(())
}
