use anyhow::Result;
use nova_cli::cli::ProjectArgs;
use nova_cli::config::NovaConfig;
use std::io::{self, Write};
use tabwriter::TabWriter;

use super::{apply_project_args, load_pairings};

/// Returns whether every scenario paired cleanly.
pub fn handle(mut config: NovaConfig, project: &ProjectArgs) -> Result<bool> {
    apply_project_args(&mut config, project);
    let outcome = load_pairings(&config)?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "#\tSITE\tSCENARIO\tBASELINE")?;
    for triple in &outcome.triples {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            triple.index, triple.site.id, triple.scenario.scenario_id, triple.baseline.scenario_id
        )?;
    }
    writer.flush()?;

    for (key, err) in &outcome.failures {
        eprintln!("{key}: {err}");
    }
    println!(
        "{} pairing(s) ready, {} failure(s)",
        outcome.triples.len(),
        outcome.failures.len()
    );
    Ok(outcome.failures.is_empty())
}
