use anyhow::Result;
use nova_cli::cli::ProjectArgs;
use nova_cli::config::NovaConfig;
use nova_scenarios::write_requests;
use std::path::Path;
use tracing::info;

use super::{apply_project_args, load_pairings};

/// Returns whether every scenario resolved.
pub fn handle(mut config: NovaConfig, project: &ProjectArgs, out: &Path) -> Result<bool> {
    apply_project_args(&mut config, project);
    let outcome = load_pairings(&config)?;
    let manifest = write_requests(out, &outcome.triples)?;
    info!(
        requests = manifest.requests.len(),
        out = %out.display(),
        "wrote resolved requests"
    );
    for (key, err) in &outcome.failures {
        eprintln!("{key}: {err}");
    }
    println!(
        "Wrote {} request(s) to {}",
        manifest.requests.len(),
        out.display()
    );
    Ok(outcome.failures.is_empty())
}
