use anyhow::{Context, Result};
use nova_cli::cli::ProjectArgs;
use nova_cli::config::NovaConfig;
use nova_scenarios::{discover_sites, pair, DefaultTemplate, PairingOutcome};
use tracing::info;

pub mod resolve;
pub mod run;
pub mod validate;

/// Apply the project flags over the config file values.
pub fn apply_project_args(config: &mut NovaConfig, args: &ProjectArgs) {
    if let Some(template) = &args.template {
        config.paths.template = template.clone();
    }
    if let Some(projects) = &args.projects {
        config.paths.projects = projects.clone();
    }
    if let Some(resolution) = args.resolution {
        config.resolver.resolution = resolution;
    }
}

/// Load the template, discover every site and resolve its pairings.
pub fn load_pairings(config: &NovaConfig) -> Result<PairingOutcome> {
    let template = DefaultTemplate::load(&config.paths.template, config.required_paths()?)?;
    let discovery = discover_sites(&config.paths.projects, &config.layout())
        .with_context(|| format!("discovering sites under '{}'", config.paths.projects.display()))?;
    info!(
        sites = discovery.plans.len(),
        failures = discovery.failures.len(),
        "discovered sites"
    );
    Ok(pair(&template, discovery, &config.resolve_options()?))
}
