//! `nova.toml` configuration. Every section and key is optional.

use anyhow::{Context, Result};
use nova_batch::{RunConfig, TimeseriesOutput};
use nova_core::{KeyPath, Resolution};
use nova_metrics::MetricsConfig;
use nova_results::{HttpService, OptimizationService, ReplayService};
use nova_scenarios::{IdentityPaths, ProfileTargets, ResolveOptions, SiteLayout};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "nova.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NovaConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_template")]
    pub template: PathBuf,
    #[serde(default = "default_projects")]
    pub projects: PathBuf,
    /// Stored results for replay, and where live results are persisted
    #[serde(default = "default_results")]
    pub results: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            projects: default_projects(),
            results: default_results(),
            output: default_output(),
        }
    }
}

fn default_template() -> PathBuf {
    PathBuf::from("default_template.json")
}

fn default_projects() -> PathBuf {
    PathBuf::from("projects")
}

fn default_results() -> PathBuf {
    PathBuf::from("results")
}

fn default_output() -> PathBuf {
    PathBuf::from("output")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Dotted paths every resolved request must fill
    #[serde(default = "default_required")]
    pub required: Vec<String>,
    #[serde(default = "default_baseline_marker")]
    pub baseline_marker: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default = "default_identity_stem")]
    pub identity_stem: String,
    #[serde(default = "default_load_target")]
    pub load_target: String,
    #[serde(default = "default_prod_factor_target")]
    pub prod_factor_target: String,
    #[serde(default = "default_latitude_path")]
    pub latitude_path: String,
    #[serde(default = "default_longitude_path")]
    pub longitude_path: String,
    #[serde(default = "default_urdb_label_path")]
    pub urdb_label_path: String,
    #[serde(default)]
    pub resolution: Resolution,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            required: default_required(),
            baseline_marker: default_baseline_marker(),
            sheet_name: default_sheet_name(),
            identity_stem: default_identity_stem(),
            load_target: default_load_target(),
            prod_factor_target: default_prod_factor_target(),
            latitude_path: default_latitude_path(),
            longitude_path: default_longitude_path(),
            urdb_label_path: default_urdb_label_path(),
            resolution: Resolution::default(),
        }
    }
}

fn default_required() -> Vec<String> {
    vec![
        default_latitude_path(),
        default_longitude_path(),
        default_urdb_label_path(),
    ]
}

fn default_baseline_marker() -> String {
    SiteLayout::default().baseline_marker
}

fn default_sheet_name() -> String {
    SiteLayout::default().sheet_name
}

fn default_identity_stem() -> String {
    SiteLayout::default().identity_stem
}

fn default_load_target() -> String {
    ProfileTargets::default().load.to_string()
}

fn default_prod_factor_target() -> String {
    ProfileTargets::default().prod_factor.to_string()
}

fn default_latitude_path() -> String {
    IdentityPaths::default().latitude.to_string()
}

fn default_longitude_path() -> String {
    IdentityPaths::default().longitude.to_string()
}

fn default_urdb_label_path() -> String {
    IdentityPaths::default().urdb_label.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// Read stored results from the results directory
    #[default]
    Replay,
    /// Submit requests to the optimization API
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub mode: ServiceMode,
    #[serde(default = "default_root_url")]
    pub root_url: String,
    /// Falls back to the `NOVA_API_KEY` environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Per optimization call
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Save live results under `paths.results` for later replay
    #[serde(default)]
    pub persist_results: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: ServiceMode::default(),
            root_url: default_root_url(),
            api_key: None,
            poll_interval_seconds: default_poll_interval(),
            timeout_seconds: default_timeout(),
            persist_results: false,
        }
    }
}

fn default_root_url() -> String {
    "https://developer.nrel.gov/api/reopt".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputsConfig {
    /// Write per-scenario dispatch tables
    #[serde(default)]
    pub timeseries: bool,
    /// Resample dispatch tables to this resolution
    #[serde(default)]
    pub timeseries_resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker threads (0 = one per CPU)
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub fail_fast: bool,
}

/// Load `path`, or `nova.toml` from the working directory if present, or defaults.
///
/// Relative `[paths]` entries are anchored at the config file's directory.
pub fn load_config(path: Option<&Path>) -> Result<NovaConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(NovaConfig::default());
            }
            fallback
        }
    };
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    let mut config: NovaConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing config '{}'", path.display()))?;
    if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.paths.anchor(base);
    }
    Ok(config)
}

impl PathsConfig {
    fn anchor(&mut self, base: &Path) {
        for path in [
            &mut self.template,
            &mut self.projects,
            &mut self.results,
            &mut self.output,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

impl NovaConfig {
    pub fn layout(&self) -> SiteLayout {
        SiteLayout {
            baseline_marker: self.resolver.baseline_marker.clone(),
            sheet_name: self.resolver.sheet_name.clone(),
            identity_stem: self.resolver.identity_stem.clone(),
        }
    }

    pub fn required_paths(&self) -> Result<Vec<KeyPath>> {
        self.resolver
            .required
            .iter()
            .map(|raw| parse_path("resolver.required", raw))
            .collect()
    }

    pub fn resolve_options(&self) -> Result<ResolveOptions> {
        let resolver = &self.resolver;
        Ok(ResolveOptions {
            targets: ProfileTargets {
                load: parse_path("resolver.load_target", &resolver.load_target)?,
                prod_factor: parse_path("resolver.prod_factor_target", &resolver.prod_factor_target)?,
            },
            resolution: resolver.resolution,
            identity: IdentityPaths {
                latitude: parse_path("resolver.latitude_path", &resolver.latitude_path)?,
                longitude: parse_path("resolver.longitude_path", &resolver.longitude_path)?,
                urdb_label: parse_path("resolver.urdb_label_path", &resolver.urdb_label_path)?,
            },
        })
    }

    pub fn run_config(&self) -> Result<RunConfig> {
        let options = self.resolve_options()?;
        let mut run = RunConfig::new(&self.paths.output);
        run.threads = self.batch.threads;
        run.fail_fast = self.batch.fail_fast;
        run.timeout = Duration::from_secs(self.service.timeout_seconds);
        run.resolution = options.resolution;
        run.targets = options.targets;
        run.metrics = self.metrics.clone();
        run.timeseries = self.outputs.timeseries.then_some(TimeseriesOutput {
            resolution: self.outputs.timeseries_resolution,
        });
        Ok(run)
    }

    pub fn service(&self) -> Result<Arc<dyn OptimizationService>> {
        match self.service.mode {
            ServiceMode::Replay => Ok(Arc::new(ReplayService::new(&self.paths.results))),
            ServiceMode::Http => {
                let api_key = self
                    .service
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("NOVA_API_KEY").ok())
                    .context("http mode needs service.api_key or NOVA_API_KEY")?;
                let mut service = HttpService::new(&self.service.root_url, api_key)
                    .with_poll_interval(Duration::from_secs(self.service.poll_interval_seconds));
                if self.service.persist_results {
                    service = service.persist_to(&self.paths.results);
                }
                Ok(Arc::new(service))
            }
        }
    }
}

fn parse_path(key: &str, raw: &str) -> Result<KeyPath> {
    KeyPath::parse(raw).with_context(|| format!("invalid key path in {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() {
        let config: NovaConfig = toml::from_str("").unwrap();
        assert_eq!(config.service.mode, ServiceMode::Replay);
        assert_eq!(config.resolver.required.len(), 3);
        assert_eq!(config.service.timeout_seconds, 600);
        assert!(config.metrics.resilience);
        assert!(config.run_config().unwrap().timeseries.is_none());
    }

    #[test]
    fn sections_override_defaults_and_paths_anchor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nova.toml");
        fs::write(
            &path,
            r#"
[paths]
projects = "sites"

[resolver]
resolution = "half_hourly"

[metrics]
replacement_cost = "present_value"

[outputs]
timeseries = true
timeseries_resolution = "hourly"

[batch]
threads = 3
"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.paths.projects, dir.path().join("sites"));
        assert_eq!(config.resolver.resolution, Resolution::HalfHourly);
        let run = config.run_config().unwrap();
        assert_eq!(run.threads, 3);
        assert_eq!(run.resolution, Resolution::HalfHourly);
        assert_eq!(
            run.timeseries,
            Some(TimeseriesOutput {
                resolution: Some(Resolution::Hourly)
            })
        );
        assert_eq!(
            run.metrics.replacement_cost,
            nova_metrics::ReplacementCostConvention::PresentValue
        );
    }

    #[test]
    fn malformed_target_path_is_rejected() {
        let mut config = NovaConfig::default();
        config.resolver.load_target = "Scenario..loads".into();
        assert!(config.resolve_options().is_err());
    }
}
