//! Site discovery and baseline/scenario pairing.
//!
//! ```text
//! projects/
//!   denver/            <- one Site per immediate subfolder (sorted by name)
//!     site.yaml        <- optional identity (name, latitude, longitude, urdb_label)
//!     baseline.json    <- baseline: id == marker or starts with "<marker>_"
//!     pv_175.json      <- scenarios
//!     scenarios.csv    <- optional sheet, one scenario per row
//! ```

use nova_core::{
    KeyPath, Node, NovaError, PairingError, Resolution, ResolutionError, ScenarioKey, Site,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::definition::{load_definition, load_sheet, ScenarioDefinition};
use crate::resolve::{attach_profiles, resolve, ProfileTargets, ResolvedRequest};
use crate::template::{read_document, DefaultTemplate};

/// Naming rules for a project folder.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteLayout {
    pub baseline_marker: String,
    pub sheet_name: String,
    pub identity_stem: String,
}

impl Default for SiteLayout {
    fn default() -> Self {
        SiteLayout {
            baseline_marker: "baseline".into(),
            sheet_name: "scenarios.csv".into(),
            identity_stem: "site".into(),
        }
    }
}

impl SiteLayout {
    pub fn is_baseline(&self, scenario_id: &str) -> bool {
        scenario_id == self.baseline_marker
            || scenario_id
                .strip_prefix(self.baseline_marker.as_str())
                .is_some_and(|rest| rest.starts_with('_'))
    }
}

/// Request paths a site's identity falls back to when it has no identity file.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityPaths {
    pub latitude: KeyPath,
    pub longitude: KeyPath,
    pub urdb_label: KeyPath,
}

impl Default for IdentityPaths {
    fn default() -> Self {
        IdentityPaths {
            latitude: KeyPath::from_static("Scenario.Site.latitude"),
            longitude: KeyPath::from_static("Scenario.Site.longitude"),
            urdb_label: KeyPath::from_static("Scenario.Site.ElectricTariff.urdb_label"),
        }
    }
}

/// How requests are completed after overlay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    pub targets: ProfileTargets,
    pub resolution: Resolution,
    pub identity: IdentityPaths,
}

/// A discovered site folder with its definitions split by role.
#[derive(Debug, Clone)]
pub struct SitePlan {
    pub site_id: String,
    pub dir: PathBuf,
    pub identity: Option<Node>,
    pub baseline: ScenarioDefinition,
    pub scenarios: Vec<ScenarioDefinition>,
}

/// Sites ready to pair, plus per-key failures found while reading them.
#[derive(Debug, Default)]
pub struct Discovery {
    pub plans: Vec<SitePlan>,
    pub failures: Vec<(ScenarioKey, NovaError)>,
}

/// One unit of batch work. The baseline is shared by every triple of its site.
#[derive(Debug, Clone)]
pub struct Triple {
    /// Position in discovery order across the whole run
    pub index: usize,
    pub site: Arc<Site>,
    pub baseline: Arc<ResolvedRequest>,
    pub scenario: ResolvedRequest,
}

impl Triple {
    pub fn key(&self) -> ScenarioKey {
        ScenarioKey::new(&self.site.id, &self.scenario.scenario_id)
    }
}

#[derive(Debug, Default)]
pub struct PairingOutcome {
    pub triples: Vec<Triple>,
    pub failures: Vec<(ScenarioKey, NovaError)>,
}

/// Enumerate the immediate subfolders of `root` as sites.
///
/// Only an unreadable root is an error; problems inside one site are
/// recorded against `(site, "*")` or `(site, scenario)` and the other sites
/// are still discovered.
pub fn discover_sites(root: &Path, layout: &SiteLayout) -> Result<Discovery, PairingError> {
    let mut site_dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| PairingError::Io {
            path: root.display().to_string(),
            message: err.to_string(),
        })?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_dir() && !hidden {
            site_dirs.push(entry.into_path());
        }
    }

    let mut discovery = Discovery::default();
    for dir in site_dirs {
        let site_id = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match plan_site(&site_id, &dir, layout, &mut discovery.failures) {
            Ok(plan) => {
                debug!(site = %site_id, scenarios = plan.scenarios.len(), "discovered site");
                discovery.plans.push(plan);
            }
            Err(err) => {
                warn!(site = %site_id, error = %err, "skipping site");
                discovery
                    .failures
                    .push((ScenarioKey::site_wide(&site_id), err.into()));
            }
        }
    }
    info!(
        root = %root.display(),
        sites = discovery.plans.len(),
        failures = discovery.failures.len(),
        "site discovery finished"
    );
    Ok(discovery)
}

fn plan_site(
    site_id: &str,
    dir: &Path,
    layout: &SiteLayout,
    failures: &mut Vec<(ScenarioKey, NovaError)>,
) -> Result<SitePlan, PairingError> {
    let io_err = |err: walkdir::Error| PairingError::Io {
        path: dir.display().to_string(),
        message: err.to_string(),
    };
    let mut identity = None;
    let mut definitions = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if stem == layout.identity_stem {
            identity = Some(read_identity(path)?);
        } else if file_name == layout.sheet_name.as_str() {
            match load_sheet(path) {
                Ok(rows) => definitions.extend(rows),
                Err(err) => failures.push((ScenarioKey::site_wide(site_id), err.into())),
            }
        } else if matches!(extension.as_str(), "json" | "yaml" | "yml") {
            match load_definition(path) {
                Ok(definition) => definitions.push(definition),
                Err(err) => failures.push((ScenarioKey::new(site_id, stem), err.into())),
            }
        }
    }

    let mut origins: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for definition in &definitions {
        origins
            .entry(definition.id.clone())
            .or_default()
            .push(definition.origin.clone());
    }
    // duplicated scenario ids fail as a whole; duplicated baselines stay ambiguous
    let mut baselines = Vec::new();
    let mut scenarios = Vec::new();
    for definition in definitions {
        if layout.is_baseline(&definition.id) {
            baselines.push(definition);
        } else if origins[&definition.id].len() == 1 {
            scenarios.push(definition);
        }
    }
    for (id, sources) in &origins {
        if sources.len() > 1 && !layout.is_baseline(id) {
            warn!(site = %site_id, scenario = %id, copies = sources.len(), "duplicate scenario id");
            failures.push((
                ScenarioKey::new(site_id, id),
                ResolutionError::InvalidDefinition {
                    origin: sources.join(", "),
                    reason: format!("scenario id '{id}' is defined {} times", sources.len()),
                }
                .into(),
            ));
        }
    }

    if baselines.len() > 1 {
        return Err(PairingError::AmbiguousBaseline {
            site: site_id.to_string(),
            candidates: baselines.into_iter().map(|d| d.id).collect(),
        });
    }
    let baseline = baselines.pop().ok_or_else(|| PairingError::MissingBaseline {
        site: site_id.to_string(),
        marker: layout.baseline_marker.clone(),
    })?;
    if scenarios.is_empty() {
        return Err(PairingError::EmptySite {
            site: site_id.to_string(),
        });
    }
    Ok(SitePlan {
        site_id: site_id.to_string(),
        dir: dir.to_path_buf(),
        identity,
        baseline,
        scenarios,
    })
}

fn read_identity(path: &Path) -> Result<Node, PairingError> {
    read_document(path)
        .map(Node::from)
        .map_err(|err| PairingError::Io {
            path: path.display().to_string(),
            message: format!("{err:#}"),
        })
}

/// Resolve every baseline and scenario and emit the comparison triples.
///
/// A baseline that fails to resolve fails every scenario of its site with the
/// same error. Indices follow discovery order and are assigned to failed
/// scenarios too, so successful triples keep stable positions.
pub fn pair(template: &DefaultTemplate, discovery: Discovery, options: &ResolveOptions) -> PairingOutcome {
    let mut outcome = PairingOutcome {
        triples: Vec::new(),
        failures: discovery.failures,
    };
    let mut index = 0;
    for plan in discovery.plans {
        let baseline = resolve_complete(template, &plan.baseline, options).map(Arc::new);
        let site = Arc::new(site_identity(&plan, baseline.as_deref().ok(), &options.identity));
        for definition in &plan.scenarios {
            let key = ScenarioKey::new(&site.id, &definition.id);
            let position = index;
            index += 1;
            let baseline = match &baseline {
                Ok(baseline) => Arc::clone(baseline),
                Err(err) => {
                    outcome.failures.push((key, err.clone()));
                    continue;
                }
            };
            match resolve_complete(template, definition, options) {
                Ok(scenario) => outcome.triples.push(Triple {
                    index: position,
                    site: Arc::clone(&site),
                    baseline,
                    scenario,
                }),
                Err(err) => {
                    warn!(scenario = %key, error = %err, "scenario failed to resolve");
                    outcome.failures.push((key, err));
                }
            }
        }
    }
    outcome
}

fn resolve_complete(
    template: &DefaultTemplate,
    definition: &ScenarioDefinition,
    options: &ResolveOptions,
) -> Result<ResolvedRequest, NovaError> {
    let mut request = resolve(template, definition)?;
    attach_profiles(&mut request, &options.targets, options.resolution)?;
    Ok(request)
}

fn site_identity(plan: &SitePlan, baseline: Option<&ResolvedRequest>, paths: &IdentityPaths) -> Site {
    let mut site = Site::new(&plan.site_id);
    let from_file = |key: &str| plan.identity.as_ref().and_then(|node| node.get(key));
    let from_request = |path: &KeyPath| baseline.and_then(|request| request.get(path));

    if let Some(name) = from_file("name").and_then(Node::as_str) {
        site.name = name.to_string();
    }
    site.latitude = from_file("latitude")
        .or_else(|| from_request(&paths.latitude))
        .and_then(Node::as_f64);
    site.longitude = from_file("longitude")
        .or_else(|| from_request(&paths.longitude))
        .and_then(Node::as_f64);
    site.urdb_label = from_file("urdb_label")
        .or_else(|| from_request(&paths.urdb_label))
        .and_then(Node::as_str)
        .map(str::to_string);
    site
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_marker_matches_prefix_with_separator() {
        let layout = SiteLayout::default();
        assert!(layout.is_baseline("baseline"));
        assert!(layout.is_baseline("baseline_gas"));
        assert!(!layout.is_baseline("baselinegas"));
        assert!(!layout.is_baseline("pv_baseline"));
    }
}
