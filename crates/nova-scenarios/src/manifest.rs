use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;

pub use nova_core::sanitize_name;

use crate::pairing::Triple;
use crate::resolve::ResolvedRequest;

/// One persisted request, as listed in `request_manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArtifact {
    pub site: String,
    pub scenario_id: String,
    pub request_file: String,
    #[serde(default)]
    pub is_baseline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestManifest {
    pub created_at: DateTime<Utc>,
    pub requests: Vec<RequestArtifact>,
}

/// Persist the resolved requests of `triples` for submission or inspection.
///
/// **Output structure:**
/// ```text
/// out_dir/
///   request_manifest.json
///   <site>/
///     <baseline>.json
///     <scenario>.json
/// ```
///
/// Each site's baseline is written once even though its triples share it.
pub fn write_requests(out_dir: &Path, triples: &[Triple]) -> Result<RequestManifest> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating request output directory '{}'", out_dir.display()))?;
    let mut requests = Vec::new();
    let mut last_site: Option<&str> = None;
    for triple in triples {
        let site_dir = out_dir.join(sanitize_name(&triple.site.id));
        if last_site != Some(triple.site.id.as_str()) {
            last_site = Some(triple.site.id.as_str());
            requests.push(write_request(&site_dir, &triple.site.id, &triple.baseline, true)?);
        }
        requests.push(write_request(&site_dir, &triple.site.id, &triple.scenario, false)?);
    }
    let manifest = RequestManifest {
        created_at: Utc::now(),
        requests,
    };
    write_manifest(&out_dir.join("request_manifest.json"), &manifest)?;
    Ok(manifest)
}

fn write_request(
    site_dir: &Path,
    site: &str,
    request: &ResolvedRequest,
    is_baseline: bool,
) -> Result<RequestArtifact> {
    fs::create_dir_all(site_dir)
        .with_context(|| format!("creating site directory '{}'", site_dir.display()))?;
    let path = site_dir.join(format!("{}.json", sanitize_name(&request.scenario_id)));
    let file = File::create(&path)
        .with_context(|| format!("creating request file '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, &request.body)
        .with_context(|| format!("writing request file '{}'", path.display()))?;
    Ok(RequestArtifact {
        site: site.to_string(),
        scenario_id: request.scenario_id.clone(),
        request_file: path.display().to_string(),
        is_baseline,
    })
}

pub fn write_manifest(path: &Path, manifest: &RequestManifest) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating request manifest '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, manifest)
        .with_context(|| format!("writing request manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<RequestManifest> {
    let file = File::open(path)
        .with_context(|| format!("opening request manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing request manifest '{}'", path.display()))
}
