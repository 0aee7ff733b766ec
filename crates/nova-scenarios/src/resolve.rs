//! Deep overlay of a scenario definition onto the default template.

use nova_core::{KeyPath, Node, NovaError, Resolution, ResolutionError, TimeseriesError};
use nova_ts::{load_profile, profile_from_values, ProfileSet, ProfileSource};
use std::path::Path;
use tracing::debug;

use crate::definition::{Directives, ScenarioDefinition};
use crate::template::DefaultTemplate;

/// A fully populated request document for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub scenario_id: String,
    pub body: Node,
    pub directives: Directives,
}

impl ResolvedRequest {
    pub fn get(&self, path: &KeyPath) -> Option<&Node> {
        self.body.get_path(path)
    }
}

/// Overlay `definition` onto a deep copy of `template`.
///
/// Overrides are applied in order, so a later duplicate key wins. Every
/// required path must hold a non-blank value afterwards.
pub fn resolve(
    template: &DefaultTemplate,
    definition: &ScenarioDefinition,
) -> Result<ResolvedRequest, ResolutionError> {
    let mut body = template.root().clone();
    for (path, value) in &definition.overrides {
        body.set_path(path, value.clone())?;
    }
    for required in template.required() {
        if body.get_path(required).map_or(true, Node::is_blank) {
            return Err(ResolutionError::UnresolvedRequiredField {
                path: required.to_string(),
            });
        }
    }
    debug!(
        scenario = %definition.id,
        overrides = definition.overrides.len(),
        "resolved request"
    );
    Ok(ResolvedRequest {
        scenario_id: definition.id.clone(),
        body,
        directives: definition.directives.clone(),
    })
}

/// Request paths that receive attached profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTargets {
    pub load: KeyPath,
    pub prod_factor: KeyPath,
}

impl Default for ProfileTargets {
    fn default() -> Self {
        ProfileTargets {
            load: KeyPath::from_static("Scenario.Site.LoadProfile.loads_kw"),
            prod_factor: KeyPath::from_static("Scenario.Site.PV.prod_factor_series_kw"),
        }
    }
}

/// Load the files named by `load_file`/`pv_prod_factor_file` and write their
/// samples into the request at `targets`.
pub fn attach_profiles(
    request: &mut ResolvedRequest,
    targets: &ProfileTargets,
    resolution: Resolution,
) -> Result<(), NovaError> {
    let attachments = [
        (request.directives.load_file.clone(), &targets.load),
        (request.directives.pv_prod_factor_file.clone(), &targets.prod_factor),
    ];
    for (file, target) in attachments {
        let Some(file) = file else { continue };
        let profile = load_profile(target.last(), &ProfileSource::infer(file, None), resolution)?;
        request.body.set_path(target, Node::from(profile.values))?;
    }
    Ok(())
}

/// Profiles embedded in a request at `targets`, if present.
pub fn request_profiles(
    request: &ResolvedRequest,
    targets: &ProfileTargets,
    resolution: Resolution,
) -> Result<ProfileSet, TimeseriesError> {
    let read = |target: &KeyPath| -> Result<Option<_>, TimeseriesError> {
        let Some(node) = request.get(target) else {
            return Ok(None);
        };
        if node.is_null() {
            return Ok(None);
        }
        let values = node.as_f64_list().ok_or_else(|| {
            TimeseriesError::format(
                format!("{}:{target}", request.scenario_id),
                "expected a list of numbers",
            )
        })?;
        profile_from_values(target.last(), values, resolution).map(Some)
    };
    Ok(ProfileSet {
        load: read(&targets.load)?,
        prod_factor: read(&targets.prod_factor)?,
    })
}

/// Wholesale price profile named by the request's directive, if any.
pub fn wholesale_prices(
    request: &ResolvedRequest,
    resolution: Resolution,
) -> Result<Option<nova_ts::TimeseriesProfile>, TimeseriesError> {
    request
        .directives
        .wholesale_price_file
        .as_deref()
        .map(|file: &Path| load_profile("wholesale_price", &ProfileSource::infer(file, None), resolution))
        .transpose()
}
