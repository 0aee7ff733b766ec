//! # nova-core: shared types for DER scenario comparison
//!
//! Provides the data structures every other nova crate speaks:
//!
//! - [`Node`] / [`KeyPath`] - nested documents (templates, requests, results)
//!   addressed by dotted paths
//! - [`Site`] / [`ScenarioKey`] - identity of a project folder and of one
//!   scenario within it
//! - [`Resolution`] - the sampling interval shared by the profiles of one
//!   computation
//! - [`error`] - the per-concern error enums and the unified [`NovaError`]
//!
//! ## Pipeline
//!
//! ```text
//! template + definitions ─▶ resolve ─▶ pair ─▶ optimize/replay ─▶ interpret ─▶ compute ─▶ assemble
//!            (nova-scenarios)                    (nova-results)            (nova-metrics) (nova-batch)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod resolution;
pub mod tree;

pub use error::{
    ErrorKind, NovaError, NovaResult, OutputWriteError, PairingError, ResolutionError,
    ServiceError, TimeseriesError,
};
pub use resolution::{Resolution, HOURS_PER_YEAR};
pub use tree::{KeyPath, Node, Scalar};

/// Identity of one project folder.
///
/// Created when the folder is discovered and never changed afterwards; shared
/// between the triples of the site behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Folder name; unique within a project root
    pub id: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Utility-rate reference (URDB label)
    pub urdb_label: Option<String>,
}

impl Site {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Site {
            name: id.clone(),
            id,
            latitude: None,
            longitude: None,
            urdb_label: None,
        }
    }
}

/// Marker used in error summaries for failures that concern a whole site.
pub const SITE_WIDE: &str = "*";

/// `(site, scenario)` pair every per-scenario outcome is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScenarioKey {
    pub site: String,
    pub scenario: String,
}

impl ScenarioKey {
    pub fn new(site: impl Into<String>, scenario: impl Into<String>) -> Self {
        ScenarioKey {
            site: site.into(),
            scenario: scenario.into(),
        }
    }

    pub fn site_wide(site: impl Into<String>) -> Self {
        ScenarioKey::new(site, SITE_WIDE)
    }

    pub fn is_site_wide(&self) -> bool {
        self.scenario == SITE_WIDE
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site, self.scenario)
    }
}

/// File-system safe form of a site or scenario id, used for every
/// `<site>/<scenario>` file name.
///
/// Path separators and NUL become `_`; names that would resolve to the
/// directory itself or its parent (`.`, `..`) are replaced by underscores.
pub fn sanitize_name(value: &str) -> String {
    let filtered: String = value
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    if filtered.is_empty() {
        "scenario".to_string()
    } else if filtered == "." || filtered == ".." {
        "_".repeat(filtered.len())
    } else {
        filtered
    }
}
