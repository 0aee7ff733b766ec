//! Scenario inputs: default template, sparse definitions, overlay
//! resolution and baseline/scenario pairing per site folder.

pub mod definition;
pub mod manifest;
pub mod pairing;
pub mod resolve;
pub mod template;

pub use definition::{load_definition, load_sheet, Directives, ScenarioDefinition};
pub use manifest::{load_manifest, sanitize_name, write_requests, RequestArtifact, RequestManifest};
pub use pairing::{
    discover_sites, pair, Discovery, IdentityPaths, PairingOutcome, ResolveOptions, SiteLayout,
    SitePlan, Triple,
};
pub use resolve::{
    attach_profiles, request_profiles, resolve, wholesale_prices, ProfileTargets, ResolvedRequest,
};
pub use template::{read_document, DefaultTemplate};
