//! Error taxonomy for the nova pipeline
//!
//! Each pipeline concern has its own error enum so that callers can match on
//! the precise failure. [`NovaError`] unifies them at the batch boundary,
//! where every failure is attributed to a `(site, scenario)` pair and
//! classified by [`ErrorKind`] for the run's error summary.
//!
//! # Example
//!
//! ```
//! use nova_core::{ErrorKind, NovaError, ResolutionError};
//!
//! let err: NovaError = ResolutionError::UnresolvedRequiredField {
//!     path: "ElectricTariff.urdb_label".into(),
//! }
//! .into();
//! assert_eq!(err.kind(), ErrorKind::InputResolution);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while overlaying a scenario definition onto the default template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    /// A required field is absent or an empty string after the merge
    #[error("required field '{path}' is missing or empty after overlay")]
    UnresolvedRequiredField { path: String },

    /// An override key could not be split into path segments
    #[error("malformed override path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    /// An override descends through an existing value that is not a mapping
    #[error("cannot descend into '{path}': existing value is a {found}, not a mapping")]
    PathConflict { path: String, found: &'static str },

    /// The definition document itself is unusable
    #[error("invalid scenario definition '{origin}': {reason}")]
    InvalidDefinition { origin: String, reason: String },
}

/// Failures while loading or aligning timeseries profiles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeseriesError {
    /// Wrong column, non-numeric cell, or a length that does not fit the resolution
    #[error("timeseries format error in '{origin}': {reason}")]
    Format { origin: String, reason: String },

    /// A profile referenced by a request does not exist on disk
    #[error("timeseries file '{path}' does not exist")]
    Missing { path: String },
}

impl TimeseriesError {
    pub fn format(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        TimeseriesError::Format {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// Failures at the optimization service boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("optimization call timed out after {seconds:.1}s")]
    Timeout { seconds: f64 },

    #[error("optimization service transport error: {0}")]
    Transport(String),

    /// Replay mode found no stored result for the scenario
    #[error("no stored result at '{path}'")]
    ResultMissing { path: String },

    #[error("result is missing required field '{field}'")]
    ResultSchema { field: String },

    /// The service answered but the optimization did not succeed
    #[error("optimization did not complete (status '{status}')")]
    ResultIncomplete { status: String },
}

/// Failures while discovering sites and pairing their scenarios.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PairingError {
    #[error("site '{site}' has no baseline definition (expected a '{marker}' scenario)")]
    MissingBaseline { site: String, marker: String },

    #[error("site '{site}' has more than one baseline: {}", .candidates.join(", "))]
    AmbiguousBaseline {
        site: String,
        candidates: Vec<String>,
    },

    #[error("site '{site}' has a baseline but no scenarios")]
    EmptySite { site: String },

    #[error("reading '{path}': {message}")]
    Io { path: String, message: String },
}

/// A destination under the output root could not be written.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot write output '{path}': {message}")]
pub struct OutputWriteError {
    pub path: String,
    pub message: String,
}

/// Unified error type for everything that can fail one scenario or one run.
///
/// `Clone` is required because a failed baseline is shared by every scenario
/// of its site and reported once per scenario.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NovaError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Timeseries(#[from] TimeseriesError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Output(#[from] OutputWriteError),
}

/// Convenience type alias for Results using NovaError.
pub type NovaResult<T> = Result<T, NovaError>;

/// Coarse classification used in the run's error summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputResolution,
    Timeseries,
    ExternalService,
    Pairing,
    OutputWrite,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputResolution => "input_resolution",
            ErrorKind::Timeseries => "timeseries",
            ErrorKind::ExternalService => "external_service",
            ErrorKind::Pairing => "pairing",
            ErrorKind::OutputWrite => "output_write",
        }
    }
}

impl NovaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NovaError::Resolution(_) => ErrorKind::InputResolution,
            NovaError::Timeseries(_) => ErrorKind::Timeseries,
            NovaError::Service(_) => ErrorKind::ExternalService,
            NovaError::Pairing(_) => ErrorKind::Pairing,
            NovaError::Output(_) => ErrorKind::OutputWrite,
        }
    }
}
