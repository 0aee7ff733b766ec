//! Optimization service adapters and result interpretation.
//!
//! A [`ResultSet`] is whatever the service returned; [`interpret`] reduces it
//! to the [`NormalizedResult`] the metrics engine reads, independent of the
//! service's document layout.

pub mod http;
pub mod interpret;
pub mod service;

pub use http::HttpService;
pub use interpret::{
    interpret, CostSummary, Emissions, GridResult, NormalizedResult, ResultSet, Technology,
    TechnologyResult, MIN_CAPACITY_KW, STATUS_OPTIMAL,
};
pub use service::{invoke_with_timeout, OptimizationService, ReplayService};
