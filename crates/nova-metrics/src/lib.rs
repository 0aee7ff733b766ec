//! Baseline/scenario comparison metrics.
//!
//! [`compute`] turns one triple's interpreted results, requests and profiles
//! into a [`MetricRecord`]: per-side values for every metric, their deltas,
//! NPV, and capacity warnings.

pub mod compute;
pub mod config;
pub mod energy;
pub mod inputs;
pub mod record;
pub mod resilience;

pub use compute::{compute, Comparison, Side, DEFAULT_BASELINE_TYPE};
pub use config::{MetricsConfig, ReplacementCostConvention};
pub use energy::dispatch_columns;
pub use record::{CapacityOutOfRangeWarning, ComparisonSide, MetricRecord, MetricValue};
