use serde::{Deserialize, Serialize};

/// Round-trip efficiency assumed when simulating outages.
pub const DEFAULT_ROUND_TRIP_EFFICIENCY: f64 = 0.829;

/// Year replacement costs are incurred when the request names none.
pub const DEFAULT_REPLACEMENT_YEAR: f64 = 10.0;

/// How replacement costs are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementCostConvention {
    /// Undiscounted dollars in the replacement year
    #[default]
    Nominal,
    /// Discounted to year zero at the request's discount rate
    PresentValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub replacement_cost: ReplacementCostConvention,
    /// Simulate outages for the average survival metric
    pub resilience: bool,
    pub round_trip_efficiency: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            replacement_cost: ReplacementCostConvention::Nominal,
            resilience: true,
            round_trip_efficiency: DEFAULT_ROUND_TRIP_EFFICIENCY,
        }
    }
}
