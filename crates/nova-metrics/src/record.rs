use nova_core::{ScenarioKey, Site};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One metric compared across the two sides of a triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// `<Category>-<name>`, e.g. `PV-kw_capacity`
    pub name: String,
    pub baseline: f64,
    pub scenario: f64,
    /// `scenario - baseline`
    pub delta: f64,
}

impl MetricValue {
    pub fn new(name: impl Into<String>, baseline: f64, scenario: f64) -> Self {
        MetricValue {
            name: name.into(),
            baseline,
            scenario,
            delta: scenario - baseline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonSide {
    Baseline,
    Scenario,
}

impl fmt::Display for ComparisonSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonSide::Baseline => f.write_str("baseline"),
            ComparisonSide::Scenario => f.write_str("scenario"),
        }
    }
}

/// A reported capacity outside the bounds its request allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityOutOfRangeWarning {
    pub side: ComparisonSide,
    pub technology: String,
    /// `kw` or `kwh`
    pub field: String,
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl fmt::Display for CapacityOutOfRangeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} = {} outside [{}, {}]",
            self.side,
            self.technology,
            self.field,
            self.value,
            self.min.map_or_else(|| "-".to_string(), |v| v.to_string()),
            self.max.map_or_else(|| "-".to_string(), |v| v.to_string()),
        )
    }
}

/// Comparison of one scenario against its site's baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Discovery order of the triple
    pub index: usize,
    pub site: Site,
    pub scenario_id: String,
    pub baseline_id: String,
    pub baseline_type: String,
    pub run_id: Option<String>,
    pub metrics: Vec<MetricValue>,
    /// Baseline LCC minus scenario LCC
    pub npv: f64,
    pub warnings: Vec<CapacityOutOfRangeWarning>,
}

impl MetricRecord {
    pub fn key(&self) -> ScenarioKey {
        ScenarioKey::new(&self.site.id, &self.scenario_id)
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.iter().find(|metric| metric.name == name)
    }
}
