//! Canonical view of an optimization result document.
//!
//! Upstream results come in a nested layout (`outputs.Scenario.Site.PV.size_kw`)
//! and a flattened one (`outputs.PV.size_kw`); every field is looked up under
//! each known prefix and, where the service renamed a field across versions,
//! under each alias.

use nova_core::{Node, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Status reported by a successful optimization.
pub const STATUS_OPTIMAL: &str = "optimal";

/// Capacities at or below this are treated as "not built".
pub const MIN_CAPACITY_KW: f64 = 0.01;

const SITE_PREFIXES: &[&[&str]] = &[&["outputs", "Scenario", "Site"], &["outputs", "Site"], &["outputs"]];
const SCENARIO_PREFIXES: &[&[&str]] = &[&["outputs", "Scenario"], &["outputs"], &[]];

/// Raw result document returned (or replayed) for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub body: Node,
}

impl ResultSet {
    pub fn new(body: Node) -> Self {
        ResultSet { body }
    }

    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Err(ServiceError::ResultMissing {
                path: path.display().to_string(),
            });
        }
        let text = fs::read_to_string(path)
            .map_err(|err| ServiceError::Transport(format!("reading {}: {err}", path.display())))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|err| ServiceError::Transport(format!("parsing {}: {err}", path.display())))?;
        Ok(ResultSet::new(Node::from(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    Pv,
    Storage,
    HeatPump,
    AirConditioner,
    ElectricWaterHeater,
    HeatPumpWaterHeater,
}

impl Technology {
    pub const ALL: [Technology; 6] = [
        Technology::Pv,
        Technology::Storage,
        Technology::HeatPump,
        Technology::AirConditioner,
        Technology::ElectricWaterHeater,
        Technology::HeatPumpWaterHeater,
    ];

    /// Section name in both request and result documents.
    pub fn section(self) -> &'static str {
        match self {
            Technology::Pv => "PV",
            Technology::Storage => "Storage",
            Technology::HeatPump => "FlexTechHP",
            Technology::AirConditioner => "FlexTechAC",
            Technology::ElectricWaterHeater => "FlexTechERWH",
            Technology::HeatPumpWaterHeater => "FlexTechHPWH",
        }
    }

    /// Short label used as metric category.
    pub fn label(self) -> &'static str {
        match self {
            Technology::Pv => "PV",
            Technology::Storage => "Storage",
            Technology::HeatPump => "HP",
            Technology::AirConditioner => "AC",
            Technology::ElectricWaterHeater => "ERWH",
            Technology::HeatPumpWaterHeater => "HPWH",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sizes and year-one dispatch (kW per step) of one technology.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechnologyResult {
    pub kw: f64,
    pub kwh: f64,
    pub production: Vec<f64>,
    pub to_load: Vec<f64>,
    pub to_grid: Vec<f64>,
    pub to_battery: Vec<f64>,
    pub consumption: Vec<f64>,
    /// Storage state of charge as a fraction of `kwh`
    pub state_of_charge: Vec<f64>,
}

static NOT_BUILT: TechnologyResult = TechnologyResult {
    kw: 0.0,
    kwh: 0.0,
    production: Vec::new(),
    to_load: Vec::new(),
    to_grid: Vec::new(),
    to_battery: Vec::new(),
    consumption: Vec::new(),
    state_of_charge: Vec::new(),
};

impl TechnologyResult {
    pub fn series(&self) -> [(&'static str, &[f64]); 6] {
        [
            ("production", &self.production),
            ("to_load", &self.to_load),
            ("to_grid", &self.to_grid),
            ("to_battery", &self.to_battery),
            ("consumption", &self.consumption),
            ("state_of_charge", &self.state_of_charge),
        ]
    }
}

/// Grid purchases (kW per step).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridResult {
    pub to_load: Vec<f64>,
    pub to_battery: Vec<f64>,
}

/// Cost components in dollars. Only `lcc` is mandatory; the rest default to 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSummary {
    pub lcc: f64,
    pub net_capital_costs: f64,
    pub initial_capital_costs: f64,
    pub om_costs: f64,
    pub year_one_bill: f64,
    pub year_one_energy_cost: f64,
    pub year_one_demand_cost: f64,
    pub fixed_cost: f64,
    pub export_benefit: f64,
    pub production_incentive: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emissions {
    pub year_one_tco2: Option<f64>,
    pub lifecycle_tco2: Option<f64>,
}

/// The subset of a result the metrics engine consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResult {
    pub status: String,
    pub run_id: Option<String>,
    pub technologies: BTreeMap<Technology, TechnologyResult>,
    pub grid: GridResult,
    pub costs: CostSummary,
    pub emissions: Emissions,
}

impl NormalizedResult {
    /// Result for `technology`; zeros when it was not built.
    pub fn technology(&self, technology: Technology) -> &TechnologyResult {
        self.technologies.get(&technology).unwrap_or(&NOT_BUILT)
    }

    /// Every non-empty dispatch series, named `<tech>.<series>`.
    pub fn series(&self) -> Vec<(String, &[f64])> {
        let mut out: Vec<(String, &[f64])> = Vec::new();
        for (technology, result) in &self.technologies {
            for (name, values) in result.series() {
                if !values.is_empty() {
                    out.push((format!("{technology}.{name}"), values));
                }
            }
        }
        for (name, values) in [("grid.to_load", &self.grid.to_load), ("grid.to_battery", &self.grid.to_battery)] {
            if !values.is_empty() {
                out.push((name.to_string(), values));
            }
        }
        out
    }
}

/// Extract the canonical subset of `result`.
///
/// Missing status or LCC is a [`ServiceError::ResultSchema`]; a status other
/// than `optimal` is a [`ServiceError::ResultIncomplete`].
pub fn interpret(result: &ResultSet) -> Result<NormalizedResult, ServiceError> {
    let body = &result.body;
    let status = find(body, SCENARIO_PREFIXES, &[], &["status"])
        .and_then(Node::as_str)
        .ok_or_else(|| ServiceError::ResultSchema {
            field: "outputs.Scenario.status".into(),
        })?
        .trim()
        .to_string();
    if !status.eq_ignore_ascii_case(STATUS_OPTIMAL) {
        return Err(ServiceError::ResultIncomplete { status });
    }
    let run_id = find(body, SCENARIO_PREFIXES, &[], &["run_uuid", "run_id"])
        .and_then(Node::as_str)
        .map(str::to_string);

    let lcc = number(body, "Financial", &["lcc_us_dollars", "lcc"]).ok_or_else(|| {
        ServiceError::ResultSchema {
            field: "Financial.lcc_us_dollars".into(),
        }
    })?;
    let costs = CostSummary {
        lcc,
        net_capital_costs: number(body, "Financial", &["net_capital_costs"]).unwrap_or_default(),
        initial_capital_costs: number(body, "Financial", &["initial_capital_costs"])
            .unwrap_or_default(),
        om_costs: number(body, "Financial", &["total_om_costs_us_dollars", "total_om_costs"])
            .unwrap_or_default(),
        year_one_bill: number(body, "ElectricTariff", &["year_one_bill_us_dollars"])
            .unwrap_or_default(),
        year_one_energy_cost: number(body, "ElectricTariff", &["year_one_energy_cost_us_dollars"])
            .unwrap_or_default(),
        year_one_demand_cost: number(body, "ElectricTariff", &["year_one_demand_cost_us_dollars"])
            .unwrap_or_default(),
        fixed_cost: number(
            body,
            "ElectricTariff",
            &["total_fixed_cost_us_dollars", "year_one_fixed_cost_us_dollars"],
        )
        .unwrap_or_default(),
        export_benefit: number(
            body,
            "ElectricTariff",
            &["total_export_benefit_us_dollars", "year_one_export_benefit_us_dollars"],
        )
        .unwrap_or_default(),
        production_incentive: number(
            body,
            "Financial",
            &["total_production_incentive_us_dollars", "total_production_incentive"],
        )
        .unwrap_or_default(),
    };

    let technologies = Technology::ALL
        .into_iter()
        .filter_map(|technology| technology_result(body, technology).map(|r| (technology, r)))
        .collect();

    Ok(NormalizedResult {
        status,
        run_id,
        technologies,
        grid: GridResult {
            to_load: series(body, "ElectricTariff", "year_one_to_load_series_kw"),
            to_battery: series(body, "ElectricTariff", "year_one_to_battery_series_kw"),
        },
        costs,
        emissions: Emissions {
            year_one_tco2: find(body, SITE_PREFIXES, &[], &["year_one_emissions_tCO2"])
                .and_then(Node::as_f64),
            lifecycle_tco2: find(body, SITE_PREFIXES, &[], &["lifecycle_emissions_tCO2"])
                .and_then(Node::as_f64),
        },
    })
}

fn technology_result(body: &Node, technology: Technology) -> Option<TechnologyResult> {
    let section = technology.section();
    let kw = number(body, section, &["size_kw"]).filter(|kw| *kw > MIN_CAPACITY_KW)?;
    Some(TechnologyResult {
        kw,
        kwh: number(body, section, &["size_kwh"]).unwrap_or_default(),
        production: series(body, section, "year_one_power_production_series_kw"),
        to_load: series(body, section, "year_one_to_load_series_kw"),
        to_grid: series(body, section, "year_one_to_grid_series_kw"),
        to_battery: series(body, section, "year_one_to_battery_series_kw"),
        consumption: series(body, section, "year_one_power_consumption_series_kw"),
        state_of_charge: series(body, section, "year_one_soc_series_pct"),
    })
}

fn find<'a>(body: &'a Node, prefixes: &[&[&str]], section: &[&str], names: &[&str]) -> Option<&'a Node> {
    prefixes.iter().find_map(|prefix| {
        let base = prefix
            .iter()
            .chain(section)
            .try_fold(body, |node, segment| node.get(segment))?;
        names
            .iter()
            .find_map(|name| base.get(name).filter(|node| !node.is_null()))
    })
}

fn number(body: &Node, section: &str, names: &[&str]) -> Option<f64> {
    find(body, SITE_PREFIXES, &[section], names).and_then(Node::as_f64)
}

/// Lists holding nulls or text are treated as absent.
fn series(body: &Node, section: &str, name: &str) -> Vec<f64> {
    find(body, SITE_PREFIXES, &[section], &[name])
        .and_then(Node::as_f64_list)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(site: serde_json::Value, status: &str) -> ResultSet {
        ResultSet::new(Node::from(json!({
            "outputs": {"Scenario": {"status": status, "run_uuid": "abc-123", "Site": site}}
        })))
    }

    #[test]
    fn reads_nested_layout() {
        let result = nested(
            json!({
                "PV": {"size_kw": 175.0, "year_one_power_production_series_kw": [0.0, 50.0]},
                "Storage": {"size_kw": 5.0, "size_kwh": 20.0},
                "Financial": {"lcc_us_dollars": 41000.0, "net_capital_costs": 19425.0},
                "ElectricTariff": {"year_one_to_load_series_kw": [1.0, 0.0], "year_one_bill_us_dollars": 900}
            }),
            "optimal",
        );
        let normalized = interpret(&result).unwrap();
        assert_eq!(normalized.run_id.as_deref(), Some("abc-123"));
        assert_eq!(normalized.technology(Technology::Pv).kw, 175.0);
        assert_eq!(normalized.technology(Technology::Storage).kwh, 20.0);
        assert_eq!(normalized.costs.lcc, 41000.0);
        assert_eq!(normalized.costs.year_one_bill, 900.0);
        assert_eq!(normalized.grid.to_load, vec![1.0, 0.0]);
        assert_eq!(normalized.series().len(), 2);
    }

    #[test]
    fn reads_flat_layout() {
        let result = ResultSet::new(Node::from(json!({
            "status": "optimal",
            "outputs": {
                "PV": {"size_kw": 10},
                "Financial": {"lcc": 1000}
            }
        })));
        let normalized = interpret(&result).unwrap();
        assert_eq!(normalized.technology(Technology::Pv).kw, 10.0);
        assert_eq!(normalized.costs.lcc, 1000.0);
    }

    #[test]
    fn tiny_capacity_is_not_built() {
        let result = nested(
            json!({
                "PV": {"size_kw": 0.005, "year_one_to_grid_series_kw": [1.0]},
                "FlexTechHP": {"size_kw": null},
                "Financial": {"lcc_us_dollars": 1.0}
            }),
            "optimal",
        );
        let normalized = interpret(&result).unwrap();
        assert_eq!(normalized.technology(Technology::Pv), &TechnologyResult::default());
        assert!(normalized.technologies.is_empty());
    }

    #[test]
    fn non_optimal_status_is_incomplete() {
        let result = nested(json!({"Financial": {"lcc_us_dollars": 1.0}}), "infeasible");
        assert_eq!(
            interpret(&result).unwrap_err(),
            ServiceError::ResultIncomplete {
                status: "infeasible".into()
            }
        );
    }

    #[test]
    fn missing_lcc_is_schema_error() {
        let result = nested(json!({"PV": {"size_kw": 1.0}}), "optimal");
        assert!(matches!(
            interpret(&result).unwrap_err(),
            ServiceError::ResultSchema { ref field } if field.contains("lcc")
        ));
    }

    #[test]
    fn missing_status_is_schema_error() {
        let result = ResultSet::new(Node::from(json!({"outputs": {}})));
        assert!(matches!(
            interpret(&result).unwrap_err(),
            ServiceError::ResultSchema { .. }
        ));
    }
}
