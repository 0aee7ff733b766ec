//! Per-side metric extraction and baseline/scenario comparison.

use nova_core::{Resolution, Site, TimeseriesError};
use nova_results::{NormalizedResult, Technology};
use nova_scenarios::ResolvedRequest;
use nova_ts::{annual_energy, ensure_aligned, ensure_same_length, ProfileSet, TimeseriesProfile};
use tracing::{debug, warn};

use crate::config::MetricsConfig;
use crate::energy::{
    cover_factor_demand, cover_factor_supply, grid_cost, grid_peak_contribution,
    ra_battery_capacity, storage_utilization_percent, EnergyBalance,
};
use crate::inputs::{discount_rate, TechnologyInputs};
use crate::record::{CapacityOutOfRangeWarning, ComparisonSide, MetricRecord, MetricValue};
use crate::resilience::{average_survival_hours, Battery};

/// Tag used when neither definition names what its baseline differs in.
pub const DEFAULT_BASELINE_TYPE: &str = "tech_baseline";

/// Request, interpreted result and attached profiles of one side.
#[derive(Debug, Clone, Copy)]
pub struct Side<'a> {
    pub request: &'a ResolvedRequest,
    pub result: &'a NormalizedResult,
    pub profiles: &'a ProfileSet,
}

/// Everything needed to compare one scenario with its baseline.
#[derive(Debug, Clone, Copy)]
pub struct Comparison<'a> {
    pub index: usize,
    pub site: &'a Site,
    pub baseline: Side<'a>,
    pub scenario: Side<'a>,
    /// Wholesale prices in $/MWh, aligned with the dispatch series
    pub wholesale_price: Option<&'a TimeseriesProfile>,
    pub resolution: Resolution,
}

/// Compute the metric record of `comparison`.
///
/// Every profile and every non-empty dispatch series must share one length;
/// otherwise nothing is computed. Metrics missing on either side are left
/// out of the record.
pub fn compute(comparison: &Comparison<'_>, config: &MetricsConfig) -> Result<MetricRecord, TimeseriesError> {
    check_alignment(comparison)?;
    let baseline = side_metrics(ComparisonSide::Baseline, &comparison.baseline, comparison, config);
    let scenario = side_metrics(ComparisonSide::Scenario, &comparison.scenario, comparison, config);

    let metrics: Vec<MetricValue> = baseline
        .entries
        .iter()
        .zip(&scenario.entries)
        .filter_map(|(b, s)| match (b.value, s.value) {
            (Some(before), Some(after)) => Some(MetricValue::new(
                format!("{}-{}", b.category, b.name),
                before,
                after,
            )),
            _ => None,
        })
        .collect();

    let scenario_id = comparison.scenario.request.scenario_id.clone();
    let warnings: Vec<CapacityOutOfRangeWarning> =
        baseline.warnings.into_iter().chain(scenario.warnings).collect();
    for warning in &warnings {
        warn!(site = %comparison.site.id, scenario = %scenario_id, "capacity out of range: {warning}");
    }
    let baseline_type = comparison
        .scenario
        .request
        .directives
        .baseline_type
        .clone()
        .or_else(|| comparison.baseline.request.directives.baseline_type.clone())
        .unwrap_or_else(|| DEFAULT_BASELINE_TYPE.to_string());

    debug!(
        site = %comparison.site.id,
        scenario = %scenario_id,
        metrics = metrics.len(),
        "computed metrics"
    );
    Ok(MetricRecord {
        index: comparison.index,
        site: comparison.site.clone(),
        scenario_id,
        baseline_id: comparison.baseline.request.scenario_id.clone(),
        baseline_type,
        run_id: comparison.scenario.result.run_id.clone(),
        metrics,
        npv: comparison.baseline.result.costs.lcc - comparison.scenario.result.costs.lcc,
        warnings,
    })
}

fn check_alignment(comparison: &Comparison<'_>) -> Result<(), TimeseriesError> {
    let sides = [
        (ComparisonSide::Baseline, &comparison.baseline),
        (ComparisonSide::Scenario, &comparison.scenario),
    ];
    let mut profiles: Vec<&TimeseriesProfile> = sides
        .iter()
        .flat_map(|(_, side)| side.profiles.iter())
        .collect();
    profiles.extend(comparison.wholesale_price);
    ensure_aligned(&profiles)?;

    let mut lengths: Vec<(String, usize)> = profiles
        .iter()
        .map(|profile| (profile.name.clone(), profile.len()))
        .collect();
    for (label, side) in sides {
        lengths.extend(
            side.result
                .series()
                .into_iter()
                .map(|(name, values)| (format!("{label}.{name}"), values.len())),
        );
    }
    let named: Vec<(&str, usize)> = lengths.iter().map(|(name, len)| (name.as_str(), *len)).collect();
    ensure_same_length(&named)
}

struct Entry {
    category: &'static str,
    name: &'static str,
    value: Option<f64>,
}

#[derive(Default)]
struct SideMetrics {
    entries: Vec<Entry>,
    warnings: Vec<CapacityOutOfRangeWarning>,
}

impl SideMetrics {
    fn push(&mut self, category: &'static str, name: &'static str, value: impl Into<Option<f64>>) {
        self.entries.push(Entry {
            category,
            name,
            value: value.into(),
        });
    }

    fn check_bounds(
        &mut self,
        side: ComparisonSide,
        technology: Technology,
        field: &str,
        value: f64,
        (min, max): (Option<f64>, Option<f64>),
    ) {
        let below = min.is_some_and(|min| value < min);
        let above = max.is_some_and(|max| value > max);
        if below || above {
            self.warnings.push(CapacityOutOfRangeWarning {
                side,
                technology: technology.label().to_string(),
                field: field.to_string(),
                value,
                min,
                max,
            });
        }
    }
}

fn side_metrics(
    label: ComparisonSide,
    side: &Side<'_>,
    comparison: &Comparison<'_>,
    config: &MetricsConfig,
) -> SideMetrics {
    let resolution = comparison.resolution;
    let result = side.result;
    let annual = |values: &[f64]| annual_energy(values, resolution);
    let pv = result.technology(Technology::Pv);
    let prod_factor = side.profiles.prod_factor.as_ref().filter(|pf| !pf.is_empty());
    let pv_production = match prod_factor {
        Some(pf) if pv.production.is_empty() && pv.kw > 0.0 => {
            pf.values.iter().map(|factor| factor * pv.kw).collect()
        }
        _ => pv.production.clone(),
    };
    let balance = EnergyBalance::new(result, pv_production);
    let discount = discount_rate(side.request);
    let mut out = SideMetrics::default();

    for technology in Technology::ALL {
        let category = technology.label();
        let tech = result.technology(technology);
        let inputs = TechnologyInputs::from_request(side.request, technology);
        out.check_bounds(label, technology, "kw", tech.kw, (inputs.min_kw, inputs.max_kw));
        out.check_bounds(label, technology, "kwh", tech.kwh, (inputs.min_kwh, inputs.max_kwh));

        out.push(category, "kw_capacity", tech.kw);
        match technology {
            Technology::Pv => {
                let production = annual(&balance.pv_production);
                let exports = annual(&tech.to_grid);
                let capacity_factor = match prod_factor {
                    Some(pf) if tech.kw > 0.0 => pf.total() / pf.len() as f64,
                    _ => 0.0,
                };
                out.push(category, "annual_generation_kwh", production);
                out.push(category, "annual_exports_kwh", exports);
                out.push(category, "average_capacity_factor", capacity_factor);
                out.push(
                    "Home",
                    "cover_factor_supply",
                    cover_factor_supply(tech.kw, exports, production),
                );
            }
            Technology::Storage => {
                let discharge = annual(&balance.storage_discharge);
                let charge = annual(&balance.storage_charge);
                out.push(category, "kwh_capacity", tech.kwh);
                out.push(category, "annual_discharge_kwh", discharge);
                out.push(category, "annual_charge_kwh", charge);
                out.push(
                    category,
                    "capacity_utilization_percent",
                    storage_utilization_percent(discharge, charge, tech.kwh),
                );
                out.push("Home", "ra_battery_capacity_kw", ra_battery_capacity(tech.kw, tech.kwh));
            }
            _ => out.push(category, "annual_consumption_kwh", annual(&tech.consumption)),
        }
        out.push(category, "upfront_capital_cost", inputs.installed_cost(tech.kw, tech.kwh));
        out.push(category, "net_installed_cost", inputs.net_installed_cost(tech.kw, tech.kwh));
        out.push(
            category,
            "replacement_cost",
            inputs.replacement_cost(tech.kw, tech.kwh, config.replacement_cost, discount),
        );
    }

    let costs = &result.costs;
    out.push("Financial", "lcc", costs.lcc);
    out.push("Financial", "net_capital_costs", costs.net_capital_costs);
    out.push("Financial", "initial_capital_costs", costs.initial_capital_costs);
    out.push("Financial", "annual_bill", costs.year_one_bill);
    out.push("Financial", "annual_energy_bill", costs.year_one_energy_cost);
    out.push("Financial", "annual_demand_charges", costs.year_one_demand_cost);

    out.push("LCC Breakdown", "total_om_cost", costs.om_costs);
    out.push("LCC Breakdown", "total_utility_fixed_cost", costs.fixed_cost);
    out.push("LCC Breakdown", "total_export_benefit", costs.export_benefit);
    out.push("LCC Breakdown", "total_production_incentive", -costs.production_incentive);

    let home_load = annual(&balance.home_load);
    let grid_purchases = annual(&balance.grid_purchases);
    out.push("Home", "annual_home_load_kwh", home_load);
    out.push("Home", "annual_net_load_kwh", annual(&balance.net_load));
    out.push("Home", "cover_factor_demand", cover_factor_demand(grid_purchases, home_load));
    let resilience = config.resilience.then(|| {
        let storage = result.technology(Technology::Storage);
        average_survival_hours(
            Battery {
                kw: storage.kw,
                kwh: storage.kwh,
                state_of_charge: &storage.state_of_charge,
                round_trip_efficiency: config.round_trip_efficiency,
            },
            &balance.pv_production,
            &balance.home_load,
            resolution.hours_per_step(),
        )
    });
    out.push("Home", "avg_resilience_hours", resilience);

    out.push("External", "annual_grid_purchases_kwh", grid_purchases);
    out.push(
        "External",
        "max_grid_purchase_kw",
        balance.grid_purchases.iter().copied().fold(0.0, f64::max),
    );
    out.push("External", "annual_emissions_tco2", result.emissions.year_one_tco2);
    out.push("External", "lifecycle_emissions_tco2", result.emissions.lifecycle_tco2);
    let prices = comparison
        .wholesale_price
        .filter(|prices| !prices.is_empty() && balance.len > 0);
    let total_grid_cost = prices.map(|p| grid_cost(&balance.net_load, &p.values, resolution));
    out.push(
        "External",
        "grid_peak_contribution",
        prices.map(|p| grid_peak_contribution(&balance.net_load, &p.values)),
    );
    out.push("External", "total_grid_cost_dollars", total_grid_cost);
    out.push(
        "External",
        "average_grid_cost_dollars_per_kwh",
        total_grid_cost.map(|total| if home_load == 0.0 { 0.0 } else { total / home_load }),
    );
    out
}
