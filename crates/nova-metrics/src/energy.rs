//! Per-step energy balance of one optimized result.

use nova_core::{Resolution, HOURS_PER_YEAR};
use nova_results::{NormalizedResult, Technology};
use nova_ts::annual_energy;

/// Usable fraction of storage energy over a four-hour resource-adequacy event.
const RA_DISCHARGE_EFFICIENCY: f64 = 0.936;
const RA_USABLE_SOC: f64 = 0.8;
const RA_EVENT_HOURS: f64 = 4.0;

/// Number of highest net-load samples averaged for the peak reference.
const PEAK_SAMPLES: usize = 10;

/// Step series derived from the dispatch of one result, all of length `len`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyBalance {
    pub len: usize,
    pub grid_purchases: Vec<f64>,
    pub home_load: Vec<f64>,
    pub net_load: Vec<f64>,
    pub pv_production: Vec<f64>,
    pub storage_discharge: Vec<f64>,
    pub storage_charge: Vec<f64>,
}

impl EnergyBalance {
    /// `pv_production` is the PV series to use: reported, or derived from the
    /// production factor when the result carries none.
    pub fn new(result: &NormalizedResult, pv_production: Vec<f64>) -> Self {
        let pv = result.technology(Technology::Pv);
        let storage = result.technology(Technology::Storage);
        let len = result
            .series()
            .iter()
            .map(|(_, values)| values.len())
            .chain([pv_production.len()])
            .max()
            .unwrap_or_default();
        let at = |values: &[f64], step: usize| values.get(step).copied().unwrap_or_default();

        let grid_purchases = (0..len)
            .map(|t| at(&result.grid.to_load, t) + at(&result.grid.to_battery, t))
            .collect::<Vec<_>>();
        let net_load = (0..len)
            .map(|t| grid_purchases[t] - at(&pv.to_grid, t) - at(&storage.to_grid, t))
            .collect();
        let home_load = (0..len)
            .map(|t| at(&result.grid.to_load, t) + at(&pv.to_load, t) + at(&storage.to_load, t))
            .collect();
        let storage_discharge = (0..len)
            .map(|t| at(&storage.to_load, t) + at(&storage.to_grid, t))
            .collect();
        let storage_charge = (0..len)
            .map(|t| at(&result.grid.to_battery, t) + at(&pv.to_battery, t))
            .collect();
        let pv_production = if pv_production.is_empty() {
            vec![0.0; len]
        } else {
            pv_production
        };
        EnergyBalance {
            len,
            grid_purchases,
            home_load,
            net_load,
            pv_production,
            storage_discharge,
            storage_charge,
        }
    }
}

/// 1 − grid purchases / home load.
pub fn cover_factor_demand(grid_purchases_kwh: f64, home_load_kwh: f64) -> f64 {
    if home_load_kwh == 0.0 {
        0.0
    } else {
        1.0 - grid_purchases_kwh / home_load_kwh
    }
}

/// Fraction of PV production consumed on site; 0 without PV.
pub fn cover_factor_supply(pv_kw: f64, exports_kwh: f64, production_kwh: f64) -> f64 {
    if pv_kw == 0.0 || production_kwh == 0.0 {
        0.0
    } else {
        1.0 - exports_kwh / production_kwh
    }
}

/// Annual charge plus discharge relative to cycling the full capacity every hour.
pub fn storage_utilization_percent(discharge_kwh: f64, charge_kwh: f64, kwh: f64) -> f64 {
    if kwh == 0.0 {
        0.0
    } else {
        (discharge_kwh + charge_kwh) / (kwh * HOURS_PER_YEAR as f64) * 100.0
    }
}

/// Power a battery can hold through a four-hour event.
pub fn ra_battery_capacity(kw: f64, kwh: f64) -> f64 {
    kw.min(kwh * RA_DISCHARGE_EFFICIENCY * RA_USABLE_SOC / RA_EVENT_HOURS)
}

/// Average net load during the 5 % highest-price steps relative to the
/// average of the ten largest net-load steps.
pub fn grid_peak_contribution(net_load: &[f64], prices: &[f64]) -> f64 {
    let len = net_load.len().min(prices.len());
    if len == 0 {
        return 0.0;
    }
    let mut sorted_load = net_load[..len].to_vec();
    sorted_load.sort_by(|a, b| b.total_cmp(a));
    let top = &sorted_load[..PEAK_SAMPLES.min(len)];
    let top_load = top.iter().sum::<f64>() / top.len() as f64;
    if top_load == 0.0 {
        return 0.0;
    }

    let mut steps: Vec<usize> = (0..len).collect();
    steps.sort_by(|a, b| prices[*b].total_cmp(&prices[*a]));
    let peak_steps = (len * 5 / 100).max(1);
    let peak_load = steps[..peak_steps].iter().map(|t| net_load[*t]).sum::<f64>() / peak_steps as f64;
    peak_load / top_load
}

/// Annual cost of net load at wholesale prices ($/MWh), in dollars.
pub fn grid_cost(net_load: &[f64], prices: &[f64], resolution: Resolution) -> f64 {
    let cost: Vec<f64> = net_load
        .iter()
        .zip(prices)
        .map(|(load, price)| load * price / 1000.0)
        .collect();
    annual_energy(&cost, resolution)
}

/// Columns of the per-scenario dispatch table.
///
/// Flexible-load columns appear only for technologies that consumed energy.
pub fn dispatch_columns(result: &NormalizedResult) -> Vec<(&'static str, Vec<f64>)> {
    let balance = EnergyBalance::new(result, result.technology(Technology::Pv).production.clone());
    let pv = result.technology(Technology::Pv);
    let storage = result.technology(Technology::Storage);
    let padded = |values: &[f64]| {
        let mut out = values.to_vec();
        out.resize(balance.len, 0.0);
        out
    };
    let mut columns = vec![
        ("home_load", balance.home_load.clone()),
        ("grid_to_load", padded(&result.grid.to_load)),
        ("pv_to_load", padded(&pv.to_load)),
        ("storage_to_load", padded(&storage.to_load)),
        ("pv_to_storage", padded(&pv.to_battery)),
        ("grid_to_storage", padded(&result.grid.to_battery)),
        ("pv_exports", padded(&pv.to_grid)),
        ("storage_exports", padded(&storage.to_grid)),
        ("storage_state_of_charge", padded(&storage.state_of_charge)),
    ];
    let flexible = [
        (Technology::AirConditioner, "ac_load"),
        (Technology::HeatPump, "hp_load"),
        (Technology::ElectricWaterHeater, "erwh_load"),
        (Technology::HeatPumpWaterHeater, "hpwh_load"),
    ];
    for (technology, column) in flexible {
        let consumption = &result.technology(technology).consumption;
        if consumption.iter().sum::<f64>() > 0.0 {
            columns.push((column, padded(consumption)));
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_results::{GridResult, TechnologyResult};

    fn result() -> NormalizedResult {
        let mut result = NormalizedResult {
            grid: GridResult {
                to_load: vec![2.0, 0.0, 1.0],
                to_battery: vec![0.0, 0.0, 1.0],
            },
            ..NormalizedResult::default()
        };
        result.technologies.insert(
            Technology::Pv,
            TechnologyResult {
                kw: 3.0,
                to_load: vec![0.0, 2.0, 0.0],
                to_grid: vec![0.0, 1.0, 0.0],
                ..TechnologyResult::default()
            },
        );
        result
    }

    #[test]
    fn balance_follows_dispatch() {
        let balance = EnergyBalance::new(&result(), Vec::new());
        assert_eq!(balance.len, 3);
        assert_eq!(balance.grid_purchases, vec![2.0, 0.0, 2.0]);
        assert_eq!(balance.home_load, vec![2.0, 2.0, 1.0]);
        assert_eq!(balance.net_load, vec![2.0, -1.0, 2.0]);
        assert_eq!(balance.pv_production, vec![0.0; 3]);
    }

    #[test]
    fn ratios_guard_zero_denominators() {
        assert_eq!(cover_factor_demand(5.0, 0.0), 0.0);
        assert_eq!(cover_factor_demand(25.0, 100.0), 0.75);
        assert_eq!(cover_factor_supply(0.0, 1.0, 10.0), 0.0);
        assert!((cover_factor_supply(5.0, 2.0, 10.0) - 0.8).abs() < 1e-12);
        assert_eq!(storage_utilization_percent(1.0, 1.0, 0.0), 0.0);
    }

    #[test]
    fn ra_capacity_is_energy_limited() {
        assert_eq!(ra_battery_capacity(5.0, 10.0), 10.0 * 0.936 * 0.8 / 4.0);
        assert_eq!(ra_battery_capacity(1.0, 100.0), 1.0);
    }

    #[test]
    fn peak_contribution_uses_highest_price_steps() {
        let net_load: Vec<f64> = (0..20).map(|t| if t == 3 { 4.0 } else { 2.0 }).collect();
        let mut prices = vec![10.0; 20];
        prices[3] = 100.0;
        // one peak step (5 % of 20); top ten loads average (4 + 9 * 2) / 10
        assert!((grid_peak_contribution(&net_load, &prices) - 4.0 / 2.2).abs() < 1e-12);
        assert_eq!(grid_peak_contribution(&[0.0; 4], &[1.0; 4]), 0.0);
    }

    #[test]
    fn dispatch_table_pads_missing_series() {
        let columns = dispatch_columns(&result());
        assert_eq!(columns.len(), 9);
        assert!(columns.iter().all(|(_, values)| values.len() == 3));
        assert_eq!(columns[0], ("home_load", vec![2.0, 2.0, 1.0]));
    }
}
