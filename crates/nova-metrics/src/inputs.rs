//! Cost and sizing parameters read back from a resolved request.

use nova_core::Node;
use nova_results::Technology;
use nova_scenarios::ResolvedRequest;

use crate::config::{ReplacementCostConvention, DEFAULT_REPLACEMENT_YEAR};

const REQUEST_PREFIXES: &[&[&str]] = &[&["Scenario", "Site"], &[]];

/// Per-technology cost parameters and sizing bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechnologyInputs {
    pub installed_per_kw: f64,
    pub installed_per_kwh: f64,
    pub replace_per_kw: f64,
    pub replace_per_kwh: f64,
    pub replacement_year: f64,
    /// Investment tax credit as a fraction
    pub itc: f64,
    pub min_kw: Option<f64>,
    pub max_kw: Option<f64>,
    pub min_kwh: Option<f64>,
    pub max_kwh: Option<f64>,
}

impl TechnologyInputs {
    pub fn from_request(request: &ResolvedRequest, technology: Technology) -> Self {
        let section = technology.section();
        let number = |names: &[&str]| request_number(request, section, names);
        TechnologyInputs {
            installed_per_kw: number(&["installed_cost_us_dollars_per_kw"]).unwrap_or_default(),
            installed_per_kwh: number(&["installed_cost_us_dollars_per_kwh"]).unwrap_or_default(),
            replace_per_kw: number(&["replace_cost_us_dollars_per_kw"]).unwrap_or_default(),
            replace_per_kwh: number(&["replace_cost_us_dollars_per_kwh"]).unwrap_or_default(),
            replacement_year: number(&[
                "battery_replacement_year",
                "inverter_replacement_year",
                "replacement_year",
            ])
            .unwrap_or(DEFAULT_REPLACEMENT_YEAR),
            itc: number(&["federal_itc_pct", "total_itc_pct", "itc_pct"])
                .map(as_fraction)
                .unwrap_or_default(),
            min_kw: number(&["min_kw"]),
            max_kw: number(&["max_kw"]),
            min_kwh: number(&["min_kwh"]),
            max_kwh: number(&["max_kwh"]),
        }
    }

    pub fn installed_cost(&self, kw: f64, kwh: f64) -> f64 {
        kw * self.installed_per_kw + kwh * self.installed_per_kwh
    }

    pub fn net_installed_cost(&self, kw: f64, kwh: f64) -> f64 {
        self.installed_cost(kw, kwh) * (1.0 - self.itc)
    }

    pub fn replacement_cost(
        &self,
        kw: f64,
        kwh: f64,
        convention: ReplacementCostConvention,
        discount_rate: f64,
    ) -> f64 {
        let nominal = kw * self.replace_per_kw + kwh * self.replace_per_kwh;
        match convention {
            ReplacementCostConvention::Nominal => nominal,
            ReplacementCostConvention::PresentValue => {
                nominal / (1.0 + discount_rate).powf(self.replacement_year)
            }
        }
    }
}

/// Discount rate of the request as a fraction, 0 when absent.
pub fn discount_rate(request: &ResolvedRequest) -> f64 {
    request_number(
        request,
        "Financial",
        &["offtaker_discount_pct", "owner_discount_pct", "discount_rate"],
    )
    .map(as_fraction)
    .unwrap_or_default()
}

/// Values above 1 are percentages.
fn as_fraction(value: f64) -> f64 {
    if value > 1.0 {
        value / 100.0
    } else {
        value
    }
}

fn request_number(request: &ResolvedRequest, section: &str, names: &[&str]) -> Option<f64> {
    REQUEST_PREFIXES.iter().find_map(|prefix| {
        let base = prefix
            .iter()
            .copied()
            .chain([section])
            .try_fold(&request.body, |node, segment| node.get(segment))?;
        names
            .iter()
            .find_map(|name| base.get(name).and_then(Node::as_f64))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_scenarios::Directives;
    use serde_json::json;

    fn request(body: serde_json::Value) -> ResolvedRequest {
        ResolvedRequest {
            scenario_id: "pv".into(),
            body: Node::from(body),
            directives: Directives::default(),
        }
    }

    #[test]
    fn reads_nested_and_flat_sections() {
        let nested = request(json!({"Scenario": {"Site": {"PV": {
            "installed_cost_us_dollars_per_kw": 1500, "federal_itc_pct": 26, "max_kw": 300
        }}}}));
        let inputs = TechnologyInputs::from_request(&nested, Technology::Pv);
        assert_eq!(inputs.installed_per_kw, 1500.0);
        assert_eq!(inputs.itc, 0.26);
        assert_eq!(inputs.max_kw, Some(300.0));
        assert_eq!(inputs.replacement_year, DEFAULT_REPLACEMENT_YEAR);

        let flat = request(json!({"Storage": {"installed_cost_us_dollars_per_kwh": 400, "total_itc_pct": 0.3}}));
        let inputs = TechnologyInputs::from_request(&flat, Technology::Storage);
        assert_eq!(inputs.installed_cost(5.0, 20.0), 8000.0);
        assert_eq!(inputs.itc, 0.3);
    }

    #[test]
    fn present_value_discounts_by_replacement_year() {
        let inputs = TechnologyInputs {
            replace_per_kwh: 200.0,
            replacement_year: 2.0,
            ..TechnologyInputs::default()
        };
        assert_eq!(
            inputs.replacement_cost(0.0, 10.0, ReplacementCostConvention::Nominal, 0.1),
            2000.0
        );
        let pv = inputs.replacement_cost(0.0, 10.0, ReplacementCostConvention::PresentValue, 0.1);
        assert!((pv - 2000.0 / 1.21).abs() < 1e-9);
    }

    #[test]
    fn discount_rate_accepts_percent() {
        let req = request(json!({"Scenario": {"Site": {"Financial": {"offtaker_discount_pct": 8.3}}}}));
        assert!((discount_rate(&req) - 0.083).abs() < 1e-12);
    }
}
