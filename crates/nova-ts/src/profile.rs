use nova_core::Resolution;

use crate::align::annual_energy;

/// An ordered series of samples at a fixed resolution.
///
/// Loaded profiles always cover a whole number of years; the loader rejects
/// anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesProfile {
    pub name: String,
    pub resolution: Resolution,
    pub values: Vec<f64>,
}

impl TimeseriesProfile {
    pub fn new(name: impl Into<String>, resolution: Resolution, values: Vec<f64>) -> Self {
        TimeseriesProfile {
            name: name.into(),
            resolution,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of modelled years covered by the samples.
    pub fn years(&self) -> f64 {
        self.values.len() as f64 / self.resolution.samples_per_year() as f64
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Annual energy of a power profile (kW samples to kWh per year).
    pub fn annual_energy(&self) -> f64 {
        annual_energy(&self.values, self.resolution)
    }
}

/// Profiles attached to one side (baseline or scenario) of a comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSet {
    pub load: Option<TimeseriesProfile>,
    pub prod_factor: Option<TimeseriesProfile>,
}

impl ProfileSet {
    pub fn iter(&self) -> impl Iterator<Item = &TimeseriesProfile> {
        self.load.iter().chain(self.prod_factor.iter())
    }
}
