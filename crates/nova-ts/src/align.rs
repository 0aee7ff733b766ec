//! Length and resolution checks, resampling, and annualisation.

use nova_core::{Resolution, TimeseriesError};

use crate::profile::TimeseriesProfile;

/// All non-empty profiles must share one resolution and one length.
///
/// Empty profiles stand for "not supplied" and are skipped.
pub fn ensure_aligned(profiles: &[&TimeseriesProfile]) -> Result<(), TimeseriesError> {
    let mut reference: Option<&TimeseriesProfile> = None;
    for profile in profiles.iter().copied().filter(|p| !p.is_empty()) {
        let Some(first) = reference else {
            reference = Some(profile);
            continue;
        };
        if profile.resolution != first.resolution {
            return Err(TimeseriesError::format(
                &profile.name,
                format!(
                    "resolution {} differs from '{}' ({})",
                    profile.resolution, first.name, first.resolution
                ),
            ));
        }
        if profile.len() != first.len() {
            return Err(TimeseriesError::format(
                &profile.name,
                format!(
                    "length {} differs from '{}' ({})",
                    profile.len(),
                    first.name,
                    first.len()
                ),
            ));
        }
    }
    Ok(())
}

/// Same check for bare series identified by name, skipping empty ones.
pub fn ensure_same_length(series: &[(&str, usize)]) -> Result<(), TimeseriesError> {
    let mut present = series.iter().filter(|(_, len)| *len > 0);
    let Some(&(first_name, first_len)) = present.next() else {
        return Ok(());
    };
    for &(name, len) in present {
        if len != first_len {
            return Err(TimeseriesError::format(
                name,
                format!("length {len} differs from '{first_name}' ({first_len})"),
            ));
        }
    }
    Ok(())
}

/// Convert a profile to another resolution.
///
/// Downsampling averages each bucket of consecutive samples; upsampling
/// repeats each sample, which keeps power values and annual energy intact.
pub fn resample(profile: &TimeseriesProfile, target: Resolution) -> TimeseriesProfile {
    let from = profile.resolution.steps_per_hour();
    let to = target.steps_per_hour();
    let values = if to < from {
        profile
            .values
            .chunks(from / to)
            .map(|bucket| {
                let stats = bucket.iter().fold(BucketStats::default(), BucketStats::push);
                stats.mean()
            })
            .collect()
    } else if to > from {
        let factor = to / from;
        profile
            .values
            .iter()
            .flat_map(|value| std::iter::repeat(*value).take(factor))
            .collect()
    } else {
        profile.values.clone()
    };
    TimeseriesProfile::new(profile.name.clone(), target, values)
}

/// Annual energy (kWh/yr) of a series of kW samples.
///
/// Multi-year series are divided by their number of years; a series shorter
/// than a year counts as one.
pub fn annual_energy(values: &[f64], resolution: Resolution) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let years = (values.len() as f64 / resolution.samples_per_year() as f64).max(1.0);
    values.iter().sum::<f64>() * resolution.hours_per_step() / years
}

#[derive(Default)]
struct BucketStats {
    count: usize,
    sum: f64,
}

impl BucketStats {
    fn push(mut self, value: &f64) -> Self {
        self.count += 1;
        self.sum += value;
        self
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}
