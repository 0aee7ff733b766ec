//! Fixed sampling intervals shared by the profiles of one computation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hours in a non-leap modelling year.
pub const HOURS_PER_YEAR: usize = 8760;

/// Sampling interval of a timeseries profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Hourly,
    HalfHourly,
    QuarterHourly,
}

impl Resolution {
    pub fn steps_per_hour(self) -> usize {
        match self {
            Resolution::Hourly => 1,
            Resolution::HalfHourly => 2,
            Resolution::QuarterHourly => 4,
        }
    }

    /// Duration of one sample in hours; converts kW samples to kWh.
    pub fn hours_per_step(self) -> f64 {
        1.0 / self.steps_per_hour() as f64
    }

    pub fn samples_per_year(self) -> usize {
        HOURS_PER_YEAR * self.steps_per_hour()
    }

    pub fn from_steps_per_hour(steps: usize) -> Option<Self> {
        match steps {
            1 => Some(Resolution::Hourly),
            2 => Some(Resolution::HalfHourly),
            4 => Some(Resolution::QuarterHourly),
            _ => None,
        }
    }

    /// Resolution of a single-year series of `len` samples, if it is one.
    pub fn infer_from_len(len: usize) -> Option<Self> {
        [
            Resolution::Hourly,
            Resolution::HalfHourly,
            Resolution::QuarterHourly,
        ]
        .into_iter()
        .find(|resolution| resolution.samples_per_year() == len)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Hourly => "hourly",
            Resolution::HalfHourly => "half_hourly",
            Resolution::QuarterHourly => "quarter_hourly",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "hourly" | "1" | "60min" => Ok(Resolution::Hourly),
            "half_hourly" | "2" | "30min" => Ok(Resolution::HalfHourly),
            "quarter_hourly" | "4" | "15min" => Ok(Resolution::QuarterHourly),
            other => Err(format!(
                "unknown resolution '{other}'; use hourly, half_hourly or quarter_hourly"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_per_year_scale_with_steps() {
        assert_eq!(Resolution::Hourly.samples_per_year(), 8760);
        assert_eq!(Resolution::HalfHourly.samples_per_year(), 17520);
        assert_eq!(Resolution::QuarterHourly.samples_per_year(), 35040);
    }

    #[test]
    fn infer_from_len_matches_single_year_only() {
        assert_eq!(Resolution::infer_from_len(17520), Some(Resolution::HalfHourly));
        assert_eq!(Resolution::infer_from_len(8761), None);
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("half-hourly".parse::<Resolution>(), Ok(Resolution::HalfHourly));
        assert_eq!("15min".parse::<Resolution>(), Ok(Resolution::QuarterHourly));
        assert!("daily".parse::<Resolution>().is_err());
    }
}
