//! Profile loading.
//!
//! Tabular files are read through polars; flat files are a JSON array or
//! numbers separated by whitespace or commas. Either way the result must
//! hold a whole number of years at the expected resolution.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use nova_core::{Resolution, TimeseriesError};
use polars::prelude::*;
#[cfg(feature = "parquet")]
use polars::prelude::ParquetReader;
use tracing::debug;

use crate::profile::TimeseriesProfile;

/// Column of a tabular file holding the samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    Name(String),
    Index(usize),
}

impl Default for ColumnSelector {
    fn default() -> Self {
        ColumnSelector::Index(0)
    }
}

/// Where a profile comes from and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSource {
    Tabular {
        path: PathBuf,
        column: ColumnSelector,
        has_header: bool,
    },
    Flat {
        path: PathBuf,
    },
}

impl ProfileSource {
    /// Pick a reader from the file extension.
    ///
    /// `.csv` and `.parquet` are tabular; a CSV header is assumed when its
    /// first cell does not parse as a number. Everything else is flat.
    pub fn infer(path: impl Into<PathBuf>, column: Option<ColumnSelector>) -> Self {
        let path = path.into();
        match extension_of(&path).as_str() {
            "csv" => {
                let has_header = first_cell_is_label(&path);
                let column = column.unwrap_or_default();
                ProfileSource::Tabular {
                    path,
                    column,
                    has_header,
                }
            }
            "parquet" => ProfileSource::Tabular {
                path,
                column: column.unwrap_or_default(),
                has_header: true,
            },
            _ => ProfileSource::Flat { path },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ProfileSource::Tabular { path, .. } | ProfileSource::Flat { path } => path,
        }
    }
}

/// Load a profile and check its length against `resolution`.
///
/// An empty source yields an empty profile (the "no profile supplied"
/// case). Any other length must be a multiple of one year of samples.
pub fn load_profile(
    name: &str,
    source: &ProfileSource,
    resolution: Resolution,
) -> Result<TimeseriesProfile, TimeseriesError> {
    let path = source.path();
    if !path.exists() {
        return Err(TimeseriesError::Missing {
            path: path.display().to_string(),
        });
    }
    let values = match source {
        ProfileSource::Tabular {
            path,
            column,
            has_header,
        } => read_tabular(path, column, *has_header)?,
        ProfileSource::Flat { path } => read_flat(path)?,
    };
    validate_length(&path.display().to_string(), values.len(), resolution)?;
    debug!(
        profile = name,
        path = %path.display(),
        samples = values.len(),
        resolution = %resolution,
        "loaded profile"
    );
    Ok(TimeseriesProfile::new(name, resolution, values))
}

/// Wrap in-memory samples (e.g. a list embedded in a request) as a profile,
/// applying the same length rule as file sources.
pub fn profile_from_values(
    name: &str,
    values: Vec<f64>,
    resolution: Resolution,
) -> Result<TimeseriesProfile, TimeseriesError> {
    validate_length(name, values.len(), resolution)?;
    Ok(TimeseriesProfile::new(name, resolution, values))
}

pub(crate) fn validate_length(
    origin: &str,
    len: usize,
    resolution: Resolution,
) -> Result<(), TimeseriesError> {
    let per_year = resolution.samples_per_year();
    if len % per_year != 0 {
        return Err(TimeseriesError::format(
            origin,
            format!(
                "length {len} is not a multiple of {per_year} samples per year at {resolution} resolution"
            ),
        ));
    }
    Ok(())
}

fn read_tabular(
    path: &Path,
    column: &ColumnSelector,
    has_header: bool,
) -> Result<Vec<f64>, TimeseriesError> {
    let origin = path.display().to_string();
    let polars_err = |err: PolarsError| TimeseriesError::format(&origin, err.to_string());
    let df = read_frame(path, has_header).map_err(polars_err)?;
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let series = match column {
        ColumnSelector::Name(name) => df.column(name).map_err(|_| {
            TimeseriesError::format(
                &origin,
                format!(
                    "column '{name}' not found; available: {}",
                    df.get_column_names().join(", ")
                ),
            )
        })?,
        ColumnSelector::Index(index) => df.get_columns().get(*index).ok_or_else(|| {
            TimeseriesError::format(
                &origin,
                format!("column {index} out of range; file has {} columns", df.width()),
            )
        })?,
    };

    let casted = series.cast(&DataType::Float64).map_err(polars_err)?;
    let values = casted.f64().map_err(polars_err)?;
    let header_rows = usize::from(has_header);
    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| {
                let raw = series
                    .get(row)
                    .map(|cell| cell.to_string())
                    .unwrap_or_default();
                TimeseriesError::format(
                    &origin,
                    format!(
                        "non-numeric or empty cell {raw} at line {}",
                        row + 1 + header_rows
                    ),
                )
            })
        })
        .collect()
}

fn read_frame(path: &Path, has_header: bool) -> PolarsResult<DataFrame> {
    let file = File::open(path)?;
    match extension_of(path).as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => ParquetReader::new(file).finish(),
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(PolarsError::ComputeError(
            "parquet support is disabled; rebuild with the 'parquet' feature".into(),
        )),
        _ => CsvReader::new(file).has_header(has_header).finish(),
    }
}

fn read_flat(path: &Path) -> Result<Vec<f64>, TimeseriesError> {
    let origin = path.display().to_string();
    let text = fs::read_to_string(path)
        .map_err(|err| TimeseriesError::format(&origin, err.to_string()))?;
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        let items: Vec<serde_json::Value> = serde_json::from_str(trimmed)
            .map_err(|err| TimeseriesError::format(&origin, err.to_string()))?;
        return items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_f64().ok_or_else(|| {
                    TimeseriesError::format(
                        &origin,
                        format!("element {index} is not a number: {item}"),
                    )
                })
            })
            .collect();
    }
    trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(index, token)| {
            token.parse::<f64>().map_err(|_| {
                TimeseriesError::format(
                    &origin,
                    format!("value {index} is not a number: '{token}'"),
                )
            })
        })
        .collect()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

fn first_cell_is_label(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut line = String::new();
    if BufReader::new(file).read_line(&mut line).is_err() {
        return false;
    }
    let first = line.split(',').next().unwrap_or_default().trim();
    !first.is_empty() && first.trim_matches('"').parse::<f64>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use tempfile::tempdir;

    fn hourly_csv(header: Option<&str>, value: impl Fn(usize) -> String) -> String {
        let mut out = String::new();
        if let Some(header) = header {
            writeln!(out, "{header}").unwrap();
        }
        for hour in 0..8760 {
            writeln!(out, "{}", value(hour)).unwrap();
        }
        out
    }

    #[test]
    fn loads_named_column_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("load.csv");
        fs::write(
            &path,
            hourly_csv(Some("hour,kw"), |h| format!("{h},{}", (h % 24) as f64 + 0.5)),
        )
        .unwrap();

        let source = ProfileSource::infer(&path, Some(ColumnSelector::Name("kw".into())));
        assert!(matches!(source, ProfileSource::Tabular { has_header: true, .. }));
        let profile = load_profile("load", &source, Resolution::Hourly).unwrap();
        assert_eq!(profile.len(), 8760);
        assert_eq!(profile.values[1], 1.5);
    }

    #[test]
    fn headerless_csv_reads_first_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pf.csv");
        fs::write(&path, hourly_csv(None, |_| "0.25".into())).unwrap();

        let source = ProfileSource::infer(&path, None);
        assert!(matches!(source, ProfileSource::Tabular { has_header: false, .. }));
        let profile = load_profile("pf", &source, Resolution::Hourly).unwrap();
        assert_eq!(profile.total(), 0.25 * 8760.0);
    }

    #[test]
    fn non_numeric_cell_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("load.csv");
        fs::write(
            &path,
            hourly_csv(Some("kw"), |h| if h == 3 { "abc".into() } else { "1.0".into() }),
        )
        .unwrap();

        let err = load_profile(
            "load",
            &ProfileSource::infer(&path, Some(ColumnSelector::Name("kw".into()))),
            Resolution::Hourly,
        )
        .unwrap_err();
        assert!(matches!(err, TimeseriesError::Format { .. }), "{err}");
    }

    #[test]
    fn unknown_column_lists_available() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("load.csv");
        fs::write(&path, hourly_csv(Some("kw"), |_| "1".into())).unwrap();

        let err = load_profile(
            "load",
            &ProfileSource::infer(&path, Some(ColumnSelector::Name("load_kw".into()))),
            Resolution::Hourly,
        )
        .unwrap_err();
        assert!(err.to_string().contains("available: kw"), "{err}");
    }

    #[test]
    fn length_must_cover_whole_years() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("load.txt");
        fs::write(&path, vec!["1.0"; 8759].join("\n")).unwrap();

        let err = load_profile("load", &ProfileSource::infer(&path, None), Resolution::Hourly)
            .unwrap_err();
        assert!(err.to_string().contains("8759"), "{err}");
        assert!(matches!(err, TimeseriesError::Format { .. }));
    }

    #[test]
    fn half_hourly_year_needs_twice_the_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("load.txt");
        fs::write(&path, vec!["1.0"; 8760].join(" ")).unwrap();

        let source = ProfileSource::infer(&path, None);
        assert!(load_profile("load", &source, Resolution::Hourly).is_ok());
        assert!(load_profile("load", &source, Resolution::HalfHourly).is_err());
    }

    #[test]
    fn flat_json_and_text_agree() {
        let dir = tempdir().unwrap();
        let values: Vec<String> = (0..8760).map(|h| format!("{}", h % 7)).collect();
        let json_path = dir.path().join("pf.json");
        let txt_path = dir.path().join("pf.txt");
        fs::write(&json_path, format!("[{}]", values.join(","))).unwrap();
        fs::write(&txt_path, values.join(",\n")).unwrap();

        let from_json =
            load_profile("pf", &ProfileSource::infer(&json_path, None), Resolution::Hourly).unwrap();
        let from_txt =
            load_profile("pf", &ProfileSource::infer(&txt_path, None), Resolution::Hourly).unwrap();
        assert_eq!(from_json.values, from_txt.values);
    }

    #[test]
    fn empty_flat_file_is_empty_profile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("none.json");
        fs::write(&path, "[]").unwrap();
        let profile =
            load_profile("pf", &ProfileSource::infer(&path, None), Resolution::Hourly).unwrap();
        assert!(profile.is_empty());
    }

    #[test]
    fn in_memory_values_follow_length_rule() {
        assert!(profile_from_values("loads_kw", vec![1.0; 8760], Resolution::Hourly).is_ok());
        let err = profile_from_values("loads_kw", vec![1.0; 100], Resolution::Hourly).unwrap_err();
        assert!(err.to_string().contains("loads_kw"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_profile(
            "load",
            &ProfileSource::infer("/nonexistent/load.csv", None),
            Resolution::Hourly,
        )
        .unwrap_err();
        assert_eq!(
            err,
            TimeseriesError::Missing {
                path: "/nonexistent/load.csv".into()
            }
        );
    }
}
