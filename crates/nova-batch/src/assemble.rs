//! Collects computed records and writes the run's output artifacts.
//!
//! ```text
//! out/
//!   metrics_summary.csv
//!   metrics_summary.json
//!   run_manifest.json
//!   timeseries/<site>/<scenario>_timeseries.csv
//! ```

use nova_core::{sanitize_name, OutputWriteError, Resolution};
use nova_metrics::MetricRecord;
use nova_ts::{resample, write_columns_csv, TimeseriesProfile};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::job::{run_wide, ErrorSummary};

pub const METRICS_CSV: &str = "metrics_summary.csv";
pub const METRICS_JSON: &str = "metrics_summary.json";

const IDENTITY_COLUMNS: &[&str] = &[
    "index",
    "site",
    "site_name",
    "latitude",
    "longitude",
    "urdb_label",
    "scenario",
    "baseline",
    "baseline_type",
    "run_id",
];

/// Dispatch table of one scenario or baseline, written when timeseries output is on.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFrame {
    pub index: usize,
    pub site: String,
    pub scenario: String,
    pub resolution: Resolution,
    pub columns: Vec<(&'static str, Vec<f64>)>,
}

/// Timeseries output settings; `resolution` resamples every column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeseriesOutput {
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Default)]
pub struct Assembled {
    pub records: Vec<MetricRecord>,
    pub files: Vec<PathBuf>,
}

/// Single-owner sink for worker results.
#[derive(Debug)]
pub struct OutputAssembler {
    root: PathBuf,
    timeseries: Option<TimeseriesOutput>,
    records: Vec<MetricRecord>,
    frames: Vec<DispatchFrame>,
}

impl OutputAssembler {
    pub fn new(root: impl Into<PathBuf>, timeseries: Option<TimeseriesOutput>) -> Self {
        OutputAssembler {
            root: root.into(),
            timeseries,
            records: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub fn wants_timeseries(&self) -> bool {
        self.timeseries.is_some()
    }

    pub fn accept(&mut self, record: MetricRecord, frame: Option<DispatchFrame>) {
        self.records.push(record);
        if self.timeseries.is_some() {
            self.frames.extend(frame);
        }
    }

    /// Dispatch table without a metric record of its own, such as a site's baseline.
    pub fn accept_frame(&mut self, frame: DispatchFrame) {
        if self.timeseries.is_some() {
            self.frames.push(frame);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort by discovery index and write every artifact.
    ///
    /// A failed write is returned only while nothing has been written yet;
    /// later failures are logged and added to `errors`.
    pub fn finish(mut self, errors: &mut ErrorSummary) -> Result<Assembled, OutputWriteError> {
        self.records.sort_by_key(|record| record.index);
        self.frames.sort_by_key(|frame| frame.index);
        let mut files = Vec::new();
        let mut record = |result: Result<PathBuf, OutputWriteError>, files: &mut Vec<PathBuf>| {
            match result {
                Ok(path) => {
                    files.push(path);
                    Ok(())
                }
                Err(err) if files.is_empty() => Err(err),
                Err(err) => {
                    error!(path = %err.path, "{err}");
                    errors.push(&run_wide(), &err.into());
                    Ok(())
                }
            }
        };

        record(self.write_csv(), &mut files)?;
        record(self.write_json(), &mut files)?;
        if let Some(settings) = self.timeseries {
            for frame in &self.frames {
                record(self.write_frame(frame, settings), &mut files)?;
            }
        }
        info!(
            records = self.records.len(),
            files = files.len(),
            root = %self.root.display(),
            "wrote run outputs"
        );
        Ok(Assembled {
            records: self.records,
            files,
        })
    }

    fn write_csv(&self) -> Result<PathBuf, OutputWriteError> {
        let path = self.root.join(METRICS_CSV);
        let fail = |message: String| OutputWriteError {
            path: path.display().to_string(),
            message,
        };
        fs::create_dir_all(&self.root).map_err(|err| fail(err.to_string()))?;
        let mut writer = csv::Writer::from_path(&path).map_err(|err| fail(err.to_string()))?;
        for row in summary_rows(&self.records) {
            writer.write_record(&row).map_err(|err| fail(err.to_string()))?;
        }
        writer.flush().map_err(|err| fail(err.to_string()))?;
        Ok(path)
    }

    fn write_json(&self) -> Result<PathBuf, OutputWriteError> {
        let path = self.root.join(METRICS_JSON);
        let fail = |message: String| OutputWriteError {
            path: path.display().to_string(),
            message,
        };
        let file = File::create(&path).map_err(|err| fail(err.to_string()))?;
        serde_json::to_writer_pretty(file, &self.records).map_err(|err| fail(err.to_string()))?;
        Ok(path)
    }

    fn write_frame(
        &self,
        frame: &DispatchFrame,
        settings: TimeseriesOutput,
    ) -> Result<PathBuf, OutputWriteError> {
        let path = frame_path(&self.root, &frame.site, &frame.scenario);
        let columns: Vec<(&str, Vec<f64>)> = match settings.resolution {
            Some(target) if target != frame.resolution => frame
                .columns
                .iter()
                .map(|(name, values)| {
                    let profile = TimeseriesProfile::new(*name, frame.resolution, values.clone());
                    (*name, resample(&profile, target).values)
                })
                .collect(),
            _ => frame
                .columns
                .iter()
                .map(|(name, values)| (*name, values.clone()))
                .collect(),
        };
        let borrowed: Vec<(&str, &[f64])> = columns
            .iter()
            .map(|(name, values)| (*name, values.as_slice()))
            .collect();
        write_columns_csv(&path, &borrowed).map_err(|err| OutputWriteError {
            path: path.display().to_string(),
            message: format!("{err:#}"),
        })?;
        Ok(path)
    }
}

pub fn frame_path(root: &Path, site: &str, scenario: &str) -> PathBuf {
    root.join("timeseries")
        .join(sanitize_name(site))
        .join(format!("{}_timeseries.csv", sanitize_name(scenario)))
}

/// Header plus one row per record.
///
/// Metric columns are the union over all records in first-seen order, so a
/// metric only some records carry leaves blank cells elsewhere.
pub fn summary_rows(records: &[MetricRecord]) -> Vec<Vec<String>> {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for metric in &record.metrics {
            if !names.contains(&metric.name.as_str()) {
                names.push(&metric.name);
            }
        }
    }

    let mut header: Vec<String> = IDENTITY_COLUMNS.iter().map(|c| c.to_string()).collect();
    for name in &names {
        header.push(name.to_string());
        header.push(format!("{name}_baseline"));
        header.push(format!("{name}_delta"));
    }
    header.push("Financial-npv".into());
    header.push("warnings".into());

    let optional = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    let mut rows = vec![header];
    for record in records {
        let mut row = vec![
            record.index.to_string(),
            record.site.id.clone(),
            record.site.name.clone(),
            optional(record.site.latitude),
            optional(record.site.longitude),
            record.site.urdb_label.clone().unwrap_or_default(),
            record.scenario_id.clone(),
            record.baseline_id.clone(),
            record.baseline_type.clone(),
            record.run_id.clone().unwrap_or_default(),
        ];
        for name in &names {
            match record.metric(name) {
                Some(metric) => {
                    row.push(metric.scenario.to_string());
                    row.push(metric.baseline.to_string());
                    row.push(metric.delta.to_string());
                }
                None => row.extend([String::new(), String::new(), String::new()]),
            }
        }
        row.push(record.npv.to_string());
        row.push(
            record
                .warnings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        );
        rows.push(row);
    }
    rows
}
