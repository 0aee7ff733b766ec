use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use polars::prelude::*;

/// Write equal-length named columns as a CSV table.
///
/// The table is first written under a `.staging` directory next to `path`
/// and then renamed into place, so readers never observe a partial file.
pub fn write_columns_csv(path: &Path, columns: &[(&str, &[f64])]) -> Result<()> {
    if let Some((name, values)) = columns.first() {
        if let Some((other, other_values)) = columns.iter().find(|(_, v)| v.len() != values.len()) {
            bail!(
                "column '{other}' has {} rows but '{name}' has {}",
                other_values.len(),
                values.len()
            );
        }
    }
    let series: Vec<Series> = columns
        .iter()
        .map(|(name, values)| Series::new(name, *values))
        .collect();
    let mut df = DataFrame::new(series).context("assembling timeseries table")?;

    let staged = staged_output_path(path);
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    {
        let mut file =
            File::create(&staged).with_context(|| format!("creating {}", staged.display()))?;
        CsvWriter::new(&mut file)
            .finish(&mut df)
            .context("writing CSV file")?;
    }
    fs::rename(&staged, path)
        .with_context(|| format!("moving {} to {}", staged.display(), path.display()))?;
    if let Some(parent) = staged.parent() {
        // fails while other staged files remain
        let _ = fs::remove_dir(parent);
    }
    Ok(())
}

fn staged_output_path(output: &Path) -> PathBuf {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let file_name = output.file_name().unwrap_or_else(|| OsStr::new("output.csv"));
    parent.join(".staging").join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{load_profile, ColumnSelector, ProfileSource};
    use nova_core::Resolution;
    use tempfile::tempdir;

    #[test]
    fn writes_table_and_clears_staging() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("denver").join("pv_175_timeseries.csv");
        fs::create_dir_all(out.parent().unwrap()).unwrap();
        let load = vec![1.5; 8760];
        let pv = vec![0.25; 8760];
        write_columns_csv(&out, &[("load_kw", load.as_slice()), ("pv_kw", pv.as_slice())]).unwrap();

        assert!(out.exists());
        assert!(!out.parent().unwrap().join(".staging").join("pv_175_timeseries.csv").exists());

        let source = ProfileSource::infer(&out, Some(ColumnSelector::Name("pv_kw".into())));
        let reread = load_profile("pv", &source, Resolution::Hourly).unwrap();
        assert_eq!(reread.values, pv);
    }

    #[test]
    fn rejects_ragged_columns() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("ragged.csv");
        let err = write_columns_csv(&out, &[("a", &[1.0, 2.0][..]), ("b", &[1.0][..])]).unwrap_err();
        assert!(err.to_string().contains("'b'"));
        assert!(!out.exists());
    }
}
