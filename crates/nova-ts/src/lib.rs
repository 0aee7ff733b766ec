//! Timeseries profiles for scenario requests and outputs.
//!
//! Loads load, production-factor and price profiles from tabular (CSV,
//! optionally Parquet) or flat (JSON array, whitespace/comma text) files,
//! checks that every profile of one computation shares a length and
//! resolution, and writes per-scenario timeseries tables.

pub mod align;
pub mod load;
pub mod profile;
pub mod write;

pub use align::{annual_energy, ensure_aligned, ensure_same_length, resample};
pub use load::{load_profile, profile_from_values, ColumnSelector, ProfileSource};
pub use profile::{ProfileSet, TimeseriesProfile};
pub use write::write_columns_csv;
