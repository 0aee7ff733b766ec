pub mod assemble;
pub mod job;
pub mod manifest;
pub mod runner;

pub use assemble::{frame_path, summary_rows, Assembled, DispatchFrame, OutputAssembler, TimeseriesOutput};
pub use job::{ErrorEntry, ErrorSummary, JobRecord, JobStatus};
pub use manifest::{load_run_manifest, write_run_manifest, RunManifest, RUN_MANIFEST};
pub use runner::{BatchRunner, RunConfig, RunSummary};
