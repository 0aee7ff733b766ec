use anyhow::{Context, Result};
use chrono::Utc;
use nova_core::{NovaError, Resolution, ScenarioKey};
use nova_metrics::{compute, dispatch_columns, Comparison, MetricRecord, MetricsConfig, Side};
use nova_results::{interpret, invoke_with_timeout, NormalizedResult, OptimizationService};
use nova_scenarios::{request_profiles, wholesale_prices, PairingOutcome, ProfileTargets, ResolvedRequest, Triple};
use nova_ts::ProfileSet;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assemble::{DispatchFrame, OutputAssembler, TimeseriesOutput};
use crate::job::{run_wide, ErrorSummary, JobRecord, JobStatus};
use crate::manifest::{write_run_manifest, RunManifest, RUN_MANIFEST};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_root: PathBuf,
    /// Worker threads; 0 uses one per CPU
    pub threads: usize,
    /// Per service call
    pub timeout: Duration,
    pub resolution: Resolution,
    pub targets: ProfileTargets,
    pub metrics: MetricsConfig,
    pub timeseries: Option<TimeseriesOutput>,
    /// Stop dispatching after the first failed triple
    pub fail_fast: bool,
}

impl RunConfig {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        RunConfig {
            output_root: output_root.into(),
            threads: 0,
            timeout: Duration::from_secs(600),
            resolution: Resolution::Hourly,
            targets: ProfileTargets::default(),
            metrics: MetricsConfig::default(),
            timeseries: None,
            fail_fast: false,
        }
    }
}

/// Returned after the run so callers can report counts and choose an exit status.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub records: Vec<MetricRecord>,
    pub jobs: Vec<JobRecord>,
    pub errors: ErrorSummary,
    pub manifest_path: PathBuf,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Interpreted baseline shared by every triple of a site.
struct BaselineState {
    result: NormalizedResult,
    profiles: ProfileSet,
}

type BaselineCell = Arc<OnceLock<Result<Arc<BaselineState>, NovaError>>>;

enum JobResult {
    Done(Box<MetricRecord>, Option<DispatchFrame>),
    Failed(NovaError),
    Skipped,
}

struct JobOutcome {
    index: usize,
    key: ScenarioKey,
    result: JobResult,
}

pub struct BatchRunner {
    service: Arc<dyn OptimizationService>,
    config: RunConfig,
    abort: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(service: Arc<dyn OptimizationService>, config: RunConfig) -> Self {
        BatchRunner {
            service,
            config,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag stops dispatch; undispatched triples are recorded as skipped.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Optimize, interpret and compare every triple, then write the outputs.
    ///
    /// `pairing.failures` are carried into the error summary unchanged.
    pub fn run(&self, pairing: PairingOutcome) -> Result<RunSummary> {
        let config = &self.config;
        let run_id = Uuid::new_v4().to_string();
        let thread_count = if config.threads == 0 {
            num_cpus::get()
        } else {
            config.threads
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()
            .context("building Rayon thread pool for batch runs")?;

        let mut errors = ErrorSummary::default();
        for (key, err) in &pairing.failures {
            errors.push(key, err);
        }
        let baselines: HashMap<String, BaselineCell> = pairing
            .triples
            .iter()
            .map(|triple| (triple.site.id.clone(), BaselineCell::default()))
            .collect();
        info!(
            run_id = %run_id,
            triples = pairing.triples.len(),
            threads = thread_count,
            service = self.service.name(),
            "starting batch run"
        );

        let (tx, rx) = mpsc::channel::<JobOutcome>();
        let assembler = OutputAssembler::new(&config.output_root, config.timeseries);
        let aggregator = thread::spawn(move || aggregate(rx, assembler));

        pool.install(|| {
            pairing.triples.par_iter().for_each_with(tx, |tx, triple| {
                let outcome = self.run_job(triple, &baselines);
                if matches!(outcome.result, JobResult::Failed(_)) && config.fail_fast {
                    self.abort.store(true, Ordering::SeqCst);
                }
                // aggregator only stops once every sender is dropped
                let _ = tx.send(outcome);
            });
        });

        let (mut assembler, mut jobs, job_errors) = aggregator
            .join()
            .map_err(|_| anyhow::anyhow!("result aggregator panicked"))?;
        if assembler.wants_timeseries() {
            for frame in baseline_frames(&pairing.triples, &baselines, config.resolution) {
                assembler.accept_frame(frame);
            }
        }
        for (key, err) in &job_errors {
            errors.push(key, err);
        }
        jobs.sort_by_key(|job| job.index);

        let assembled = assembler
            .finish(&mut errors)
            .context("writing run outputs")?;
        errors.sort();

        let success = jobs.iter().filter(|job| job.status == JobStatus::Ok).count();
        let skipped = jobs.iter().filter(|job| job.status == JobStatus::Skipped).count();
        let failure = jobs.len() - success - skipped;
        let manifest_path = config.output_root.join(RUN_MANIFEST);
        let manifest = RunManifest {
            run_id: run_id.clone(),
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: self.service.name().to_string(),
            num_jobs: jobs.len(),
            success,
            failure,
            skipped,
            jobs: jobs.clone(),
            errors: errors.clone(),
            outputs: assembled
                .files
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
        };
        if let Err(err) = write_run_manifest(&manifest_path, &manifest) {
            error!(path = %manifest_path.display(), "{err:#}");
            let write_error = nova_core::OutputWriteError {
                path: manifest_path.display().to_string(),
                message: format!("{err:#}"),
            };
            errors.push(&run_wide(), &write_error.into());
        }
        info!(run_id = %run_id, success, failure, skipped, "batch run finished");
        Ok(RunSummary {
            run_id,
            success,
            failure,
            skipped,
            records: assembled.records,
            jobs,
            errors,
            manifest_path,
        })
    }

    fn run_job(&self, triple: &Triple, baselines: &HashMap<String, BaselineCell>) -> JobOutcome {
        let key = triple.key();
        let result = if self.abort.load(Ordering::SeqCst) {
            debug!(scenario = %key, "run aborted, skipping");
            JobResult::Skipped
        } else {
            match self.compare(triple, &key, baselines) {
                Ok((record, frame)) => JobResult::Done(Box::new(record), frame),
                Err(err) => {
                    warn!(scenario = %key, error = %err, "scenario failed");
                    JobResult::Failed(err)
                }
            }
        };
        JobOutcome {
            index: triple.index,
            key,
            result,
        }
    }

    fn compare(
        &self,
        triple: &Triple,
        key: &ScenarioKey,
        baselines: &HashMap<String, BaselineCell>,
    ) -> Result<(MetricRecord, Option<DispatchFrame>), NovaError> {
        let config = &self.config;
        let baseline = match baselines.get(&triple.site.id) {
            Some(cell) => cell
                .get_or_init(|| self.interpret_baseline(triple).map(Arc::new))
                .clone()?,
            None => Arc::new(self.interpret_baseline(triple)?),
        };

        debug!(scenario = %key, "optimizing scenario");
        let raw = invoke_with_timeout(
            Arc::clone(&self.service),
            key,
            triple.scenario.body.clone(),
            config.timeout,
        )?;
        let result = interpret(&raw)?;
        let profiles = request_profiles(&triple.scenario, &config.targets, config.resolution)?;
        let prices = wholesale_prices(&triple.scenario, config.resolution)?;

        let comparison = Comparison {
            index: triple.index,
            site: &triple.site,
            baseline: Side {
                request: &triple.baseline,
                result: &baseline.result,
                profiles: &baseline.profiles,
            },
            scenario: Side {
                request: &triple.scenario,
                result: &result,
                profiles: &profiles,
            },
            wholesale_price: prices.as_ref(),
            resolution: config.resolution,
        };
        let record = compute(&comparison, &config.metrics)?;
        let frame = config.timeseries.map(|_| DispatchFrame {
            index: triple.index,
            site: triple.site.id.clone(),
            scenario: triple.scenario.scenario_id.clone(),
            resolution: config.resolution,
            columns: dispatch_columns(&result),
        });
        Ok((record, frame))
    }

    fn interpret_baseline(&self, triple: &Triple) -> Result<BaselineState, NovaError> {
        let request: &ResolvedRequest = &triple.baseline;
        let key = ScenarioKey::new(&triple.site.id, &request.scenario_id);
        info!(baseline = %key, "optimizing baseline");
        let raw = invoke_with_timeout(
            Arc::clone(&self.service),
            &key,
            request.body.clone(),
            self.config.timeout,
        )?;
        Ok(BaselineState {
            result: interpret(&raw)?,
            profiles: request_profiles(request, &self.config.targets, self.config.resolution)?,
        })
    }
}

/// One frame per site whose baseline was interpreted, indexed at the site's first triple.
fn baseline_frames(
    triples: &[Triple],
    baselines: &HashMap<String, BaselineCell>,
    resolution: Resolution,
) -> Vec<DispatchFrame> {
    let mut first: BTreeMap<&str, &Triple> = BTreeMap::new();
    for triple in triples {
        first
            .entry(triple.site.id.as_str())
            .and_modify(|seen| {
                if triple.index < seen.index {
                    *seen = triple;
                }
            })
            .or_insert(triple);
    }
    first
        .into_values()
        .filter_map(|triple| {
            let state = baselines.get(&triple.site.id)?.get()?.as_ref().ok()?;
            Some(DispatchFrame {
                index: triple.index,
                site: triple.site.id.clone(),
                scenario: triple.baseline.scenario_id.clone(),
                resolution,
                columns: dispatch_columns(&state.result),
            })
        })
        .collect()
}

type Aggregated = (OutputAssembler, Vec<JobRecord>, Vec<(ScenarioKey, NovaError)>);

fn aggregate(rx: mpsc::Receiver<JobOutcome>, mut assembler: OutputAssembler) -> Aggregated {
    let mut jobs = Vec::new();
    let mut failures = Vec::new();
    for outcome in rx {
        let (status, error) = match outcome.result {
            JobResult::Done(record, frame) => {
                assembler.accept(*record, frame);
                (JobStatus::Ok, None)
            }
            JobResult::Failed(err) => {
                let message = err.to_string();
                failures.push((outcome.key.clone(), err));
                (JobStatus::Error, Some(message))
            }
            JobResult::Skipped => (JobStatus::Skipped, None),
        };
        jobs.push(JobRecord {
            index: outcome.index,
            site: outcome.key.site,
            scenario: outcome.key.scenario,
            status,
            error,
        });
    }
    (assembler, jobs, failures)
}
