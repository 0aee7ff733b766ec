use nova_batch::{load_run_manifest, BatchRunner, JobStatus, RunConfig, TimeseriesOutput};
use nova_core::{ErrorKind, Node, NovaError, PairingError, ScenarioKey, ServiceError, Site};
use nova_results::{OptimizationService, ResultSet};
use nova_scenarios::{Directives, PairingOutcome, ResolvedRequest, Triple};
use serde_json::json;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Answers from the request body: `lcc`, `sleep_ms` and `status` drive the result.
#[derive(Default)]
struct ScriptedService {
    calls: AtomicUsize,
}

impl OptimizationService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    fn optimize(&self, _: &ScenarioKey, request: &Node, _: Instant) -> Result<ResultSet, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = request.get("sleep_ms").and_then(Node::as_i64) {
            thread::sleep(Duration::from_millis(ms as u64));
        }
        let status = request.get("status").and_then(Node::as_str).unwrap_or("optimal");
        let lcc = request.get("lcc").and_then(Node::as_f64).unwrap_or(1000.0);
        Ok(ResultSet::new(Node::from(json!({
            "outputs": {"Scenario": {"status": status, "Site": {
                "Financial": {"lcc_us_dollars": lcc},
                "ElectricTariff": {"year_one_to_load_series_kw": vec![1.0; 24]}
            }}}
        }))))
    }
}

fn request(id: &str, body: serde_json::Value) -> ResolvedRequest {
    ResolvedRequest {
        scenario_id: id.into(),
        body: Node::from(body),
        directives: Directives::default(),
    }
}

fn triples(spec: &[(&str, &str, serde_json::Value, serde_json::Value)]) -> Vec<Triple> {
    let mut sites: Vec<(Arc<Site>, Arc<ResolvedRequest>)> = Vec::new();
    spec.iter()
        .enumerate()
        .map(|(index, (site, scenario, baseline_body, scenario_body))| {
            let shared = match sites.iter().find(|(s, _)| s.id == *site) {
                Some(entry) => entry.clone(),
                None => {
                    let entry = (
                        Arc::new(Site::new(*site)),
                        Arc::new(request("baseline", baseline_body.clone())),
                    );
                    sites.push(entry.clone());
                    entry
                }
            };
            Triple {
                index,
                site: shared.0,
                baseline: shared.1,
                scenario: request(scenario, scenario_body.clone()),
            }
        })
        .collect()
}

fn config(root: &std::path::Path) -> RunConfig {
    let mut config = RunConfig::new(root);
    config.threads = 2;
    config.timeout = Duration::from_millis(300);
    config
}

#[test]
fn timed_out_scenario_fails_alone() {
    let dir = tempdir().unwrap();
    let triples = triples(&[
        ("denver", "pv_50", json!({"lcc": 5000}), json!({"lcc": 4000})),
        ("denver", "pv_slow", json!({"lcc": 5000}), json!({"sleep_ms": 3000})),
        ("golden", "pv_175", json!({"lcc": 8000}), json!({"lcc": 6500})),
    ]);
    let service = Arc::new(ScriptedService::default());
    let runner = BatchRunner::new(service.clone(), config(dir.path()));
    let summary = runner
        .run(PairingOutcome {
            triples,
            failures: Vec::new(),
        })
        .unwrap();

    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.records[0].scenario_id, "pv_50");
    assert_eq!(summary.records[0].npv, 1000.0);
    assert_eq!(summary.records[1].scenario_id, "pv_175");
    assert_eq!(summary.errors.len(), 1);
    let entry = &summary.errors.entries[0];
    assert_eq!((entry.site.as_str(), entry.scenario.as_str()), ("denver", "pv_slow"));
    assert_eq!(entry.kind, ErrorKind::ExternalService);
    assert!(summary.has_failures());
    assert_eq!((summary.success, summary.failure, summary.skipped), (2, 1, 0));
    // one baseline call per site
    assert_eq!(service.calls.load(Ordering::SeqCst), 5);

    let csv = fs::read_to_string(dir.path().join("metrics_summary.csv")).unwrap();
    assert_eq!(csv.lines().count(), 3);
    let manifest = load_run_manifest(&summary.manifest_path).unwrap();
    assert_eq!(manifest.failure, 1);
    assert_eq!(manifest.jobs[1].status, JobStatus::Error);
    assert_eq!(manifest.service, "scripted");
}

#[test]
fn failed_baseline_fails_every_scenario_of_its_site() {
    let dir = tempdir().unwrap();
    let triples = triples(&[
        ("boulder", "pv_10", json!({"status": "infeasible"}), json!({})),
        ("boulder", "pv_20", json!({"status": "infeasible"}), json!({})),
        ("erie", "pv_30", json!({}), json!({"lcc": 900})),
    ]);
    let mut config = config(dir.path());
    config.timeseries = Some(TimeseriesOutput::default());
    let runner = BatchRunner::new(Arc::new(ScriptedService::default()), config);
    let summary = runner
        .run(PairingOutcome {
            triples,
            failures: Vec::new(),
        })
        .unwrap();

    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.errors.len(), 2);
    assert!(summary
        .errors
        .entries
        .iter()
        .all(|entry| entry.site == "boulder" && entry.message.contains("infeasible")));
    let timeseries = dir.path().join("timeseries");
    assert!(timeseries.join("erie/pv_30_timeseries.csv").exists());
    let baseline = fs::read_to_string(timeseries.join("erie/baseline_timeseries.csv")).unwrap();
    assert!(baseline.starts_with("home_load,"));
    assert_eq!(baseline.lines().count(), 25);
    assert!(!timeseries.join("boulder").exists());
}

#[test]
fn aborted_run_skips_everything() {
    let dir = tempdir().unwrap();
    let triples = triples(&[("denver", "pv_50", json!({}), json!({}))]);
    let service = Arc::new(ScriptedService::default());
    let runner = BatchRunner::new(service.clone(), config(dir.path()));
    runner.abort_flag().store(true, Ordering::SeqCst);
    let summary = runner
        .run(PairingOutcome {
            triples,
            failures: Vec::new(),
        })
        .unwrap();
    assert_eq!(summary.skipped, 1);
    assert!(summary.records.is_empty());
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    assert!(dir.path().join("metrics_summary.csv").exists());
}

#[test]
fn pairing_failures_reach_the_summary() {
    let dir = tempdir().unwrap();
    let failure = NovaError::from(PairingError::EmptySite {
        site: "erie".into(),
    });
    let runner = BatchRunner::new(Arc::new(ScriptedService::default()), config(dir.path()));
    let summary = runner
        .run(PairingOutcome {
            triples: Vec::new(),
            failures: vec![(ScenarioKey::site_wide("erie"), failure)],
        })
        .unwrap();
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors.entries[0].scenario, "*");
    assert_eq!(summary.errors.entries[0].kind, ErrorKind::Pairing);
}
