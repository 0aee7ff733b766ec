//! Adapters for the external optimization service.

use nova_core::{sanitize_name, Node, ScenarioKey, ServiceError};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::interpret::ResultSet;

/// Submits one resolved request and returns its raw result.
///
/// Implementations must give up once `deadline` has passed; the caller
/// enforces the timeout independently through [`invoke_with_timeout`].
pub trait OptimizationService: Send + Sync {
    fn name(&self) -> &str;

    fn optimize(
        &self,
        key: &ScenarioKey,
        request: &Node,
        deadline: Instant,
    ) -> Result<ResultSet, ServiceError>;
}

/// Serves previously stored results from `<root>/<site>/<scenario>.json`.
#[derive(Debug, Clone)]
pub struct ReplayService {
    root: PathBuf,
}

impl ReplayService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ReplayService { root: root.into() }
    }

    pub fn result_path(&self, key: &ScenarioKey) -> PathBuf {
        result_path(&self.root, key)
    }
}

impl OptimizationService for ReplayService {
    fn name(&self) -> &str {
        "replay"
    }

    fn optimize(
        &self,
        key: &ScenarioKey,
        _request: &Node,
        _deadline: Instant,
    ) -> Result<ResultSet, ServiceError> {
        let path = self.result_path(key);
        debug!(scenario = %key, path = %path.display(), "replaying stored result");
        ResultSet::load(&path)
    }
}

/// Same `<site>/<scenario>.json` layout `write_requests` uses for requests.
pub(crate) fn result_path(root: &Path, key: &ScenarioKey) -> PathBuf {
    root.join(sanitize_name(&key.site))
        .join(format!("{}.json", sanitize_name(&key.scenario)))
}

/// Run `service` on a worker thread and wait at most `timeout` for it.
///
/// On timeout the call is abandoned; the worker keeps its own deadline and
/// exits on its own.
pub fn invoke_with_timeout(
    service: Arc<dyn OptimizationService>,
    key: &ScenarioKey,
    request: Node,
    timeout: Duration,
) -> Result<ResultSet, ServiceError> {
    let (tx, rx) = mpsc::channel();
    let deadline = Instant::now() + timeout;
    let worker_key = key.clone();
    thread::Builder::new()
        .name(format!("optimize-{key}"))
        .spawn(move || {
            let result = service.optimize(&worker_key, &request, deadline);
            // receiver is gone if the caller already timed out
            let _ = tx.send(result);
        })
        .map_err(|err| ServiceError::Transport(format!("spawning service call: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(scenario = %key, seconds = timeout.as_secs_f64(), "service call timed out");
            Err(ServiceError::Timeout {
                seconds: timeout.as_secs_f64(),
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ServiceError::Transport(
            "service call ended without a result".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    struct Sleepy(Duration);

    impl OptimizationService for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn optimize(&self, _: &ScenarioKey, request: &Node, _: Instant) -> Result<ResultSet, ServiceError> {
            thread::sleep(self.0);
            Ok(ResultSet::new(request.clone()))
        }
    }

    #[test]
    fn replay_reads_site_scenario_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("denver")).unwrap();
        fs::write(
            dir.path().join("denver/pv_175.json"),
            json!({"status": "optimal"}).to_string(),
        )
        .unwrap();
        let service = ReplayService::new(dir.path());
        let key = ScenarioKey::new("denver", "pv_175");
        let result = service.optimize(&key, &Node::null(), Instant::now()).unwrap();
        assert_eq!(result.body.get("status").and_then(Node::as_str), Some("optimal"));

        let missing = ScenarioKey::new("denver", "pv_300");
        assert!(matches!(
            service.optimize(&missing, &Node::null(), Instant::now()),
            Err(ServiceError::ResultMissing { .. })
        ));
    }

    #[test]
    fn replay_paths_are_sanitized_like_requests() {
        let service = ReplayService::new("/stored");
        assert_eq!(
            service.result_path(&ScenarioKey::new("..", "pv/175")),
            Path::new("/stored/__/pv_175.json")
        );
    }

    #[test]
    fn fast_call_returns_result() {
        let service: Arc<dyn OptimizationService> = Arc::new(Sleepy(Duration::from_millis(1)));
        let key = ScenarioKey::new("a", "b");
        let result =
            invoke_with_timeout(service, &key, Node::from("x"), Duration::from_secs(5)).unwrap();
        assert_eq!(result.body, Node::from("x"));
    }

    #[test]
    fn slow_call_times_out() {
        let service: Arc<dyn OptimizationService> = Arc::new(Sleepy(Duration::from_secs(2)));
        let key = ScenarioKey::new("a", "b");
        let started = Instant::now();
        let err = invoke_with_timeout(service, &key, Node::null(), Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
