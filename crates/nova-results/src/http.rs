use nova_core::{Node, ScenarioKey, ServiceError};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::interpret::ResultSet;
use crate::service::{result_path, OptimizationService};

/// Status the service reports while a job is still running.
const OPTIMIZING: &str = "Optimizing...";

/// Poll responses without a status tolerated before giving up.
const MALFORMED_LIMIT: usize = 4;

/// Header carrying the API key; keeps it out of URLs and error text.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for a REopt-style job API: POST the request, then poll the job's
/// results until the status leaves `Optimizing...`.
#[derive(Clone)]
pub struct HttpService {
    root_url: String,
    api_key: String,
    poll_interval: Duration,
    persist_dir: Option<PathBuf>,
    agent: ureq::Agent,
}

impl HttpService {
    pub fn new(root_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        HttpService {
            root_url: root_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(5),
            persist_dir: None,
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(30))
                .timeout_read(Duration::from_secs(120))
                .build(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Save every finished result under `dir` in the layout [`crate::ReplayService`] reads.
    pub fn persist_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    fn submit(&self, request: &Node) -> Result<String, ServiceError> {
        let url = format!("{}/v1/job/", self.root_url);
        let response = self
            .agent
            .post(&url)
            .set(API_KEY_HEADER, &self.api_key)
            .send_json(Value::from(request.clone()))
            .map_err(|err| self.transport(err))?;
        let body: Value = response
            .into_json()
            .map_err(|err| self.failure(format!("parsing submit response: {err}")))?;
        body["run_uuid"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::ResultSchema {
                field: "run_uuid".into(),
            })
    }

    fn fetch(&self, run_uuid: &str) -> Result<Value, ServiceError> {
        let url = format!("{}/v1/job/{}/results/", self.root_url, run_uuid);
        self.agent
            .get(&url)
            .set(API_KEY_HEADER, &self.api_key)
            .call()
            .map_err(|err| self.transport(err))?
            .into_json()
            .map_err(|err| self.failure(format!("parsing results response: {err}")))
    }

    fn transport(&self, err: ureq::Error) -> ServiceError {
        match err {
            ureq::Error::Status(code, response) => {
                self.failure(format!("{} returned status {code}", response.get_url()))
            }
            ureq::Error::Transport(err) => self.failure(err.to_string()),
        }
    }

    /// Transport error with every occurrence of the API key masked.
    fn failure(&self, message: String) -> ServiceError {
        if self.api_key.is_empty() {
            return ServiceError::Transport(message);
        }
        ServiceError::Transport(message.replace(&self.api_key, "***"))
    }

    fn persist(&self, key: &ScenarioKey, body: &Value) {
        let Some(dir) = &self.persist_dir else { return };
        let path = result_path(dir, key);
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&path, body.to_string()));
        if let Err(err) = written {
            warn!(scenario = %key, path = %path.display(), error = %err, "failed to persist result");
        }
    }
}

impl fmt::Debug for HttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpService")
            .field("root_url", &self.root_url)
            .field("api_key", &"***")
            .field("poll_interval", &self.poll_interval)
            .field("persist_dir", &self.persist_dir)
            .finish_non_exhaustive()
    }
}

impl OptimizationService for HttpService {
    fn name(&self) -> &str {
        "http"
    }

    fn optimize(
        &self,
        key: &ScenarioKey,
        request: &Node,
        deadline: Instant,
    ) -> Result<ResultSet, ServiceError> {
        let started = Instant::now();
        let run_uuid = self.submit(request)?;
        info!(scenario = %key, run_uuid = %run_uuid, "submitted optimization");

        let mut malformed = 0;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ServiceError::Timeout {
                    seconds: started.elapsed().as_secs_f64(),
                });
            }
            let body = self.fetch(&run_uuid)?;
            match body.pointer("/outputs/Scenario/status").and_then(Value::as_str) {
                Some(OPTIMIZING) => debug!(scenario = %key, "still optimizing"),
                Some(status) => {
                    info!(scenario = %key, status, "optimization finished");
                    self.persist(key, &body);
                    return Ok(ResultSet::new(Node::from(body)));
                }
                None => {
                    malformed += 1;
                    warn!(scenario = %key, attempt = malformed, "results response has no status");
                    if malformed > MALFORMED_LIMIT {
                        return Err(ServiceError::ResultSchema {
                            field: "outputs.Scenario.status".into(),
                        });
                    }
                }
            }
            thread::sleep(self.poll_interval.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_url_trailing_slash_is_trimmed() {
        let service = HttpService::new("https://example.test/api/", "key");
        assert_eq!(service.root_url, "https://example.test/api");
        assert_eq!(service.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let service = HttpService::new("http://127.0.0.1:9", "key");
        let err = service
            .optimize(
                &ScenarioKey::new("a", "b"),
                &Node::empty_map(),
                Instant::now() + Duration::from_secs(5),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }

    #[test]
    fn api_key_never_reaches_error_text() {
        let key = "k3y-7f2c9d1e";
        let service = HttpService::new("http://127.0.0.1:9", key);
        let err = service
            .optimize(
                &ScenarioKey::new("a", "b"),
                &Node::empty_map(),
                Instant::now() + Duration::from_secs(5),
            )
            .unwrap_err();
        assert!(!err.to_string().contains(key), "{err}");
        assert!(!format!("{service:?}").contains(key));

        let echoed = service.failure(format!("http://127.0.0.1:9/v1/job/?api_key={key} returned status 403"));
        assert_eq!(
            echoed.to_string(),
            ServiceError::Transport("http://127.0.0.1:9/v1/job/?api_key=*** returned status 403".into())
                .to_string()
        );
    }
}
