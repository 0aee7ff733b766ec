use nova_core::{ErrorKind, NovaError, ScenarioKey, SITE_WIDE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Ok,
    Error,
    /// Never dispatched because the run was aborted
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ok => "ok",
            JobStatus::Error => "error",
            JobStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of one triple as listed in the run manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub index: usize,
    pub site: String,
    pub scenario: String,
    pub status: JobStatus,
    pub error: Option<String>,
}

/// One failure, attributed to a scenario, a whole site (`scenario == "*"`)
/// or the run (`site == scenario == "*"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub site: String,
    pub scenario: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub entries: Vec<ErrorEntry>,
}

impl ErrorSummary {
    pub fn push(&mut self, key: &ScenarioKey, error: &NovaError) {
        self.entries.push(ErrorEntry {
            site: key.site.clone(),
            scenario: key.scenario.clone(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order entries by site then scenario, keeping arrival order within a key.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| (&a.site, &a.scenario).cmp(&(&b.site, &b.scenario)));
    }
}

/// Key for failures that concern the whole run.
pub fn run_wide() -> ScenarioKey {
    ScenarioKey::new(SITE_WIDE, SITE_WIDE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_core::ServiceError;

    #[test]
    fn summary_records_kind_and_message() {
        let mut summary = ErrorSummary::default();
        let err = NovaError::from(ServiceError::Timeout { seconds: 2.0 });
        summary.push(&ScenarioKey::new("golden", "pv_50"), &err);
        summary.push(&ScenarioKey::new("aurora", "pv_10"), &err);
        summary.sort();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.entries[0].site, "aurora");
        assert_eq!(summary.entries[1].kind, ErrorKind::ExternalService);
        assert_eq!(summary.entries[1].message, err.to_string());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Skipped).unwrap(), "\"skipped\"");
        assert_eq!(JobStatus::Ok.as_str(), "ok");
    }
}
