//! Last-deploy bookkeeping shared by the dispatch loop and `GET /status`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::RwLock;

use pokeme_cloner::CloneReport;
use pokeme_core::CommitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployRecord {
    pub commit: String,
    pub outcome: DeployOutcome,
    pub error: Option<String>,
    pub rendered: usize,
    pub finished_at_unix: u64,
}

#[derive(Debug, Default)]
struct Inner {
    last: Option<DeployRecord>,
    attempts: u64,
    failures: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DeployStatus {
    inner: Arc<RwLock<Inner>>,
}

impl DeployStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self, report: &CloneReport) {
        let mut inner = self.inner.write().await;
        inner.attempts += 1;
        inner.last = Some(DeployRecord {
            commit: report.commit.to_string(),
            outcome: DeployOutcome::Succeeded,
            error: None,
            rendered: report.rendered.len(),
            finished_at_unix: unix_seconds_now(),
        });
    }

    pub async fn record_failure(&self, commit: &CommitId, error: impl ToString) {
        let mut inner = self.inner.write().await;
        inner.attempts += 1;
        inner.failures += 1;
        inner.last = Some(DeployRecord {
            commit: commit.to_string(),
            outcome: DeployOutcome::Failed,
            error: Some(error.to_string()),
            rendered: 0,
            finished_at_unix: unix_seconds_now(),
        });
    }

    pub async fn last(&self) -> Option<DeployRecord> {
        self.inner.read().await.last.clone()
    }

    /// `(attempts, failures)` since startup.
    pub async fn counts(&self) -> (u64, u64) {
        let inner = self.inner.read().await;
        (inner.attempts, inner.failures)
    }
}

pub(crate) fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
