//! Dispatch loop: register notifications in, deploys out.
//!
//! Deploys run one at a time on the blocking pool. The next notification is
//! not received until the current deploy has finished, so the register's
//! backpressure reaches the watch task and intermediate values collapse into
//! the latest one instead of queueing.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pokeme_cloner::Deploy;
use pokeme_coord::ValueStream;
use pokeme_core::{CommitId, Secrets};

use crate::status::DeployStatus;

/// Runs until the stream closes or `cancel` fires. A failed deploy is logged
/// and recorded; it never stops the loop.
pub async fn dispatch_loop(
    mut stream: ValueStream,
    deployer: Arc<dyn Deploy>,
    secrets: Secrets,
    backup: bool,
    status: DeployStatus,
    cancel: CancellationToken,
) {
    loop {
        let value = tokio::select! {
            _ = cancel.cancelled() => break,
            value = stream.recv() => value,
        };
        let Some(value) = value else {
            tracing::info!("register stream closed, dispatch loop exiting");
            break;
        };
        if value.is_empty() {
            tracing::debug!("empty register value, nothing to deploy");
            continue;
        }
        let commit = match CommitId::from_bytes(&value) {
            Ok(commit) => commit,
            Err(err) => {
                tracing::warn!(
                    value = %String::from_utf8_lossy(&value),
                    error = %err,
                    "register value is not a commit id, ignoring"
                );
                continue;
            }
        };

        let job = {
            let deployer = deployer.clone();
            let secrets = secrets.clone();
            let commit = commit.clone();
            tokio::task::spawn_blocking(move || deployer.deploy(&commit, &secrets, backup))
        };
        match job.await {
            Ok(Ok(report)) => {
                tracing::info!(
                    commit = %report.commit,
                    rendered = report.rendered.len(),
                    backup = ?report.backup,
                    "deploy succeeded"
                );
                status.record_success(&report).await;
            }
            Ok(Err(err)) => {
                tracing::error!(commit = %commit, error = %err, "deploy failed");
                status.record_failure(&commit, err.to_string()).await;
            }
            Err(err) => {
                tracing::error!(commit = %commit, error = %err, "deploy task join failure");
                status.record_failure(&commit, err.to_string()).await;
            }
        }
    }
}
