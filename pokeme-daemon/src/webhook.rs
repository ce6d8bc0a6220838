//! HTTP adapter: signed GitHub push deliveries in, register writes out.
//!
//! | Route          | Behaviour                                               |
//! |----------------|---------------------------------------------------------|
//! | `POST /update` | verify signature, extract `head_commit.id`, CAS it      |
//! | `GET /status`  | register and last-deploy snapshot as JSON               |
//!
//! `/update` answers as soon as the register write is acknowledged; the
//! resulting deploy is only visible through logs and `/status`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use pokeme_coord::{CoordinationError, RetryPolicy, WatchedRegister};
use pokeme_core::CommitId;

use crate::signature::{self, SIGNATURE_HEADER};
use crate::status::DeployStatus;

const EVENT_HEADER: &str = "x-github-event";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Push without a head commit (e.g. a branch deletion).
    #[error("payload has no head commit id")]
    MissingCommit,

    #[error("head commit id is invalid: {0}")]
    InvalidCommit(String),

    #[error("register update failed: {0}")]
    Register(#[from] CoordinationError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignatureFormat(_) | Self::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::MissingCommit
            | Self::InvalidCommit(_)
            | Self::Register(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::MissingSignature => "Missing signature",
            Self::InvalidSignatureFormat(_) => "Invalid signature format",
            Self::InvalidSignature => "Invalid signature",
            Self::InvalidPayload(_) => "Invalid payload",
            Self::MissingCommit | Self::InvalidCommit(_) => "Failed to get commit sha",
            Self::Register(_) => "Failed to update commit id",
            Self::Internal(_) => "Internal server error",
        };
        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub head_commit: Option<HeadCommit>,
}

#[derive(Debug, Deserialize)]
pub struct HeadCommit {
    pub id: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct WebhookState {
    pub register: Arc<WatchedRegister>,
    pub secret: Vec<u8>,
    /// Only pushes to this branch update the register.
    pub branch: Option<String>,
    pub retry: RetryPolicy,
    pub status: DeployStatus,
    pub started_at_unix: u64,
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/update", post(update))
        .route("/status", get(status))
        .with_state(state)
}

async fn update(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(err) = signature::verify(&state.secret, &body, header) {
        tracing::warn!(error = %err, "rejected webhook delivery");
        return Err(err);
    }

    match headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()) {
        Some("ping") => return Ok((StatusCode::OK, "pong")),
        Some(event) if event != "push" => {
            tracing::debug!(event, "ignoring non-push event");
            return Ok((StatusCode::ACCEPTED, "ignored"));
        }
        _ => {}
    }

    let push: PushEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse push payload");
        WebhookError::InvalidPayload(e.to_string())
    })?;

    if let Some(branch) = &state.branch {
        let wanted = format!("refs/heads/{branch}");
        if push.git_ref.as_deref() != Some(wanted.as_str()) {
            tracing::debug!(git_ref = ?push.git_ref, branch = %branch, "push to another ref, ignored");
            return Ok((StatusCode::ACCEPTED, "ignored"));
        }
    }

    let raw = push
        .head_commit
        .and_then(|c| c.id)
        .ok_or_else(|| {
            tracing::error!("failed to get commit sha");
            WebhookError::MissingCommit
        })?;
    let commit = CommitId::parse(&raw).map_err(|e| {
        tracing::error!(value = %raw, error = %e, "head commit id is invalid");
        WebhookError::InvalidCommit(e.to_string())
    })?;

    let version = state
        .register
        .update_with_retry(commit.as_str().as_bytes(), &state.retry)
        .await
        .map_err(|e| {
            tracing::warn!(commit = %commit, error = %e, "failed to set commit id");
            WebhookError::Register(e)
        })?;

    tracing::info!(commit = %commit, version, "commit id published");
    Ok((StatusCode::OK, "ok"))
}

async fn status(State(state): State<Arc<WebhookState>>) -> Json<Value> {
    let register = &state.register;
    let version = register.version().await;
    let last_deploy = state.status.last().await;
    let (attempts, failures) = state.status.counts().await;
    Json(json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "register": {
            "path": register.path(),
            "version": version,
            "state": register.state().as_str(),
            "error": register.last_error().map(|e| e.to_string()),
        },
        "deploys": {
            "attempts": attempts,
            "failures": failures,
            "last": last_deploy,
        },
    }))
}
