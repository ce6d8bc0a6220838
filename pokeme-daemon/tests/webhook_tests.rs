mod support;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pokeme_coord::RetryPolicy;
use pokeme_daemon::signature::sign;
use pokeme_daemon::{router, DeployStatus, WebhookState};

use support::{Harness, PATH, SECRET};

const SHA: &str = "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c";

fn app(h: &Harness, branch: Option<&str>) -> Router {
    router(Arc::new(WebhookState {
        register: h.register.clone(),
        secret: SECRET.to_vec(),
        branch: branch.map(str::to_string),
        retry: RetryPolicy::with_attempts(2),
        status: DeployStatus::new(),
        started_at_unix: 1_700_000_000,
    }))
}

fn push_body(git_ref: &str, head: Option<&str>) -> Vec<u8> {
    let head_commit = head.map(|id| json!({ "id": id, "message": "deploy" }));
    serde_json::to_vec(&json!({
        "ref": git_ref,
        "after": head.unwrap_or("0000000000000000000000000000000000000000"),
        "head_commit": head_commit,
    }))
    .unwrap()
}

fn signed(event: &str, body: Vec<u8>) -> Request<Body> {
    Request::post("/update")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-hub-signature-256", sign(SECRET, &body).unwrap())
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn signed_push_publishes_head_commit() {
    let h = Harness::new().await;
    let (status, _) = send(app(&h, None), signed("push", push_body("refs/heads/main", Some(SHA)))).await;

    assert_eq!(status, StatusCode::OK);
    let (value, version) = h.ensemble.value(PATH).unwrap();
    assert_eq!(value, SHA.as_bytes());
    assert_eq!(version, 1);
}

#[tokio::test]
async fn unsigned_or_badly_signed_requests_are_unauthorized() {
    let h = Harness::new().await;
    let body = push_body("refs/heads/main", Some(SHA));

    let unsigned = Request::post("/update")
        .header("x-github-event", "push")
        .body(Body::from(body.clone()))
        .unwrap();
    assert_eq!(send(app(&h, None), unsigned).await.0, StatusCode::UNAUTHORIZED);

    let wrong_key = Request::post("/update")
        .header("x-github-event", "push")
        .header("x-hub-signature-256", sign(b"other", &body).unwrap())
        .body(Body::from(body))
        .unwrap();
    let (status, text) = send(app(&h, None), wrong_key).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(text, "Invalid signature");

    assert_eq!(h.ensemble.value(PATH).unwrap().1, 0, "register untouched");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let h = Harness::new().await;
    let (status, _) = send(app(&h, None), signed("push", b"{not json".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn push_without_head_commit_is_internal_error() {
    let h = Harness::new().await;
    let (status, text) = send(app(&h, None), signed("push", push_body("refs/heads/main", None))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "Failed to get commit sha");
}

#[tokio::test]
async fn ping_answers_pong_without_touching_register() {
    let h = Harness::new().await;
    let body = serde_json::to_vec(&json!({ "zen": "Keep it logically awesome." })).unwrap();
    let (status, text) = send(app(&h, None), signed("ping", body)).await;
    assert_eq!((status, text.as_str()), (StatusCode::OK, "pong"));
    assert_eq!(h.ensemble.value(PATH).unwrap().1, 0);
}

#[tokio::test]
async fn pushes_to_other_branches_are_ignored() {
    let h = Harness::new().await;
    let (status, _) = send(
        app(&h, Some("main")),
        signed("push", push_body("refs/heads/feature", Some(SHA))),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(h.ensemble.value(PATH).unwrap().1, 0);

    let (status, _) = send(
        app(&h, Some("main")),
        signed("push", push_body("refs/heads/main", Some(SHA))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_write_failure_is_internal_error() {
    let h = Harness::new().await;
    h.ensemble.delete(PATH).unwrap();

    let (status, text) = send(app(&h, None), signed("push", push_body("refs/heads/main", Some(SHA)))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "Failed to update commit id");
}

#[tokio::test]
async fn status_reports_register_snapshot() {
    let h = Harness::new().await;
    send(app(&h, None), signed("push", push_body("refs/heads/main", Some(SHA)))).await;

    let request = Request::get("/status").body(Body::empty()).unwrap();
    let (status, text) = send(app(&h, None), request).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["running"], true);
    assert_eq!(json["started_at_unix"], 1_700_000_000u64);
    assert_eq!(json["register"]["path"], PATH);
    assert_eq!(json["register"]["version"], 1);
    assert!(json["deploys"]["last"].is_null());
}
