mod support;

use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use pokeme_coord::RetryPolicy;
use pokeme_core::Secrets;
use pokeme_daemon::signature::sign;
use pokeme_daemon::{run_services, DaemonError, DeployStatus, Services};

use support::{next_deploy, FakeDeployer, Harness, PATH, SECRET};

async fn services(h: &Harness, deployer: std::sync::Arc<FakeDeployer>) -> (Services, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let services = Services {
        listener,
        register: h.register.clone(),
        deployer,
        secrets: Secrets::new(),
        backup: false,
        webhook_secret: SECRET.to_vec(),
        branch: None,
        retry: RetryPolicy::none(),
        status: DeployStatus::new(),
    };
    (services, addr)
}

async fn post_push(addr: std::net::SocketAddr, sha: &str) -> String {
    let body = serde_json::to_vec(&json!({
        "ref": "refs/heads/main",
        "head_commit": { "id": sha },
    }))
    .unwrap();
    let head = format!(
        "POST /update HTTP/1.1\r\n\
         Host: localhost\r\n\
         Content-Type: application/json\r\n\
         X-GitHub-Event: push\r\n\
         X-Hub-Signature-256: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        sign(SECRET, &body).unwrap(),
        body.len()
    );

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(&body).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn webhook_to_deploy_end_to_end() {
    let h = Harness::new().await;
    let (deployer, mut seen) = FakeDeployer::new();
    let (services, addr) = services(&h, deployer).await;
    let handle = tokio::spawn(run_services(services, h.cancel.clone()));

    let response = post_push(addr, "abc123def").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");

    let (commit, _) = next_deploy(&mut seen).await;
    assert_eq!(commit.as_str(), "abc123def");

    h.cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("shutdown within bounded time")
        .unwrap();
    result.expect("clean shutdown");
}

#[tokio::test]
async fn failed_register_stops_the_daemon_with_an_error() {
    let h = Harness::new().await;
    let (deployer, _seen) = FakeDeployer::new();
    let (services, _addr) = services(&h, deployer).await;

    h.register
        .wait_for_state(pokeme_coord::RegisterState::Watching)
        .await;
    let handle = tokio::spawn(run_services(services, h.cancel.clone()));
    h.ensemble.delete(PATH).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon stops")
        .unwrap();
    assert!(
        matches!(result, Err(DaemonError::RegisterFailed { ref path, .. }) if path == PATH),
        "got {result:?}"
    );
}

#[tokio::test]
async fn stream_can_only_be_served_once() {
    let h = Harness::new().await;
    let _taken = h.register.take_stream();
    let (deployer, _seen) = FakeDeployer::new();
    let (services, _addr) = services(&h, deployer).await;

    let err = run_services(services, h.cancel.clone()).await.unwrap_err();
    assert!(matches!(err, DaemonError::StreamTaken { .. }));
}
