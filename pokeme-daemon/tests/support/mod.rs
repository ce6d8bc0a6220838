#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pokeme_cloner::{CloneError, CloneReport, Deploy};
use pokeme_coord::{CoordinationClient, MemoryEnsemble, WatchedRegister};
use pokeme_core::{CommitId, Secrets};

pub const PATH: &str = "/poke-me/commit-id";
pub const SECRET: &[u8] = b"webhook-secret";

/// Records every deploy request and fails the commits it is told to.
pub struct FakeDeployer {
    seen: mpsc::UnboundedSender<(CommitId, bool)>,
    failing: Mutex<Vec<CommitId>>,
}

impl FakeDeployer {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(CommitId, bool)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let deployer = Arc::new(Self {
            seen: tx,
            failing: Mutex::new(Vec::new()),
        });
        (deployer, rx)
    }

    pub fn fail_on(&self, commit: &str) {
        self.failing
            .lock()
            .unwrap()
            .push(CommitId::parse(commit).unwrap());
    }
}

impl Deploy for FakeDeployer {
    fn deploy(
        &self,
        commit: &CommitId,
        _secrets: &Secrets,
        backup: bool,
    ) -> Result<CloneReport, CloneError> {
        let _ = self.seen.send((commit.clone(), backup));
        if self.failing.lock().unwrap().contains(commit) {
            return Err(CloneError::Git {
                op: "checkout",
                stderr: format!("fatal: reference is not a tree: {commit}"),
            });
        }
        Ok(CloneReport {
            commit: commit.clone(),
            destination: PathBuf::from("/srv/deploy"),
            backup: None,
            rendered: vec![PathBuf::from("/srv/deploy/conf/app.env")],
            skipped: vec![],
        })
    }
}

pub struct Harness {
    pub ensemble: Arc<MemoryEnsemble>,
    pub client: CoordinationClient,
    pub register: Arc<WatchedRegister>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub async fn new() -> Self {
        let ensemble = Arc::new(MemoryEnsemble::new());
        let client = CoordinationClient::with_ensemble(ensemble.clone(), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let register = Arc::new(client.register(PATH, cancel.clone()).await.unwrap());
        Self {
            ensemble,
            client,
            register,
            cancel,
        }
    }
}

pub async fn next_deploy(rx: &mut mpsc::UnboundedReceiver<(CommitId, bool)>) -> (CommitId, bool) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("deploy within bounded time")
        .expect("deployer alive")
}
