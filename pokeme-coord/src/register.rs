//! Watched register: one node holding a value, observed forever.
//!
//! # Watch protocol
//!
//! ```text
//! Initializing ──▶ Notifying ──▶ Watching ──▶ Notifying ──▶ …
//!                                   │
//!                                   ├── read error ──▶ Failed
//!                                   └── cancelled ───▶ Closed
//! ```
//!
//! 1. Take the version lock, `get_and_watch` the node, store the version, release.
//! 2. Publish the value on the stream (capacity 1: blocks until the consumer
//!    has taken the previous value).
//! 3. Enter `Watching` and wait for the one-shot watch to fire, then loop to
//!    re-arm it.
//!
//! A version already published is not published again, so watches that fire
//! for session events do not produce duplicates.
//!
//! `update` reads the cached version under the same lock, releases it for the
//! network write, and folds the acknowledged version back in afterwards.
//!
//! Once the stream has been handed out, `update` also waits until the watch
//! task has published the written version (or stopped). Writes made through
//! one register therefore reach its consumer one by one, in order. Writes from
//! other processes can still land between two reads and collapse into the
//! later value, because a watch only says that the node changed.

use std::sync::{Arc, Mutex as StdMutex, Weak};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{validate_path, CoordinationClient, PathClaim};
use crate::ensemble::{Ensemble, Version};
use crate::error::{CoordinationError, EnsembleError};
use crate::retry::RetryPolicy;

/// Lifecycle of a register's watch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterState {
    Initializing,
    Watching,
    Notifying,
    Closed,
    Failed,
}

impl RegisterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterState::Initializing => "initializing",
            RegisterState::Watching => "watching",
            RegisterState::Notifying => "notifying",
            RegisterState::Closed => "closed",
            RegisterState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RegisterState::Closed | RegisterState::Failed)
    }
}

/// Receiving end of a register's notifications. Ends when the watch task stops.
#[derive(Debug)]
pub struct ValueStream {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ValueStream {
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

type ErrorSlot = Arc<StdMutex<Option<Arc<CoordinationError>>>>;

pub struct WatchedRegister {
    path: String,
    ensemble: Weak<dyn Ensemble>,
    version: Arc<Mutex<Version>>,
    stream: StdMutex<Option<ValueStream>>,
    error: ErrorSlot,
    state: watch::Receiver<RegisterState>,
    published: watch::Receiver<Option<Version>>,
    cancel: CancellationToken,
    task: StdMutex<Option<JoinHandle<()>>>,
    _claim: PathClaim,
}

impl WatchedRegister {
    pub(crate) async fn open(
        client: &CoordinationClient,
        path: &str,
        cancel: CancellationToken,
    ) -> Result<Self, CoordinationError> {
        validate_path(path)?;
        let claim = client.claim(path)?;
        let (state_tx, state_rx) = watch::channel(RegisterState::Initializing);
        let (published_tx, published_rx) = watch::channel(None);

        client.ensure_path(path).await?;
        let (_, initial) = client
            .ensemble()
            .get(path)
            .await
            .map_err(|source| CoordinationError::ensemble("get", path, source))?;
        tracing::debug!(path, version = initial, "register initialized");

        let version = Arc::new(Mutex::new(initial));
        let error: ErrorSlot = Arc::new(StdMutex::new(None));
        let (tx, rx) = mpsc::channel(1);
        let cancel = cancel.child_token();

        let watch_loop = WatchLoop {
            path: path.to_string(),
            ensemble: client.downgrade(),
            version: version.clone(),
            tx,
            state: state_tx,
            published: published_tx,
            error: error.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(watch_loop.run());

        Ok(Self {
            path: path.to_string(),
            ensemble: client.downgrade(),
            version,
            stream: StdMutex::new(Some(ValueStream { rx })),
            error,
            state: state_rx,
            published: published_rx,
            cancel,
            task: StdMutex::new(Some(task)),
            _claim: claim,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Hand out the notification stream. Only the first call gets it.
    pub fn take_stream(&self) -> Option<ValueStream> {
        self.stream.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    /// Most recently observed version.
    pub async fn version(&self) -> Version {
        *self.version.lock().await
    }

    pub fn state(&self) -> RegisterState {
        *self.state.borrow()
    }

    /// Resolves once the watch task reaches `target` (or any terminal state).
    pub async fn wait_for_state(&self, target: RegisterState) -> RegisterState {
        let mut rx = self.state.clone();
        let reached = match rx.wait_for(|s| *s == target || s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        reached
    }

    /// Last version the watch task put on the stream.
    pub fn published_version(&self) -> Option<Version> {
        *self.published.borrow()
    }

    /// Error that stopped the watch task, if it failed.
    pub fn last_error(&self) -> Option<Arc<CoordinationError>> {
        self.error.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Compare-and-set using the last observed version.
    ///
    /// Returns the new version. A concurrent writer surfaces as
    /// [`CoordinationError::VersionConflict`]; this method never retries.
    /// With a consumer attached it returns only after the value is published.
    pub async fn update(&self, value: &[u8]) -> Result<Version, CoordinationError> {
        let expected = *self.version.lock().await;
        self.update_with_version(value, expected).await
    }

    /// Compare-and-set against an explicit version.
    pub async fn update_with_version(
        &self,
        value: &[u8],
        expected: Version,
    ) -> Result<Version, CoordinationError> {
        let ensemble = self.ensemble.upgrade().ok_or(CoordinationError::ClientClosed)?;
        let written = ensemble.set(&self.path, value, expected).await;
        drop(ensemble);
        match written {
            Ok(new_version) => {
                {
                    let mut cached = self.version.lock().await;
                    *cached = (*cached).max(new_version);
                }
                tracing::debug!(path = %self.path, version = new_version, "register updated");
                if self.has_consumer() {
                    self.wait_published(new_version).await;
                }
                Ok(new_version)
            }
            Err(EnsembleError::BadVersion) => Err(CoordinationError::VersionConflict {
                path: self.path.clone(),
                expected,
            }),
            Err(source) => Err(CoordinationError::ensemble("set", &self.path, source)),
        }
    }

    /// Re-read value and version from the ensemble into the cache.
    pub async fn refresh(&self) -> Result<(Vec<u8>, Version), CoordinationError> {
        let ensemble = self.ensemble.upgrade().ok_or(CoordinationError::ClientClosed)?;
        let mut cached = self.version.lock().await;
        let (value, version) = ensemble
            .get(&self.path)
            .await
            .map_err(|source| CoordinationError::ensemble("get", &self.path, source))?;
        *cached = version;
        Ok((value, version))
    }

    /// `update`, re-reading and retrying on version conflicts per `policy`.
    pub async fn update_with_retry(
        &self,
        value: &[u8],
        policy: &RetryPolicy,
    ) -> Result<Version, CoordinationError> {
        let mut attempt = 0u32;
        loop {
            match self.update(value).await {
                Err(err) if err.is_version_conflict() && attempt < policy.attempts => {
                    let delay = policy.delay(attempt);
                    attempt += 1;
                    tracing::debug!(path = %self.path, attempt, ?delay, "version conflict, retrying");
                    tokio::time::sleep(delay).await;
                    self.refresh().await?;
                }
                other => return other,
            }
        }
    }

    fn has_consumer(&self) -> bool {
        self.stream.lock().unwrap_or_else(|p| p.into_inner()).is_none()
    }

    /// Wait until `version` (or a later one) is on the stream, or the watch
    /// task has stopped.
    async fn wait_published(&self, version: Version) {
        let mut published = self.published.clone();
        let mut state = self.state.clone();
        tokio::select! {
            _ = async {
                published
                    .wait_for(|p| p.is_some_and(|p| p >= version))
                    .await
                    .map(|_| ())
            } => {}
            _ = async { state.wait_for(RegisterState::is_terminal).await.map(|_| ()) } => {}
        }
    }

    /// Stop the watch task and wait for it to exit.
    pub async fn close(&self) {
        self.cancel.cancel();
        let task = self.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!(path = %self.path, error = %err, "watch task join failure");
            }
        }
    }
}

impl Drop for WatchedRegister {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for WatchedRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedRegister")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Watch task
// ---------------------------------------------------------------------------

struct WatchLoop {
    path: String,
    ensemble: Weak<dyn Ensemble>,
    version: Arc<Mutex<Version>>,
    tx: mpsc::Sender<Vec<u8>>,
    state: watch::Sender<RegisterState>,
    published: watch::Sender<Option<Version>>,
    error: ErrorSlot,
    cancel: CancellationToken,
}

impl WatchLoop {
    async fn run(self) {
        match self.watch().await {
            Ok(()) => {
                tracing::debug!(path = %self.path, "watch task closed");
                self.state.send_replace(RegisterState::Closed);
            }
            Err(err) => {
                tracing::error!(path = %self.path, error = %err, "watch task failed");
                *self.error.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(err));
                self.state.send_replace(RegisterState::Failed);
            }
        }
        // `self.tx` drops here and closes the stream.
    }

    async fn watch(&self) -> Result<(), CoordinationError> {
        let mut published: Option<Version> = None;

        loop {
            let Some(ensemble) = self.ensemble.upgrade() else {
                tracing::debug!(path = %self.path, "client dropped");
                return Ok(());
            };

            let (value, version, armed) = {
                let mut cached = tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    guard = self.version.lock() => guard,
                };
                let read = tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    read = ensemble.get_and_watch(&self.path) => read,
                };
                let (value, version, armed) = read.map_err(|source| {
                    CoordinationError::ensemble("get-and-watch", &self.path, source)
                })?;
                *cached = version;
                (value, version, armed)
            };
            drop(ensemble);

            if published != Some(version) {
                self.state.send_replace(RegisterState::Notifying);
                tracing::debug!(path = %self.path, version, bytes = value.len(), "publishing value");
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    sent = self.tx.send(value) => {
                        if sent.is_err() {
                            tracing::debug!(path = %self.path, "stream consumer dropped");
                            return Ok(());
                        }
                    }
                }
                published = Some(version);
                self.published.send_replace(published);
            }
            self.state.send_replace(RegisterState::Watching);

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = armed.fired() => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
