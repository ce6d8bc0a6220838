//! Coordination client: owns the ensemble session, ensures node paths, and
//! hands out one [`WatchedRegister`] per path.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ensemble::Ensemble;
use crate::error::{CoordinationError, EnsembleError};
use crate::register::WatchedRegister;
use crate::zk::ZkEnsemble;

type Claims = Arc<Mutex<HashSet<String>>>;

pub struct CoordinationClient {
    ensemble: Arc<dyn Ensemble>,
    session_timeout: Duration,
    claims: Claims,
}

impl CoordinationClient {
    /// Open a ZooKeeper session. Callers retry on failure.
    pub async fn connect(
        servers: &[String],
        session_timeout: Duration,
    ) -> Result<Self, CoordinationError> {
        let ensemble = ZkEnsemble::connect(servers, session_timeout).await?;
        Ok(Self::with_ensemble(Arc::new(ensemble), session_timeout))
    }

    /// Wrap an already connected ensemble.
    pub fn with_ensemble(ensemble: Arc<dyn Ensemble>, session_timeout: Duration) -> Self {
        Self {
            ensemble,
            session_timeout,
            claims: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    pub(crate) fn ensemble(&self) -> Arc<dyn Ensemble> {
        self.ensemble.clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Ensemble> {
        Arc::downgrade(&self.ensemble)
    }

    /// Create every missing segment of `path`, root first.
    ///
    /// Losing a creation race to another caller counts as success.
    pub async fn ensure_path(&self, path: &str) -> Result<(), CoordinationError> {
        ensure_path(self.ensemble.as_ref(), path).await
    }

    /// Open the watched register for `path`.
    ///
    /// Cancelling `cancel` (or dropping the register) stops its watch task.
    pub async fn register(
        &self,
        path: &str,
        cancel: CancellationToken,
    ) -> Result<WatchedRegister, CoordinationError> {
        WatchedRegister::open(self, path, cancel).await
    }

    pub(crate) fn claim(&self, path: &str) -> Result<PathClaim, CoordinationError> {
        let mut claims = self.claims.lock().unwrap_or_else(|p| p.into_inner());
        if !claims.insert(path.to_string()) {
            return Err(CoordinationError::AlreadyRegistered {
                path: path.to_string(),
            });
        }
        Ok(PathClaim {
            path: path.to_string(),
            claims: self.claims.clone(),
        })
    }
}

/// Reserves a path for one register; released on drop.
pub(crate) struct PathClaim {
    path: String,
    claims: Claims,
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        let mut claims = self.claims.lock().unwrap_or_else(|p| p.into_inner());
        claims.remove(&self.path);
    }
}

pub(crate) fn validate_path(path: &str) -> Result<(), CoordinationError> {
    let invalid = |reason| CoordinationError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if !path.starts_with('/') {
        return Err(invalid("must be absolute"));
    }
    if path == "/" {
        return Err(invalid("root cannot be a register"));
    }
    if path.ends_with('/') {
        return Err(invalid("trailing slash"));
    }
    if path[1..].split('/').any(str::is_empty) {
        return Err(invalid("empty segment"));
    }
    Ok(())
}

/// `/a/b/c` → `["/a", "/a/b", "/a/b/c"]`.
fn prefixes(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .skip(1)
        .map(|(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
        .collect()
}

pub(crate) async fn ensure_path(
    ensemble: &dyn Ensemble,
    path: &str,
) -> Result<(), CoordinationError> {
    validate_path(path)?;
    for node in prefixes(path) {
        let exists = ensemble
            .exists(node)
            .await
            .map_err(|source| CoordinationError::ensemble("exists", node, source))?;
        if exists {
            continue;
        }
        match ensemble.create(node, b"").await {
            Ok(()) => tracing::debug!(path = node, "created node"),
            Err(EnsembleError::NodeExists) => {
                tracing::debug!(path = node, "node created concurrently");
            }
            Err(source) => return Err(CoordinationError::ensemble("create", node, source)),
        }
    }
    Ok(())
}
