//! The slice of the coordination-service protocol the register relies on.
//!
//! | Operation       | ZooKeeper call                   |
//! |-----------------|----------------------------------|
//! | `exists`        | `exists`                         |
//! | `create`        | `create` (persistent, world ACL) |
//! | `get`           | `getData`                        |
//! | `get_and_watch` | `getData` with a data watch      |
//! | `set`           | `setData` with expected version  |

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::EnsembleError;

/// Optimistic-concurrency version attached to a node's value.
pub type Version = i32;

/// A one-shot watch armed by [`Ensemble::get_and_watch`].
///
/// Resolves once, on the next change (or session event) for the node. It has
/// to be re-armed by another `get_and_watch` to observe anything after that.
pub struct Watch {
    fired: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Watch {
    pub fn new<F>(fired: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            fired: Box::pin(fired),
        }
    }

    pub async fn fired(self) {
        self.fired.await
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Watch")
    }
}

#[async_trait]
pub trait Ensemble: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, EnsembleError>;

    /// Create a persistent node with open access control.
    async fn create(&self, path: &str, data: &[u8]) -> Result<(), EnsembleError>;

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Version), EnsembleError>;

    /// Read the current value and arm a one-shot watch in the same round trip.
    async fn get_and_watch(&self, path: &str) -> Result<(Vec<u8>, Version, Watch), EnsembleError>;

    /// Compare-and-set. Returns the new version.
    async fn set(&self, path: &str, data: &[u8], version: Version) -> Result<Version, EnsembleError>;
}
