//! In-process [`Ensemble`] with ZooKeeper node semantics.
//!
//! - `/` always exists; a node can only be created under an existing parent.
//! - A new node has version 0; every `set` increments it.
//! - Data watches are one-shot and fire on `set` and `delete`.
//!
//! Every operation yields to the scheduler first so concurrent callers
//! interleave the way remote calls would.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::ensemble::{Ensemble, Version, Watch};
use crate::error::EnsembleError;

#[derive(Default)]
struct Node {
    data: Vec<u8>,
    version: Version,
    watchers: Vec<oneshot::Sender<()>>,
}

impl Node {
    fn fire(&mut self) {
        for watcher in self.watchers.drain(..) {
            let _ = watcher.send(());
        }
    }
}

#[derive(Default)]
pub struct MemoryEnsemble {
    nodes: Mutex<HashMap<String, Node>>,
}

impl MemoryEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a node's value and version.
    pub fn value(&self, path: &str) -> Option<(Vec<u8>, Version)> {
        let nodes = self.lock();
        nodes.get(path).map(|n| (n.data.clone(), n.version))
    }

    /// Number of nodes, excluding the implicit root.
    pub fn node_count(&self) -> usize {
        self.lock().len()
    }

    /// Remove a node and fire its watches; later reads fail with `NoNode`.
    pub fn delete(&self, path: &str) -> Result<(), EnsembleError> {
        let mut nodes = self.lock();
        let mut node = nodes.remove(path).ok_or(EnsembleError::NoNode)?;
        node.fire();
        Ok(())
    }

    /// Number of armed, unfired watches on `path`.
    pub fn watch_count(&self, path: &str) -> usize {
        self.lock()
            .get(path)
            .map(|n| n.watchers.iter().filter(|w| !w.is_closed()).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Node>> {
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parent(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

#[async_trait]
impl Ensemble for MemoryEnsemble {
    async fn exists(&self, path: &str) -> Result<bool, EnsembleError> {
        tokio::task::yield_now().await;
        Ok(path == "/" || self.lock().contains_key(path))
    }

    async fn create(&self, path: &str, data: &[u8]) -> Result<(), EnsembleError> {
        tokio::task::yield_now().await;
        let mut nodes = self.lock();
        if path == "/" || nodes.contains_key(path) {
            return Err(EnsembleError::NodeExists);
        }
        if let Some(parent) = parent(path) {
            if !nodes.contains_key(parent) {
                return Err(EnsembleError::NoNode);
            }
        }
        nodes.insert(
            path.to_string(),
            Node {
                data: data.to_vec(),
                ..Node::default()
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Version), EnsembleError> {
        tokio::task::yield_now().await;
        self.value(path).ok_or(EnsembleError::NoNode)
    }

    async fn get_and_watch(&self, path: &str) -> Result<(Vec<u8>, Version, Watch), EnsembleError> {
        tokio::task::yield_now().await;
        let mut nodes = self.lock();
        let node = nodes.get_mut(path).ok_or(EnsembleError::NoNode)?;
        let (tx, rx) = oneshot::channel();
        node.watchers.push(tx);
        let watch = Watch::new(async move {
            let _ = rx.await;
        });
        Ok((node.data.clone(), node.version, watch))
    }

    async fn set(&self, path: &str, data: &[u8], version: Version) -> Result<Version, EnsembleError> {
        tokio::task::yield_now().await;
        let mut nodes = self.lock();
        let node = nodes.get_mut(path).ok_or(EnsembleError::NoNode)?;
        if node.version != version {
            return Err(EnsembleError::BadVersion);
        }
        node.data = data.to_vec();
        node.version += 1;
        node.fire();
        Ok(node.version)
    }
}
