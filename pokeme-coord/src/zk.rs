//! [`Ensemble`] over a ZooKeeper session.

use std::time::Duration;

use async_trait::async_trait;
use zookeeper_client as zk;

use crate::ensemble::{Ensemble, Version, Watch};
use crate::error::{CoordinationError, EnsembleError};

pub struct ZkEnsemble {
    client: zk::Client,
}

impl ZkEnsemble {
    /// Open a session against `servers` (`host:port` each). No retry.
    pub async fn connect(
        servers: &[String],
        session_timeout: Duration,
    ) -> Result<Self, CoordinationError> {
        let cluster = connect_string(servers);
        if cluster.is_empty() {
            return Err(CoordinationError::Connection {
                servers: cluster,
                reason: "no ensemble endpoints".to_string(),
            });
        }

        let mut connector = zk::Client::connector();
        connector.session_timeout(session_timeout);
        let client = connector
            .connect(&cluster)
            .await
            .map_err(|err| CoordinationError::Connection {
                servers: cluster.clone(),
                reason: err.to_string(),
            })?;

        tracing::info!(servers = %cluster, ?session_timeout, "connected to ensemble");
        Ok(Self { client })
    }
}

/// `["a:2181", " b:2181 "]` → `"a:2181,b:2181"`.
pub(crate) fn connect_string(servers: &[String]) -> String {
    servers
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn map_err(err: zk::Error) -> EnsembleError {
    match err {
        zk::Error::NodeExists => EnsembleError::NodeExists,
        zk::Error::NoNode => EnsembleError::NoNode,
        zk::Error::BadVersion => EnsembleError::BadVersion,
        other => EnsembleError::Other(other.to_string()),
    }
}

#[async_trait]
impl Ensemble for ZkEnsemble {
    async fn exists(&self, path: &str) -> Result<bool, EnsembleError> {
        let stat = self.client.check_stat(path).await.map_err(map_err)?;
        Ok(stat.is_some())
    }

    async fn create(&self, path: &str, data: &[u8]) -> Result<(), EnsembleError> {
        let options = zk::CreateMode::Persistent.with_acls(zk::Acls::anyone_all());
        self.client
            .create(path, data, &options)
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Version), EnsembleError> {
        let (data, stat) = self.client.get_data(path).await.map_err(map_err)?;
        Ok((data, stat.version))
    }

    async fn get_and_watch(&self, path: &str) -> Result<(Vec<u8>, Version, Watch), EnsembleError> {
        let (data, stat, watcher) = self
            .client
            .get_and_watch_data(path)
            .await
            .map_err(map_err)?;
        let watch = Watch::new(async move {
            let event = watcher.changed().await;
            tracing::trace!(?event, "data watch fired");
        });
        Ok((data, stat.version, watch))
    }

    async fn set(&self, path: &str, data: &[u8], version: Version) -> Result<Version, EnsembleError> {
        let stat = self
            .client
            .set_data(path, data, Some(version))
            .await
            .map_err(map_err)?;
        Ok(stat.version)
    }
}
