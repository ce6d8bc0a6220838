//! `poke-me publish`: write a commit id into the register.
//!
//! Every daemon watching the same path deploys it, exactly as if the webhook
//! had received a push.

use anyhow::{bail, Context, Result};
use clap::Args;
use pokeme_coord::{CoordinationClient, RetryPolicy};
use pokeme_core::CommitId;
use tokio_util::sync::CancellationToken;

use super::load_config;
use crate::GlobalArgs;

/// Arguments for `poke-me publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Commit id to publish.
    pub commit: CommitId,
}

impl PublishArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, _) = load_config(global)?;
        if config.zk.servers.iter().all(|s| s.trim().is_empty()) {
            bail!("missing required setting 'zk.servers'");
        }
        pokeme_daemon::init_tracing(config.log_level);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building tokio runtime")?;

        let version = runtime.block_on(async {
            let client =
                CoordinationClient::connect(&config.zk.servers, config.zk.session_timeout())
                    .await?;
            let register = client
                .register(&config.zk.path, CancellationToken::new())
                .await?;
            let policy = RetryPolicy::with_attempts(config.zk.update_retries);
            let result = register
                .update_with_retry(self.commit.as_str().as_bytes(), &policy)
                .await;
            register.close().await;
            result
        });
        let version = version.with_context(|| format!("publishing to {}", config.zk.path))?;

        tracing::info!(commit = %self.commit, version, "published");
        println!("{} -> {} (version {version})", self.commit, config.zk.path);
        Ok(())
    }
}
