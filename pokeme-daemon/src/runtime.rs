use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pokeme_cloner::{Cloner, Deploy};
use pokeme_coord::{CoordinationClient, RegisterState, RetryPolicy, WatchedRegister};
use pokeme_core::{Config, Secrets};

use crate::dispatch::dispatch_loop;
use crate::error::{io_err, DaemonError};
use crate::status::{unix_seconds_now, DeployStatus};
use crate::webhook::{router, WebhookState};

/// Everything the long-running tasks need, already constructed.
pub struct Services {
    pub listener: TcpListener,
    pub register: Arc<WatchedRegister>,
    pub deployer: Arc<dyn Deploy>,
    pub secrets: Secrets,
    pub backup: bool,
    pub webhook_secret: Vec<u8>,
    pub branch: Option<String>,
    pub retry: RetryPolicy,
    pub status: DeployStatus,
}

/// Build a multi-thread runtime, install tracing, and block on [`run`].
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing(config.log_level);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Validate, construct every component, then serve until shutdown.
///
/// Configuration, key material and ensemble connection problems all fail
/// here, before the listener is bound.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    config.validate()?;
    let addr = config.listen_addr()?;
    let cloner = Cloner::new(&config.cloner)?;

    let client =
        CoordinationClient::connect(&config.zk.servers, config.zk.session_timeout()).await?;
    let cancel = CancellationToken::new();
    let register = Arc::new(client.register(&config.zk.path, cancel.clone()).await?);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| io_err(addr.to_string(), e))?;
    tracing::info!(
        listen = %addr,
        register = %config.zk.path,
        destination = %cloner.destination().display(),
        "poke-me starting"
    );

    let services = Services {
        listener,
        register,
        deployer: Arc::new(cloner),
        secrets: config.secrets.clone(),
        backup: config.cloner.backup,
        webhook_secret: config.cloner.git.secret.clone().unwrap_or_default().into_bytes(),
        branch: config.cloner.git.branch.clone(),
        retry: RetryPolicy::with_attempts(config.zk.update_retries),
        status: DeployStatus::new(),
    };
    let result = run_services(services, cancel).await;
    drop(client);
    result
}

/// Run the dispatch loop, the webhook server, and the signal handler until
/// one of them stops; the others are then cancelled.
pub async fn run_services(services: Services, cancel: CancellationToken) -> Result<(), DaemonError> {
    let Services {
        listener,
        register,
        deployer,
        secrets,
        backup,
        webhook_secret,
        branch,
        retry,
        status,
    } = services;

    let stream = register.take_stream().ok_or_else(|| DaemonError::StreamTaken {
        path: register.path().to_string(),
    })?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| io_err("webhook listener", e))?;

    let dispatch_handle = {
        let cancel = cancel.clone();
        let status = status.clone();
        tokio::spawn(async move {
            dispatch_loop(stream, deployer, secrets, backup, status, cancel.clone()).await;
            cancel.cancel();
            Ok(())
        })
    };

    let server_handle = {
        let cancel = cancel.clone();
        let state = Arc::new(WebhookState {
            register: register.clone(),
            secret: webhook_secret,
            branch,
            retry,
            status,
            started_at_unix: unix_seconds_now(),
        });
        tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "webhook server listening");
            let shutdown = cancel.clone();
            let result = axum::serve(listener, router(state))
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .map_err(|e| io_err(local_addr.to_string(), e));
            cancel.cancel();
            result
        })
    };

    let signal_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            cancel.cancel();
                            Ok(())
                        }
                        Err(err) => {
                            cancel.cancel();
                            Err(DaemonError::Signal(err))
                        }
                    }
                }
            }
        })
    };

    let (dispatch_result, server_result, signal_result) =
        tokio::join!(dispatch_handle, server_handle, signal_handle);
    register.close().await;

    handle_join("dispatch", dispatch_result)?;
    handle_join("webhook_server", server_result)?;
    handle_join("signal_handler", signal_result)?;

    if register.state() == RegisterState::Failed {
        let reason = register
            .last_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(DaemonError::RegisterFailed {
            path: register.path().to_string(),
            reason,
        });
    }
    tracing::info!("poke-me stopped");
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            reason: err.to_string(),
        }),
    }
}

/// `EnvFilter` directive for a 1 to 6 verbosity level.
pub fn level_directive(log_level: u8) -> &'static str {
    match log_level {
        0..=2 => "error",
        3 => "warn",
        4 => "info",
        5 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(log_level: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels_map_to_filters() {
        let levels: Vec<_> = (1..=6).map(level_directive).collect();
        assert_eq!(levels, ["error", "error", "warn", "info", "debug", "trace"]);
        assert_eq!(level_directive(42), "trace");
    }

    #[tokio::test]
    async fn run_rejects_incomplete_config_before_network() {
        let err = run(Config::default()).await.unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)), "got {err}");
    }
}
