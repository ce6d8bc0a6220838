use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] pokeme_core::ConfigError),

    #[error("clone pipeline error: {0}")]
    Clone(#[from] pokeme_cloner::CloneError),

    #[error("coordination error: {0}")]
    Coordination(#[from] pokeme_coord::CoordinationError),

    /// The watch task stopped on an unrecoverable read error.
    #[error("register {path} failed: {reason}")]
    RegisterFailed { path: String, reason: String },

    #[error("notification stream for {path} was already taken")]
    StreamTaken { path: String },

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },

    #[error("signal handler failed: {0}")]
    Signal(std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
