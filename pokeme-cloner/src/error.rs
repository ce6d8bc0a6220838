//! Error types for pokeme-cloner.

use std::path::PathBuf;

use thiserror::Error;

use pokeme_renderer::RenderError;

#[derive(Debug, Error)]
pub enum CloneError {
    /// A setting the pipeline cannot run without.
    #[error("missing required setting: {key}")]
    MissingKey { key: &'static str },

    /// The ssh private key cannot be read.
    #[error("ssh key {path} is not readable: {source}")]
    InvalidKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The previous deployment could not be moved aside; nothing was touched.
    #[error("cannot back up {from} to {to}: {source}")]
    Backup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `git` could not be started at all.
    #[error("cannot run git {op}: {source}")]
    Spawn {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// `git` ran and exited non-zero.
    #[error("git {op} failed: {stderr}")]
    Git { op: &'static str, stderr: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot render {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CloneError {
    CloneError::Io {
        path: path.into(),
        source,
    }
}
