//! Error types for pokeme-coord.

use thiserror::Error;

use crate::ensemble::Version;

/// Failure reported by an [`Ensemble`](crate::Ensemble) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnsembleError {
    #[error("node already exists")]
    NodeExists,

    #[error("node does not exist")]
    NoNode,

    /// Compare-and-set rejected: the stored version differs from the expected one.
    #[error("version mismatch")]
    BadVersion,

    /// Connection loss, session expiry, auth failure and everything else.
    #[error("{0}")]
    Other(String),
}

/// All errors surfaced by the coordination client and watched registers.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The ensemble could not be reached at startup.
    #[error("cannot connect to ensemble '{servers}': {reason}")]
    Connection { servers: String, reason: String },

    /// Path creation, read or write failure other than a version conflict.
    #[error("{op} failed on {path}: {source}")]
    Ensemble {
        op: &'static str,
        path: String,
        #[source]
        source: EnsembleError,
    },

    /// Optimistic-lock rejection; re-read and decide whether to retry.
    #[error("version conflict on {path}: expected version {expected}")]
    VersionConflict { path: String, expected: Version },

    /// The register outlived the client that created it.
    #[error("coordination client closed")]
    ClientClosed,

    #[error("a register is already open for {path}")]
    AlreadyRegistered { path: String },

    #[error("invalid node path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl CoordinationError {
    pub(crate) fn ensemble(op: &'static str, path: &str, source: EnsembleError) -> Self {
        CoordinationError::Ensemble {
            op,
            path: path.to_string(),
            source,
        }
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, CoordinationError::VersionConflict { .. })
    }
}
