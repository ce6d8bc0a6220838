//! Error types for pokeme-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (printing the effective config).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested config file does not exist.
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    /// A setting required before any network activity is absent or empty.
    #[error("missing required setting '{key}'")]
    Missing { key: &'static str },

    /// A secret name cannot be referenced as a `{{key}}` placeholder.
    #[error("secret name '{key}' is not a valid template identifier")]
    InvalidSecretKey { key: String },

    #[error("invalid listen address '{value}': {reason}")]
    InvalidListen { value: String, reason: String },

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Why a string is not a commit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitIdError {
    #[error("commit id must be 4 to 64 characters, got {len}")]
    Length { len: usize },

    #[error("commit id contains non-hex character {found:?}")]
    NotHex { found: char },

    #[error("commit id is not valid UTF-8")]
    NotUtf8,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
