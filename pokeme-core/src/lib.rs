//! Shared types for poke-me: commit ids, secrets and configuration.
//!
//! - [`types`]: [`CommitId`] and [`Secrets`]
//! - [`config`]: YAML configuration discovery, load and validation
//! - [`error`]: [`ConfigError`], [`CommitIdError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ClonerConfig, Config, GitConfig, SshConfig, ZkConfig};
pub use error::{CommitIdError, ConfigError};
pub use types::{CommitId, Secrets};
