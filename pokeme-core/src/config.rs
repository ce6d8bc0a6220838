//! YAML configuration.
//!
//! # Discovery
//!
//! ```text
//! --config <file>              (explicit; must exist)
//! /etc/poke-me/config.yaml
//! $HOME/.poke-me/config.yaml
//! ./config.yaml
//! ```
//!
//! The first existing file wins; with none present the defaults are used and
//! [`Config::validate`] reports what is missing.
//!
//! # API pattern
//!
//! - `load_at(explicit, home, cwd)`: explicit roots, used in tests with `TempDir`
//! - `load(explicit)`: derives home from `dirs::home_dir()` and the process cwd

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{is_template_identifier, Secrets};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG_LEVEL: u8 = 4;
pub const DEFAULT_REGISTER_PATH: &str = "/poke-me/commit-id";
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPDATE_RETRIES: u32 = 3;
pub const DEFAULT_CLONE_DEPTH: u32 = 1;
pub const CONFIG_FILE_NAME: &str = "config.yaml";

const REDACTED: &str = "<redacted>";

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Process configuration, built once at startup and handed to each component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub listen: String,
    /// 1 (errors only) through 6 (trace); 4 is info.
    pub log_level: u8,
    pub cloner: ClonerConfig,
    pub zk: ZkConfig,
    pub secrets: Secrets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClonerConfig {
    /// Destination directory that is replaced on every deploy.
    pub path: Option<PathBuf>,
    /// Move the previous deployment aside instead of deleting it.
    pub backup: bool,
    pub depth: u32,
    pub ssh: SshConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SshConfig {
    /// Private key file used for the git transport.
    pub key: Option<PathBuf>,
    pub verify_host_key: bool,
    pub known_hosts: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GitConfig {
    pub url: Option<String>,
    /// Shared secret for webhook signatures.
    pub secret: Option<String>,
    /// Branch to clone; the remote default branch when unset.
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ZkConfig {
    pub servers: Vec<String>,
    pub session_timeout_secs: u64,
    pub path: String,
    pub update_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            log_level: DEFAULT_LOG_LEVEL,
            cloner: ClonerConfig::default(),
            zk: ZkConfig::default(),
            secrets: Secrets::new(),
        }
    }
}

impl Default for ClonerConfig {
    fn default() -> Self {
        Self {
            path: None,
            backup: false,
            depth: DEFAULT_CLONE_DEPTH,
            ssh: SshConfig::default(),
            git: GitConfig::default(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            key: None,
            verify_host_key: true,
            known_hosts: None,
        }
    }
}

impl Default for ZkConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            path: DEFAULT_REGISTER_PATH.to_string(),
            update_retries: DEFAULT_UPDATE_RETRIES,
        }
    }
}

impl ZkConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Check everything that must hold before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if !(1..=6).contains(&self.log_level) {
            return Err(ConfigError::Invalid {
                key: "log-level",
                reason: format!("expected 1..=6, got {}", self.log_level),
            });
        }
        if self.cloner.ssh.key.is_none() {
            return Err(ConfigError::Missing { key: "cloner.ssh.key" });
        }
        if is_blank(self.cloner.git.url.as_deref()) {
            return Err(ConfigError::Missing { key: "cloner.git.url" });
        }
        match &self.cloner.path {
            None => return Err(ConfigError::Missing { key: "cloner.path" }),
            Some(p) if p.as_os_str().is_empty() => {
                return Err(ConfigError::Missing { key: "cloner.path" })
            }
            Some(_) => {}
        }
        if is_blank(self.cloner.git.secret.as_deref()) {
            return Err(ConfigError::Missing { key: "cloner.git.secret" });
        }
        if self.cloner.depth == 0 {
            return Err(ConfigError::Invalid {
                key: "cloner.depth",
                reason: "depth must be at least 1".to_string(),
            });
        }
        if self.zk.servers.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Missing { key: "zk.servers" });
        }
        if !self.zk.path.starts_with('/') || self.zk.path.len() < 2 || self.zk.path.ends_with('/') {
            return Err(ConfigError::Invalid {
                key: "zk.path",
                reason: format!("'{}' is not an absolute node path", self.zk.path),
            });
        }
        if let Some(bad) = self.secrets.keys().find(|k| !is_template_identifier(k)) {
            return Err(ConfigError::InvalidSecretKey {
                key: bad.to_string(),
            });
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidListen {
                value: self.listen.clone(),
                reason: e.to_string(),
            })
    }

    /// Copy safe to print: webhook secret and secret values masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.cloner.git.secret.is_some() {
            copy.cloner.git.secret = Some(REDACTED.to_string());
        }
        copy.secrets = self.secrets.masked(REDACTED);
        copy
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Ordered list of implicit config locations.
pub fn search_paths_at(home: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/poke-me").join(CONFIG_FILE_NAME)];
    if let Some(home) = home {
        paths.push(home.join(".poke-me").join(CONFIG_FILE_NAME));
    }
    paths.push(cwd.join(CONFIG_FILE_NAME));
    paths
}

/// Parse a single config file.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve and load the configuration.
///
/// Returns the config together with the file it came from (`None` when only
/// defaults apply).
pub fn load_at(
    explicit: Option<&Path>,
    home: Option<&Path>,
    cwd: &Path,
) -> Result<(Config, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_file(path)?, Some(path.to_path_buf())));
    }
    for candidate in search_paths_at(home, cwd) {
        if candidate.is_file() {
            let config = load_file(&candidate)?;
            return Ok((config, Some(candidate)));
        }
    }
    Ok((Config::default(), None))
}

/// `load_at` convenience wrapper using the real home directory and cwd.
pub fn load(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let home = dirs::home_dir();
    let cwd = std::env::current_dir().map_err(|e| io_err(".", e))?;
    load_at(explicit, home.as_deref(), &cwd)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
