//! Clone pipeline: backup, wipe, shallow clone, checkout, render.
//!
//! # Partial state on failure
//!
//! Nothing is rolled back. Where the destination stands after each failing step:
//!
//! | Failing step | Destination                                              |
//! |--------------|----------------------------------------------------------|
//! | backup       | untouched                                                |
//! | remove       | partially deleted                                        |
//! | clone        | absent or partially cloned                               |
//! | checkout     | fresh clone of the branch tip, un-rendered               |
//! | render       | requested commit, files before the failing one rendered  |
//!
//! No file of the previous deployment survives past the remove step, except
//! inside the backup sibling.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use pokeme_core::{ClonerConfig, CommitId, Secrets};
use pokeme_renderer::SecretRenderer;

use crate::error::{io_err, CloneError};
use crate::git::GitTransport;
use crate::render::render_tree;

const BACKUP_TIMESTAMP: &str = "%Y%m%dT%H%M%S%.9fZ";

/// Outcome of one successful clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneReport {
    pub commit: CommitId,
    pub destination: PathBuf,
    /// Where the previous deployment was moved, when a backup was taken.
    pub backup: Option<PathBuf>,
    pub rendered: Vec<PathBuf>,
    /// Files left untouched because they are not UTF-8.
    pub skipped: Vec<PathBuf>,
}

/// Deploys one commit. The dispatch loop only knows this contract.
pub trait Deploy: Send + Sync {
    fn deploy(
        &self,
        commit: &CommitId,
        secrets: &Secrets,
        backup: bool,
    ) -> Result<CloneReport, CloneError>;
}

#[derive(Debug, Clone)]
pub struct Cloner {
    destination: PathBuf,
    url: String,
    branch: Option<String>,
    depth: u32,
    git: GitTransport,
}

impl Cloner {
    /// Fails when the destination, repository url or ssh key is not configured,
    /// or the key file cannot be read.
    pub fn new(config: &ClonerConfig) -> Result<Self, CloneError> {
        let destination = config
            .path
            .as_deref()
            .ok_or(CloneError::MissingKey { key: "cloner.path" })?;
        let url = config
            .git
            .url
            .clone()
            .ok_or(CloneError::MissingKey { key: "cloner.git.url" })?;
        let key = config
            .ssh
            .key
            .clone()
            .ok_or(CloneError::MissingKey { key: "cloner.ssh.key" })?;

        std::fs::File::open(&key).map_err(|source| CloneError::InvalidKey {
            path: key.clone(),
            source,
        })?;

        let git = GitTransport::new(key, &config.ssh);
        if !git.verifies_host_key() {
            tracing::warn!("ssh host key verification is disabled for the git transport");
        }

        Ok(Self {
            destination: normalize(destination),
            url,
            branch: config.git.branch.clone(),
            depth: config.depth.max(1),
            git,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn clone_commit(
        &self,
        commit: &CommitId,
        secrets: &Secrets,
        backup: bool,
    ) -> Result<CloneReport, CloneError> {
        let dest = &self.destination;
        let renderer = SecretRenderer::new(secrets).map_err(|source| CloneError::Render {
            path: dest.clone(),
            source,
        })?;
        tracing::info!(commit = %commit, destination = %dest.display(), backup, "deploying");
        tracing::debug!(keys = ?secrets.keys().collect::<Vec<_>>(), "known secrets");

        // 1. backup
        let backup_dir = if backup && exists(dest)? {
            let to = backup_path(dest, Utc::now());
            std::fs::rename(dest, &to).map_err(|source| CloneError::Backup {
                from: dest.clone(),
                to: to.clone(),
                source,
            })?;
            tracing::info!(backup = %to.display(), "previous deployment moved aside");
            Some(to)
        } else {
            None
        };

        // 2. wipe
        if exists(dest)? {
            std::fs::remove_dir_all(dest).map_err(|source| CloneError::Remove {
                path: dest.clone(),
                source,
            })?;
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        // 3. clone, 4. checkout
        self.git
            .clone(&self.url, dest, self.depth, self.branch.as_deref())?;
        self.git.checkout(dest, commit)?;

        // 5. render
        let summary = render_tree(dest, &renderer)?;
        tracing::info!(
            commit = %commit,
            rendered = summary.rendered.len(),
            skipped = summary.skipped.len(),
            "deployed"
        );

        Ok(CloneReport {
            commit: commit.clone(),
            destination: dest.clone(),
            backup: backup_dir,
            rendered: summary.rendered,
            skipped: summary.skipped,
        })
    }
}

impl Deploy for Cloner {
    fn deploy(
        &self,
        commit: &CommitId,
        secrets: &Secrets,
        backup: bool,
    ) -> Result<CloneReport, CloneError> {
        self.clone_commit(commit, secrets, backup)
    }
}

/// `<dest>.<UTC timestamp>`, a sibling of `dest`.
pub fn backup_path(dest: &Path, at: DateTime<Utc>) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".");
    name.push(at.format(BACKUP_TIMESTAMP).to_string());
    PathBuf::from(name)
}

/// Drops trailing separators and `.` segments.
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

/// True for anything at `path`, including a dangling symlink.
fn exists(path: &Path) -> Result<bool, CloneError> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}
