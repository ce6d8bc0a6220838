//! `git` command-line driver.
//!
//! Every invocation gets:
//! - `GIT_SSH_COMMAND`: the configured private key, `IdentitiesOnly`, and the
//!   host-key policy
//! - `GIT_TERMINAL_PROMPT=0` so a credential prompt fails instead of hanging

use std::path::{Path, PathBuf};
use std::process::Command;

use pokeme_core::{CommitId, SshConfig};

use crate::error::CloneError;

#[derive(Debug, Clone)]
pub struct GitTransport {
    key: PathBuf,
    verify_host_key: bool,
    known_hosts: Option<PathBuf>,
}

impl GitTransport {
    pub fn new(key: impl Into<PathBuf>, ssh: &SshConfig) -> Self {
        Self {
            key: key.into(),
            verify_host_key: ssh.verify_host_key,
            known_hosts: ssh.known_hosts.clone(),
        }
    }

    pub fn verifies_host_key(&self) -> bool {
        self.verify_host_key
    }

    pub fn ssh_command(&self) -> String {
        let mut cmd = format!(
            "ssh -i {} -o IdentitiesOnly=yes",
            shell_quote(&self.key.to_string_lossy())
        );
        if self.verify_host_key {
            cmd.push_str(" -o StrictHostKeyChecking=yes");
            if let Some(known) = &self.known_hosts {
                cmd.push_str(" -o UserKnownHostsFile=");
                cmd.push_str(&shell_quote(&known.to_string_lossy()));
            }
        } else {
            cmd.push_str(" -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null");
        }
        cmd
    }

    /// `git clone --depth <depth> --single-branch [--branch <b>] -- <url> <dest>`
    pub fn clone(
        &self,
        url: &str,
        dest: &Path,
        depth: u32,
        branch: Option<&str>,
    ) -> Result<(), CloneError> {
        let depth = depth.to_string();
        let mut cmd = self.command();
        cmd.args(["clone", "--quiet", "--depth", &depth, "--single-branch"]);
        if let Some(branch) = branch {
            cmd.args(["--branch", branch]);
        }
        cmd.arg("--").arg(url).arg(dest);
        run("clone", cmd)
    }

    /// Force the working tree of `dest` to `commit` (detached HEAD).
    pub fn checkout(&self, dest: &Path, commit: &CommitId) -> Result<(), CloneError> {
        let mut cmd = self.command();
        cmd.arg("-C")
            .arg(dest)
            .args(["checkout", "--quiet", "--force", commit.as_str(), "--"]);
        run("checkout", cmd)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.env("GIT_SSH_COMMAND", self.ssh_command())
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }
}

fn run(op: &'static str, mut cmd: Command) -> Result<(), CloneError> {
    tracing::debug!(op, command = ?cmd, "running git");
    let output = cmd
        .output()
        .map_err(|source| CloneError::Spawn { op, source })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(CloneError::Git {
            op,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn shell_quote(raw: &str) -> String {
    if !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@".contains(c))
    {
        return raw.to_string();
    }
    format!("'{}'", raw.replace('\'', r"'\''"))
}
