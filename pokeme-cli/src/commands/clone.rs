//! `poke-me clone`: one deploy, outside the daemon.

use anyhow::{Context, Result};
use clap::Args;
use pokeme_cloner::{CloneReport, Cloner};
use pokeme_core::CommitId;

use super::load_config;
use crate::GlobalArgs;

/// Arguments for `poke-me clone`.
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Commit to check out (4 to 64 hex characters).
    pub commit: CommitId,

    /// Move the current deployment aside instead of deleting it.
    #[arg(long)]
    pub backup: bool,

    /// Print the deploy report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl CloneArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, _) = load_config(global)?;
        pokeme_daemon::init_tracing(config.log_level);

        let cloner = Cloner::new(&config.cloner).context("cloner configuration")?;
        let backup = self.backup || config.cloner.backup;
        let report = cloner
            .clone_commit(&self.commit, &config.secrets, backup)
            .with_context(|| format!("deploying {}", self.commit))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &CloneReport) {
    println!(
        "deployed {} into {}",
        report.commit.short(),
        report.destination.display()
    );
    if let Some(backup) = &report.backup {
        println!("  previous deployment: {}", backup.display());
    }
    for path in &report.rendered {
        println!("  rendered {}", path.display());
    }
    if !report.skipped.is_empty() {
        println!("  {} file(s) skipped (not UTF-8)", report.skipped.len());
    }
}
