//! `poke-me run`: the long-running deploy service.

use anyhow::{Context, Result};
use clap::Args;

use super::load_config;
use crate::GlobalArgs;

/// Arguments for `poke-me run`.
#[derive(Args, Debug)]
pub struct RunArgs {}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, source) = load_config(global)?;
        if source.is_none() {
            eprintln!("no configuration file found, using defaults");
        }
        pokeme_daemon::start_blocking(config).context("poke-me stopped with an error")
    }
}
