//! `poke-me config`: show what the daemon would run with.

use anyhow::{Context, Result};
use clap::Args;

use super::load_config;
use crate::GlobalArgs;

/// Arguments for `poke-me config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print even when validation fails.
    #[arg(long)]
    pub no_validate: bool,
}

impl ConfigArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let (config, source) = load_config(global)?;
        if !self.no_validate {
            config.validate().context("invalid configuration")?;
        }

        match &source {
            Some(path) => println!("# source: {}", path.display()),
            None => println!("# source: defaults"),
        }
        print!("{}", config.redacted().to_yaml()?);
        Ok(())
    }
}
