pub mod clone;
pub mod config;
pub mod publish;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use pokeme_core::Config;

use crate::GlobalArgs;

/// Load the configuration file and apply command-line overrides.
pub fn load_config(global: &GlobalArgs) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, source) =
        pokeme_core::config::load(global.config.as_deref()).context("loading configuration")?;
    if let Some(listen) = &global.listen {
        config.listen = listen.clone();
    }
    if let Some(level) = global.log_level {
        config.log_level = level;
    }
    Ok((config, source))
}
