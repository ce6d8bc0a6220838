//! poke-me: webhook-driven deploys coordinated through ZooKeeper.
//!
//! # Usage
//!
//! ```text
//! poke-me [--config FILE] [-v LEVEL] [-l ADDR] run
//! poke-me [--config FILE] clone <commit> [--backup]
//! poke-me [--config FILE] publish <commit>
//! poke-me [--config FILE] config
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{clone::CloneArgs, config::ConfigArgs, publish::PublishArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "poke-me",
    version,
    about = "Re-clone a repository whenever a new commit id lands in ZooKeeper",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the loaded configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file; the standard locations are searched when omitted.
    #[arg(long, global = true, env = "POKE_ME_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, 1 (errors only) through 6 (trace).
    #[arg(
        short = 'v',
        long,
        global = true,
        env = "POKE_ME_LOG_LEVEL",
        value_parser = clap::value_parser!(u8).range(1..=6)
    )]
    pub log_level: Option<u8>,

    /// Webhook listen address, e.g. 0.0.0.0:8080.
    #[arg(short = 'l', long, global = true, env = "POKE_ME_LISTEN")]
    pub listen: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the register, serve the webhook and deploy every new commit.
    Run(RunArgs),

    /// Deploy one commit into the configured directory and exit.
    Clone(CloneArgs),

    /// Write a commit id into the register, as the webhook would.
    Publish(PublishArgs),

    /// Validate and print the effective configuration with secrets masked.
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::Run(args) => args.run(&global),
        Commands::Clone(args) => args.run(&global),
        Commands::Publish(args) => args.run(&global),
        Commands::Config(args) => args.run(&global),
    }
}
