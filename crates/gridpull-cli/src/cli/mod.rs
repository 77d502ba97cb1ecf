//! CLI for the gridpull dataset downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use gridpull_core::config;
use std::path::PathBuf;

use commands::{run_completions, run_config, run_scrape};

/// Top-level CLI for the gridpull dataset downloader.
#[derive(Debug, Parser)]
#[command(name = "gridpull")]
#[command(about = "gridpull: pull dataset items through a grid of remote browser workers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a dataset's items through the configured worker nodes.
    Run {
        /// Directory to store downloaded items in (default: current directory).
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Remote automation node (host, or full WebDriver hub URL). Repeatable.
        #[arg(short, long = "node", value_name = "HOST", required = true)]
        node: Vec<String>,

        /// Dataset id to download (appears in the URL of the site).
        #[arg(short, long)]
        dataset: String,

        /// Subdirectory of the output directory the downloads land in.
        #[arg(long, default_value = "Data", value_name = "NAME")]
        data_dir: String,

        /// Logging verbosity.
        #[arg(
            short,
            long,
            default_value = "warn",
            value_parser = ["error", "warn", "info", "debug", "trace"]
        )]
        verbosity: String,

        /// Hand a failed job index to the remaining workers instead of
        /// dropping it (the default treats a failure as end-of-data).
        #[arg(long)]
        retry_elsewhere: bool,
    },

    /// Print the effective configuration and where it was loaded from.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Verbosity chosen on the command line, if the command carries one.
    pub fn verbosity(&self) -> Option<String> {
        match &self.command {
            CliCommand::Run { verbosity, .. } => Some(verbosity.clone()),
            _ => None,
        }
    }

    pub fn execute(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Run {
                output,
                node,
                dataset,
                data_dir,
                verbosity: _,
                retry_elsewhere,
            } => {
                let output = match output {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                run_scrape(cfg, &output, node, &dataset, &data_dir, retry_elsewhere)
            }
            CliCommand::Config => run_config(&cfg),
            CliCommand::Completions { shell } => run_completions(shell),
        }
    }
}

#[cfg(test)]
mod tests;
