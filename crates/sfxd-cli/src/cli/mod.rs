//! CLI for the sfxd batch downloader.

mod commands;
mod manifest;
mod sanitize;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sfxd_core::config;
use std::path::PathBuf;

use commands::{run_fetch, run_plan};

/// Top-level CLI for the sfxd batch downloader.
#[derive(Debug, Parser)]
#[command(name = "sfxd")]
#[command(about = "sfxd: batch downloader for the BBC sound-effects archive", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every sample a manifest lists that is not already on disk.
    Fetch {
        /// Path to the sound-effects CSV manifest.
        manifest: PathBuf,

        /// Output directory (defaults to the configured one).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Concurrent downloads (defaults to the configured thread count).
        #[arg(long, value_name = "N")]
        threads: Option<usize>,

        /// Retry attempts against a sample's primary URL.
        #[arg(long, value_name = "N")]
        retries: Option<u32>,

        /// Per-attempt timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Report what a manifest would download, without fetching anything.
    Plan {
        /// Path to the sound-effects CSV manifest.
        manifest: PathBuf,

        /// Output directory (defaults to the configured one).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                manifest,
                out,
                threads,
                retries,
                timeout,
            } => run_fetch(&cfg, &manifest, out, threads, retries, timeout).await,
            CliCommand::Plan { manifest, out } => run_plan(&cfg, &manifest, out).await,
        }
    }
}
