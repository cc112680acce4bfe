//! CLI parser and dispatch.

mod check;
mod crawl;
mod init;
mod lookup;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::load_settings;
use crate::extract::FingerprintSource;

#[derive(Parser)]
#[command(name = "flatwatch")]
#[command(about = "Daily apartment listing crawler with re-listing detection")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and dedup database
    Init,

    /// Collect the target day's listings
    Crawl {
        /// Stop after this many listing pages (overrides config)
        #[arg(short, long)]
        max_pages: Option<u32>,
        /// Run as if on this date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Text the dedup fingerprint is computed from: title or description
        #[arg(long)]
        fingerprint: Option<FingerprintSource>,
        /// Also write the summary as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
        /// Keep dedup records in memory only (nothing persisted)
        #[arg(long)]
        memory_store: bool,
    },

    /// Run block detection and listing extraction on a saved page
    Check {
        /// Saved listing page HTML
        file: PathBuf,
        /// Run date to derive the target day from (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show the stored dedup record for a fingerprint
    Lookup {
        /// Hex fingerprint, or ad text with --text
        value: String,
        /// Treat VALUE as text and fingerprint it first
        #[arg(long)]
        text: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, config) = load_settings(cli.config.as_deref())
        .await
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Crawl {
            max_pages,
            date,
            fingerprint,
            json,
            memory_store,
        } => {
            let options = crawl::CrawlOptions {
                max_pages,
                date,
                fingerprint,
                json,
                memory_store,
            };
            crawl::cmd_crawl(&settings, config, options).await
        }
        Commands::Check { file, date } => check::cmd_check(&config, &file, date).await,
        Commands::Lookup { value, text } => lookup::cmd_lookup(&settings, &value, text).await,
    }
}
