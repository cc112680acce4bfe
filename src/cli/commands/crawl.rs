//! Crawl command.

use std::path::PathBuf;

use chrono::NaiveDate;
use console::style;
use tracing::info;

use crate::config::{Config, Settings};
use crate::crawl::{CrawlOrchestrator, RunContext};
use crate::extract::FingerprintSource;
use crate::fetcher::build_fetcher;
use crate::report::{ConsoleReporter, JsonReporter, Reporter, RunSummary};
use crate::repository::{DedupStore, InMemoryDedupStore, SqliteDedupStore};

/// Command-line overrides for a crawl.
pub struct CrawlOptions {
    pub max_pages: Option<u32>,
    pub date: Option<NaiveDate>,
    pub fingerprint: Option<FingerprintSource>,
    pub json: Option<PathBuf>,
    pub memory_store: bool,
}

pub async fn cmd_crawl(
    settings: &Settings,
    mut config: Config,
    options: CrawlOptions,
) -> anyhow::Result<()> {
    if let Some(max_pages) = options.max_pages {
        config.crawl.max_pages = max_pages;
    }
    if let Some(source) = options.fingerprint {
        config.crawl.fingerprint_source = source;
    }

    let ctx = match options.date {
        Some(date) => RunContext::for_date(date, config.crawl.target_day_offset),
        None => RunContext::now(config.crawl.target_day_offset),
    };

    let store: Box<dyn DedupStore> = if options.memory_store {
        info!("Using in-memory dedup store");
        Box::new(InMemoryDedupStore::new())
    } else {
        settings.ensure_directories()?;
        Box::new(SqliteDedupStore::open(&settings.database_path()).await?)
    };

    let fetcher = build_fetcher(&config.browser)?;
    let mut orchestrator = CrawlOrchestrator::new(&config, ctx, fetcher, store)?;

    println!(
        "{} Crawling ads for {} (fingerprint: {})",
        style("→").cyan(),
        orchestrator.context().target_day,
        config.crawl.fingerprint_source
    );

    let result = orchestrator.run().await;
    orchestrator.shutdown().await;
    let outcome = result?;

    let summary = RunSummary::from_outcome(&outcome);
    ConsoleReporter::stdout().report(&summary)?;
    if let Some(path) = options.json {
        JsonReporter::new(path.clone()).report(&summary)?;
        println!("{} Summary written to {}", style("✓").green(), path.display());
    }
    Ok(())
}
