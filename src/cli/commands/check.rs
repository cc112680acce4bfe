//! Offline check of a saved listing page.

use std::path::Path;

use chrono::NaiveDate;
use console::style;

use crate::config::Config;
use crate::crawl::RunContext;
use crate::extract::{BlockDetector, ListingExtractor};

pub async fn cmd_check(config: &Config, file: &Path, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let html = tokio::fs::read_to_string(file).await?;
    let ctx = match date {
        Some(date) => RunContext::for_date(date, config.crawl.target_day_offset),
        None => RunContext::now(config.crawl.target_day_offset),
    };

    let detector = BlockDetector::new(&config.block);
    println!(
        "HTML size: {} chars, card markers: {}",
        html.chars().count(),
        detector.card_count(&html)
    );
    match detector.classify(&html) {
        Some(reason) => println!("{} Blocked: {}", style("✗").red(), reason),
        None => println!("{} Not blocked", style("✓").green()),
    }

    let extractor = ListingExtractor::new(&config.site, &config.filter)?;
    let page = extractor.extract(&html, &ctx);
    println!(
        "Target day {} (\"{}\"): present {}, {} of {} cards accepted",
        ctx.target_day,
        ctx.day_marker,
        page.found_in_window,
        page.candidates.len(),
        page.cards_seen
    );
    for candidate in page.candidates.values() {
        println!(
            "  {} | {} | {}",
            candidate
                .price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            candidate.title.as_deref().unwrap_or("(untitled)"),
            candidate.link
        );
    }
    Ok(())
}
