//! The page loop.
//!
//! ```text
//! START -> FETCH_LIST -> BLOCKED -> ABORT
//!                     -> PARSE -> ENRICH -> CHECK_TERMINATION -> FETCH_LIST (next page) | DONE
//! ```
//!
//! One navigation is in flight at a time. Every navigation is preceded by a
//! randomized pause.

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use super::{BlockPolicy, CrawlState, Pacer, Pause, RunContext};
use crate::config::{Config, SearchConfig};
use crate::extract::{
    BlockDetector, BlockReason, DetailEnricher, ExtractError, ListingExtractor,
};
use crate::fetcher::{FetchError, Fetcher};
use crate::models::{AdCandidate, AdDetail, DedupRecord, DedupVerdict};
use crate::repository::{DedupError, DedupStore};

/// Fatal crawl failures. Anything accumulated so far is discarded.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Invalid search URL for page {page}: {source}")]
    InvalidUrl {
        page: u32,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error("Listing page {page} blocked ({reason}): {url}")]
    Blocked {
        page: u32,
        url: String,
        reason: BlockReason,
    },
    #[error("Dedup store failed: {0}")]
    Store(#[from] DedupError),
}

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last page produced no candidates.
    NoCandidates,
    /// The last page had no card on the target day.
    OutOfWindow,
    /// The configured page limit was reached.
    MaxPages,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCandidates => write!(f, "no candidates"),
            Self::OutOfWindow => write!(f, "out of window"),
            Self::MaxPages => write!(f, "page limit"),
        }
    }
}

/// Result of a clean run.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub ads: BTreeMap<String, AdDetail>,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
    pub context: RunContext,
}

/// Drives pagination, enrichment and dedup for a single run.
pub struct CrawlOrchestrator<F, S> {
    search: SearchConfig,
    max_pages: u32,
    block_policy: BlockPolicy,
    detector: BlockDetector,
    listing: ListingExtractor,
    enricher: DetailEnricher,
    pacer: Pacer,
    ctx: RunContext,
    fetcher: F,
    store: S,
}

impl<F: Fetcher, S: DedupStore> CrawlOrchestrator<F, S> {
    /// Build an orchestrator. Fails only on invalid configured selectors.
    pub fn new(config: &Config, ctx: RunContext, fetcher: F, store: S) -> Result<Self, ExtractError> {
        Ok(Self {
            search: config.search.clone(),
            max_pages: config.crawl.max_pages,
            block_policy: config.crawl.block_policy,
            detector: BlockDetector::new(&config.block),
            listing: ListingExtractor::new(&config.site, &config.filter)?,
            enricher: DetailEnricher::new(&config.site, config.crawl.fingerprint_source)?,
            pacer: Pacer::new(config.pacing.clone()),
            ctx,
            fetcher,
            store,
        })
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Release the fetcher's resources.
    pub async fn shutdown(&mut self) {
        self.fetcher.close().await;
    }

    /// Crawl until a termination condition holds. A zero page limit still visits page 1.
    pub async fn run(&mut self) -> Result<CrawlOutcome, CrawlError> {
        info!(
            "Collecting ads for {} (marker \"{}\"), up to {} pages",
            self.ctx.target_day, self.ctx.day_marker, self.max_pages
        );

        let mut state = CrawlState::new();

        let stop_reason = loop {
            let page = state.page();
            let url = self
                .search
                .page_url(page)
                .map_err(|source| CrawlError::InvalidUrl { page, source })?;

            self.pacer.pause(Pause::BeforeListing).await;
            let html = self.fetch_listing(page, &url).await?;
            let listing = self.listing.extract(&html, &self.ctx);
            info!(
                "Page {}: {} cards, {} candidates, target day present: {}",
                page,
                listing.cards_seen,
                listing.candidates.len(),
                listing.found_in_window
            );
            state.record_page(!listing.is_empty(), listing.found_in_window);

            for (link, candidate) in listing.candidates {
                if state.contains(&link) {
                    debug!("Already collected: {}", link);
                    continue;
                }
                let detail = self.process_candidate(&mut state, candidate).await?;
                state.insert(detail);
            }

            if !state.in_window {
                break StopReason::OutOfWindow;
            }
            if !state.any_candidates {
                break StopReason::NoCandidates;
            }
            if page >= self.max_pages {
                break StopReason::MaxPages;
            }

            self.pacer.pause(Pause::BetweenPages).await;
            state.advance();
        };

        let pages_visited = state.page();
        if state.is_empty() {
            warn!("No ads collected for {}", self.ctx.target_day);
        }
        info!(
            "Crawl finished after {} page(s) ({}): {} ads",
            pages_visited,
            stop_reason,
            state.len()
        );

        Ok(CrawlOutcome {
            ads: state.into_ads(),
            pages_visited,
            stop_reason,
            context: self.ctx.clone(),
        })
    }

    /// Fetch a listing page and apply the block policy.
    async fn fetch_listing(&mut self, page: u32, url: &str) -> Result<String, CrawlError> {
        let mut attempt = 0;
        loop {
            let html = self.fetcher.open(url).await?;
            let verdict = self.detector.classify(&html);
            info!(
                "Page {} HTML size: {} chars, card markers: {}, blocked: {}",
                page,
                html.chars().count(),
                self.detector.card_count(&html),
                verdict.is_some()
            );

            let Some(reason) = verdict else {
                return Ok(html);
            };

            attempt += 1;
            match self.block_policy.retry_delay(attempt) {
                Some(delay) => {
                    warn!(
                        "Page {} looks blocked ({}), retry {} in {}s",
                        page,
                        reason,
                        attempt,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!("Page {} blocked ({}), aborting run", page, reason);
                    return Err(CrawlError::Blocked {
                        page,
                        url: url.to_string(),
                        reason,
                    });
                }
            }
        }
    }

    /// Fetch, enrich and dedup-check one new candidate.
    async fn process_candidate(
        &mut self,
        state: &mut CrawlState,
        candidate: AdCandidate,
    ) -> Result<AdDetail, CrawlError> {
        self.pacer.pause(Pause::BeforeDetail).await;
        let link = candidate.link.clone();
        let html = self.fetcher.open(&link).await?;

        let mut detail = self.enricher.enrich(candidate, &html);
        let verdict = self.check_duplicate(state, &mut detail).await?;
        match verdict {
            DedupVerdict::ProbableDuplicate {
                ref original_link,
                first_seen,
            } => info!(
                "Probable re-listing: {} (first seen {} as {})",
                link, first_seen, original_link
            ),
            ref other => debug!("Dedup verdict for {}: {:?}", link, other),
        }
        Ok(detail)
    }

    /// Apply the dedup policy and mark probable duplicates on `detail`.
    async fn check_duplicate(
        &self,
        state: &mut CrawlState,
        detail: &mut AdDetail,
    ) -> Result<DedupVerdict, CrawlError> {
        let Some(fingerprint) = detail.fingerprint.clone() else {
            return Ok(DedupVerdict::Unkeyed);
        };
        if !state.first_in_run(&fingerprint) {
            return Ok(DedupVerdict::RepeatInRun);
        }

        let verdict = match self.store.lookup(&fingerprint).await? {
            Some(existing) => self.verdict_for(existing),
            None => {
                let record = DedupRecord::new(
                    fingerprint.clone(),
                    detail.link().to_string(),
                    detail.candidate.title.clone(),
                    self.ctx.run_date,
                );
                if self.store.upsert(&record).await? {
                    DedupVerdict::New
                } else {
                    // Another process stored it between lookup and upsert.
                    match self.store.lookup(&fingerprint).await? {
                        Some(existing) => self.verdict_for(existing),
                        None => DedupVerdict::SeenToday,
                    }
                }
            }
        };

        if let DedupVerdict::ProbableDuplicate {
            ref original_link, ..
        } = verdict
        {
            detail.duplicate_of = Some(original_link.clone());
        }
        Ok(verdict)
    }

    fn verdict_for(&self, existing: DedupRecord) -> DedupVerdict {
        if existing.first_seen != self.ctx.run_date {
            DedupVerdict::ProbableDuplicate {
                original_link: existing.link,
                first_seen: existing.first_seen,
            }
        } else {
            DedupVerdict::SeenToday
        }
    }
}
