//! End-to-end crawl runs against scripted pages.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use flatwatch::config::{Config, PacingConfig};
use flatwatch::crawl::DelayRange;
use flatwatch::crawl::{BlockPolicy, CrawlError, CrawlOrchestrator, RunContext, StopReason};
use flatwatch::extract::{fingerprint, BlockReason};
use flatwatch::fetcher::{FetchError, Fetcher};
use flatwatch::models::DedupRecord;
use flatwatch::repository::{DedupResult, DedupStore, InMemoryDedupStore};

const TARGET: &str = "15 жовтня 2025 р.";
const OLDER: &str = "14 жовтня 2025 р.";

/// Serves queued responses per URL and records every navigation.
#[derive(Clone, Default)]
struct ScriptedFetcher {
    pages: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
    visited: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    fn serve(&self, url: &str, html: String) {
        self.pages
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(html);
    }

    fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn open(&mut self, url: &str) -> Result<String, FetchError> {
        self.visited.lock().unwrap().push(url.to_string());
        let mut pages = self.pages.lock().unwrap();
        let queue = pages.get_mut(url).ok_or_else(|| FetchError::Navigation {
            url: url.to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })?;
        // The last queued response keeps being served.
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap_or_default())
        } else {
            queue.front().cloned().ok_or_else(|| FetchError::Timeout {
                url: url.to_string(),
                secs: 30,
            })
        }
    }
}

/// A store where another process always wins the insert: the first lookup
/// misses, the upsert reports a conflict, later lookups see `winner`.
#[derive(Clone)]
struct ContendedStore {
    winner: DedupRecord,
    lookups: Arc<Mutex<u32>>,
    upserts: Arc<Mutex<u32>>,
}

impl ContendedStore {
    fn new(winner: DedupRecord) -> Self {
        Self {
            winner,
            lookups: Arc::default(),
            upserts: Arc::default(),
        }
    }
}

#[async_trait]
impl DedupStore for ContendedStore {
    async fn lookup(&self, _fingerprint: &str) -> DedupResult<Option<DedupRecord>> {
        let mut lookups = self.lookups.lock().unwrap();
        *lookups += 1;
        Ok((*lookups > 1).then(|| self.winner.clone()))
    }

    async fn upsert(&self, _record: &DedupRecord) -> DedupResult<bool> {
        *self.upserts.lock().unwrap() += 1;
        Ok(false)
    }
}

struct Card {
    id: &'static str,
    title: &'static str,
    price: &'static str,
    date: &'static str,
}

fn card(id: &'static str, title: &'static str, price: &'static str, date: &'static str) -> Card {
    Card {
        id,
        title,
        price,
        date,
    }
}

fn detail_url(id: &str) -> String {
    format!("https://www.olx.ua/d/uk/obyavlenie/{}.html", id)
}

fn listing_page(cards: &[Card]) -> String {
    let body: String = cards
        .iter()
        .map(|c| {
            format!(
                r#"<div data-cy="l-card">
                    <a href="/d/uk/obyavlenie/{id}.html?reason=observed_ad"><h6>{title}</h6></a>
                    <p data-testid="ad-price">{price}</p>
                    <p data-testid="location-date">Львів, Галицький - {date}</p>
                    <span>42 м²</span>
                </div>"#,
                id = c.id,
                title = c.title,
                price = c.price,
                date = c.date
            )
        })
        .collect();
    // Real listing pages are large; stay well above the block size floor.
    format!(
        "<html><body>{}<div hidden>{}</div></body></html>",
        body,
        "·".repeat(60_000)
    )
}

fn detail_page(title: &str) -> String {
    let ld = serde_json::json!({
        "@type": "Product",
        "name": title,
        "description": format!("{} у тихому районі", title),
        "offers": {"price": 42000, "priceCurrency": "USD"}
    });
    format!(
        r#"<html><head><script type="application/ld+json">{}</script></head>
        <body><div data-testid="ad-parameters-container"><p>Поверх: 4</p></div></body></html>"#,
        ld
    )
}

fn config() -> Config {
    let mut config = Config::default();
    config.pacing = PacingConfig::disabled();
    config
}

fn page_url(config: &Config, page: u32) -> String {
    config.search.page_url(page).unwrap()
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()
}

fn ctx() -> RunContext {
    RunContext::for_date(run_date(), 1)
}

fn serve_details(fetcher: &ScriptedFetcher, cards: &[Card]) {
    for c in cards {
        fetcher.serve(&detail_url(c.id), detail_page(c.title));
    }
}

#[tokio::test]
async fn blocked_first_page_aborts_without_detail_fetches() {
    let config = config();
    let fetcher = ScriptedFetcher::default();
    fetcher.serve(
        &page_url(&config, 1),
        "<html><h1>Please verify you are a human</h1></html>".to_string(),
    );

    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher.clone(), InMemoryDedupStore::new()).unwrap();
    match orchestrator.run().await {
        Err(CrawlError::Blocked { page, reason, .. }) => {
            assert_eq!(page, 1);
            assert!(matches!(reason, BlockReason::TooSmall { .. }));
        }
        other => panic!("expected blocked error, got {:?}", other.map(|o| o.stop_reason)),
    }
    assert_eq!(fetcher.visited().len(), 1);
}

#[tokio::test]
async fn stops_after_page_with_zero_candidates() {
    let config = config();
    let fetcher = ScriptedFetcher::default();
    let first = [
        card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET),
        card("flat-ID2", "Однокімнатна біля парку", "38 500 $", TARGET),
    ];
    // Target day still present, but every card is below the price floor.
    let second = [card("flat-ID3", "Кімната", "9 000 $", TARGET)];
    fetcher.serve(&page_url(&config, 1), listing_page(&first));
    fetcher.serve(&page_url(&config, 2), listing_page(&second));
    fetcher.serve(&page_url(&config, 3), listing_page(&first));
    serve_details(&fetcher, &first);

    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher.clone(), InMemoryDedupStore::new()).unwrap();
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::NoCandidates);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.ads.len(), 2);
    assert!(outcome.ads.contains_key(&detail_url("flat-ID1")));
    assert!(!fetcher.visited().contains(&page_url(&config, 3)));

    let ad = &outcome.ads[&detail_url("flat-ID1")];
    assert_eq!(ad.candidate.price, Some(45000));
    assert_eq!(ad.candidate.area, Some(42.0));
    assert_eq!(ad.parameters.get("Поверх").map(String::as_str), Some("4"));
    assert_eq!(ad.fingerprint, fingerprint("Двокімнатна на Сихові"));
}

#[tokio::test]
async fn stops_when_target_day_is_gone() {
    let config = config();
    let fetcher = ScriptedFetcher::default();
    let first = [card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET)];
    let second = [card("flat-ID9", "Стара квартира", "45 000 $", OLDER)];
    fetcher.serve(&page_url(&config, 1), listing_page(&first));
    fetcher.serve(&page_url(&config, 2), listing_page(&second));
    serve_details(&fetcher, &first);

    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher.clone(), InMemoryDedupStore::new()).unwrap();
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::OutOfWindow);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.ads.len(), 1);
    assert!(!fetcher.visited().contains(&detail_url("flat-ID9")));
}

#[tokio::test]
async fn page_limit_bounds_pagination() {
    let mut config = config();
    config.crawl.max_pages = 2;
    let fetcher = ScriptedFetcher::default();
    let cards = [card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET)];
    let more = [card("flat-ID2", "Однокімнатна біля парку", "38 500 $", TARGET)];
    fetcher.serve(&page_url(&config, 1), listing_page(&cards));
    fetcher.serve(&page_url(&config, 2), listing_page(&more));
    fetcher.serve(&page_url(&config, 3), listing_page(&more));
    serve_details(&fetcher, &cards);
    serve_details(&fetcher, &more);

    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher.clone(), InMemoryDedupStore::new()).unwrap();
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::MaxPages);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.ads.len(), 2);
}

#[tokio::test]
async fn links_seen_on_earlier_pages_are_not_refetched() {
    let mut config = config();
    config.crawl.max_pages = 2;
    let fetcher = ScriptedFetcher::default();
    let cards = [card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET)];
    fetcher.serve(&page_url(&config, 1), listing_page(&cards));
    fetcher.serve(&page_url(&config, 2), listing_page(&cards));
    serve_details(&fetcher, &cards);

    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher.clone(), InMemoryDedupStore::new()).unwrap();
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.ads.len(), 1);
    let detail_visits = fetcher
        .visited()
        .iter()
        .filter(|u| **u == detail_url("flat-ID1"))
        .count();
    assert_eq!(detail_visits, 1);
}

#[tokio::test]
async fn relisted_ads_are_flagged_once() {
    let config = config();
    let fetcher = ScriptedFetcher::default();
    let cards = [
        card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET),
        // Same text under a new link in the same run.
        card("flat-ID2", "ДВОКІМНАТНА  на сихові", "45 000 $", TARGET),
        // Stored earlier today by another run.
        card("flat-ID3", "Однокімнатна біля парку", "38 500 $", TARGET),
        card("flat-ID4", "Трикімнатна в центрі", "49 000 $", TARGET),
    ];
    fetcher.serve(&page_url(&config, 1), listing_page(&cards));
    fetcher.serve(&page_url(&config, 2), listing_page(&[card("flat-ID9", "Стара квартира", "45 000 $", OLDER)]));
    serve_details(&fetcher, &cards);

    let yesterday = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
    let store = InMemoryDedupStore::with_records([
        DedupRecord::new(
            fingerprint("Двокімнатна на Сихові").unwrap(),
            detail_url("flat-ID0"),
            None,
            yesterday,
        ),
        DedupRecord::new(
            fingerprint("Однокімнатна біля парку").unwrap(),
            detail_url("flat-ID3"),
            None,
            run_date(),
        ),
    ]);

    let mut orchestrator = CrawlOrchestrator::new(&config, ctx(), fetcher, store.clone()).unwrap();
    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome.ads.len(), 4);

    let flagged: Vec<&str> = outcome
        .ads
        .values()
        .filter(|ad| ad.is_probable_duplicate())
        .map(|ad| ad.link())
        .collect();
    assert_eq!(flagged, vec![detail_url("flat-ID1").as_str()]);
    assert_eq!(
        outcome.ads[&detail_url("flat-ID1")].duplicate_of,
        Some(detail_url("flat-ID0"))
    );

    // Only the genuinely new fingerprint was stored.
    assert_eq!(store.len().await, 3);
    let stored = store
        .lookup(&fingerprint("Трикімнатна в центрі").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.first_seen, run_date());
    assert_eq!(stored.link, detail_url("flat-ID4"));
}

#[tokio::test]
async fn retry_policy_recovers_from_transient_block() {
    let mut config = config();
    config.crawl.block_policy = BlockPolicy::Retry {
        attempts: 1,
        backoff_secs: 0,
    };
    let fetcher = ScriptedFetcher::default();
    let cards = [card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET)];
    fetcher.serve(&page_url(&config, 1), "<html>Access denied</html>".to_string());
    fetcher.serve(&page_url(&config, 1), listing_page(&cards));
    fetcher.serve(&page_url(&config, 2), listing_page(&[card("flat-ID9", "Стара квартира", "45 000 $", OLDER)]));
    serve_details(&fetcher, &cards);

    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher.clone(), InMemoryDedupStore::new()).unwrap();
    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome.ads.len(), 1);
}

#[tokio::test]
async fn detail_navigation_failure_is_fatal() {
    let config = config();
    let fetcher = ScriptedFetcher::default();
    let cards = [card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET)];
    fetcher.serve(&page_url(&config, 1), listing_page(&cards));

    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher, InMemoryDedupStore::new()).unwrap();
    assert!(matches!(
        orchestrator.run().await,
        Err(CrawlError::Network(FetchError::Navigation { .. }))
    ));
}

async fn run_against_contended_store(first_seen: NaiveDate) -> (Option<String>, u32, u32) {
    let config = config();
    let fetcher = ScriptedFetcher::default();
    let cards = [card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET)];
    fetcher.serve(&page_url(&config, 1), listing_page(&cards));
    fetcher.serve(
        &page_url(&config, 2),
        listing_page(&[card("flat-ID9", "Стара квартира", "45 000 $", OLDER)]),
    );
    serve_details(&fetcher, &cards);

    let store = ContendedStore::new(DedupRecord::new(
        fingerprint("Двокімнатна на Сихові").unwrap(),
        detail_url("flat-ID0"),
        None,
        first_seen,
    ));
    let mut orchestrator = CrawlOrchestrator::new(&config, ctx(), fetcher, store.clone()).unwrap();
    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome.ads.len(), 1);

    let duplicate_of = outcome.ads[&detail_url("flat-ID1")].duplicate_of.clone();
    let lookups = *store.lookups.lock().unwrap();
    let upserts = *store.upserts.lock().unwrap();
    (duplicate_of, lookups, upserts)
}

#[tokio::test]
async fn lost_insert_race_still_flags_older_record() {
    let yesterday = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
    let (duplicate_of, lookups, upserts) = run_against_contended_store(yesterday).await;
    assert_eq!(duplicate_of, Some(detail_url("flat-ID0")));
    assert_eq!(lookups, 2);
    assert_eq!(upserts, 1);
}

#[tokio::test]
async fn lost_insert_race_against_same_day_record_is_not_flagged() {
    let (duplicate_of, lookups, upserts) = run_against_contended_store(run_date()).await;
    assert_eq!(duplicate_of, None);
    assert_eq!(lookups, 2);
    assert_eq!(upserts, 1);
}

#[tokio::test]
async fn every_listing_page_is_preceded_by_a_pause() {
    let mut config = config();
    config.crawl.max_pages = 2;
    config.pacing.before_listing = DelayRange::secs(1, 1);
    let fetcher = ScriptedFetcher::default();
    let cards = [card("flat-ID1", "Двокімнатна на Сихові", "45 000 $", TARGET)];
    fetcher.serve(&page_url(&config, 1), listing_page(&cards));
    fetcher.serve(&page_url(&config, 2), listing_page(&cards));
    serve_details(&fetcher, &cards);

    let started = std::time::Instant::now();
    let mut orchestrator =
        CrawlOrchestrator::new(&config, ctx(), fetcher.clone(), InMemoryDedupStore::new()).unwrap();
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.pages_visited, 2);
    assert!(started.elapsed() >= std::time::Duration::from_secs(2));
}
