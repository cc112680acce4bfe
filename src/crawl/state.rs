//! Per-run accumulator.

use std::collections::{BTreeMap, HashSet};

use crate::models::AdDetail;

/// Everything a run has collected so far. Created at run start, consumed by reporting.
#[derive(Debug, Default)]
pub struct CrawlState {
    ads: BTreeMap<String, AdDetail>,
    fingerprints: HashSet<String>,
    page: u32,
    /// Whether the most recent page produced any candidates.
    pub any_candidates: bool,
    /// Whether the most recent page had any card on the target day.
    pub in_window: bool,
}

impl CrawlState {
    /// Fresh state positioned on page 1.
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Default::default()
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn advance(&mut self) {
        self.page += 1;
    }

    pub fn contains(&self, link: &str) -> bool {
        self.ads.contains_key(link)
    }

    /// Record a fingerprint; returns false if this run already saw it.
    pub fn first_in_run(&mut self, fingerprint: &str) -> bool {
        self.fingerprints.insert(fingerprint.to_string())
    }

    /// Insert an enriched ad. A link already present is left untouched.
    pub fn insert(&mut self, detail: AdDetail) -> bool {
        if self.contains(detail.link()) {
            return false;
        }
        self.ads.insert(detail.link().to_string(), detail);
        true
    }

    pub fn record_page(&mut self, any_candidates: bool, in_window: bool) {
        self.any_candidates = any_candidates;
        self.in_window = in_window;
    }

    pub fn len(&self) -> usize {
        self.ads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }

    pub fn into_ads(self) -> BTreeMap<String, AdDetail> {
        self.ads
    }
}
