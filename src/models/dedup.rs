//! Persisted fingerprint records used for re-listing detection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A fingerprint seen by some earlier (or the current) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub fingerprint: String,
    /// Canonical link of the ad that first produced this fingerprint.
    pub link: String,
    pub title: Option<String>,
    /// Run date on which the fingerprint was first stored.
    pub first_seen: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl DedupRecord {
    pub fn new(
        fingerprint: String,
        link: String,
        title: Option<String>,
        first_seen: NaiveDate,
    ) -> Self {
        Self {
            fingerprint,
            link,
            title,
            first_seen,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of checking one enriched ad against the dedup store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupVerdict {
    /// No fingerprint could be computed (empty source text).
    Unkeyed,
    /// Fingerprint was new and has been stored.
    New,
    /// Fingerprint already stored on the current run date.
    SeenToday,
    /// Fingerprint already handled earlier in this run.
    RepeatInRun,
    /// Fingerprint first stored on an earlier date.
    ProbableDuplicate { original_link: String, first_seen: NaiveDate },
}
