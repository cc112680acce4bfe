//! Dedup record persistence.
//!
//! The store is the only state shared between runs (and between concurrent
//! processes), so `upsert` must be atomic insert-if-absent.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryDedupStore;
pub use sqlite::SqliteDedupStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::DedupRecord;

/// Result type for dedup store operations.
pub type DedupResult<T> = Result<T, DedupError>;

/// Errors from dedup store backends.
#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for DedupError {
    fn from(e: rusqlite::Error) -> Self {
        DedupError::Database(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DedupError {
    fn from(e: tokio::task::JoinError) -> Self {
        DedupError::Task(e.to_string())
    }
}

/// Insert-if-absent store keyed by fingerprint.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn lookup(&self, fingerprint: &str) -> DedupResult<Option<DedupRecord>>;

    /// Insert `record` unless its fingerprint exists. Returns whether it was inserted.
    /// Never modifies an existing record.
    async fn upsert(&self, record: &DedupRecord) -> DedupResult<bool>;
}

#[async_trait]
impl<S: DedupStore + ?Sized> DedupStore for Box<S> {
    async fn lookup(&self, fingerprint: &str) -> DedupResult<Option<DedupRecord>> {
        (**self).lookup(fingerprint).await
    }

    async fn upsert(&self, record: &DedupRecord) -> DedupResult<bool> {
        (**self).upsert(record).await
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
