//! In-memory dedup store for tests and throwaway runs.
//!
//! State is not persisted across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DedupResult, DedupStore};
use crate::models::DedupRecord;

#[derive(Debug, Clone, Default)]
pub struct InMemoryDedupStore {
    records: Arc<RwLock<HashMap<String, DedupRecord>>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with existing records.
    pub fn with_records(records: impl IntoIterator<Item = DedupRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.fingerprint.clone(), r))
            .collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn lookup(&self, fingerprint: &str) -> DedupResult<Option<DedupRecord>> {
        Ok(self.records.read().await.get(fingerprint).cloned())
    }

    async fn upsert(&self, record: &DedupRecord) -> DedupResult<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.fingerprint) {
            return Ok(false);
        }
        records.insert(record.fingerprint.clone(), record.clone());
        Ok(true)
    }
}
