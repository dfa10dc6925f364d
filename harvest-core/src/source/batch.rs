//! Batched key lookup behind a persistent cache
//!
//! Keys already present in the cache or in the output store are never requested
//! again. The rest are looked up in batches capped by the remote API; a failing
//! batch is logged and skipped so the remaining batches still land in the cache.

use super::{Fetched, RecordSource};
use crate::errors::{Result, SyncError};
use crate::types::Record;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// One lookup call for a batch of keys
#[async_trait]
pub trait BatchFetcher: Send + Sync {
    /// Look up `keys`; unknown keys are simply absent from the result
    async fn fetch_batch(&self, keys: &[String]) -> Result<Vec<Record>>;
}

/// Keys to look up and keys the output store already holds
#[derive(Debug, Clone, Default)]
pub struct KeyCandidates {
    /// Every key the caller is interested in
    pub wanted: BTreeSet<String>,
    /// Keys already present downstream
    pub stored: BTreeSet<String>,
}

/// Cache-backed batch lookup source; the cursor is the cache itself
pub struct BatchLookupSource<F> {
    fetcher: F,
    key_field: String,
    batch_size: usize,
    pause: Duration,
    candidates: KeyCandidates,
}

impl<F: BatchFetcher> BatchLookupSource<F> {
    /// Look up at most `batch_size` keys per call, keyed by `key_field` in results
    pub fn new(fetcher: F, key_field: impl Into<String>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(SyncError::ConfigError(
                "batch size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            fetcher,
            key_field: key_field.into(),
            batch_size,
            pause: Duration::ZERO,
            candidates: KeyCandidates::default(),
        })
    }

    /// Sleep this long after each successful batch
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Keys considered by the next fetch
    pub fn with_candidates(mut self, candidates: KeyCandidates) -> Self {
        self.candidates = candidates;
        self
    }

    /// Keys not yet known anywhere, in sorted order
    pub fn pending_keys(&self, cache: &BTreeMap<String, Record>) -> Vec<String> {
        self.candidates
            .wanted
            .iter()
            .filter(|k| !k.is_empty())
            .filter(|k| !self.candidates.stored.contains(*k) && !cache.contains_key(*k))
            .cloned()
            .collect()
    }

    /// Look up `keys` batch by batch and merge the results into `cache`.
    /// Returns the number of records received.
    pub async fn lookup_into(
        &self,
        keys: &[String],
        cache: &mut BTreeMap<String, Record>,
    ) -> usize {
        let mut received = 0;
        for (index, batch) in keys.chunks(self.batch_size).enumerate() {
            match self.fetcher.fetch_batch(batch).await {
                Ok(records) => {
                    for record in records {
                        match record.get(&self.key_field) {
                            Some(key) if !key.is_empty() => {
                                cache.insert(key.to_string(), record);
                                received += 1;
                            },
                            _ => warn!(field = %self.key_field, "Lookup result without key"),
                        }
                    }
                    if !self.pause.is_zero() {
                        sleep(self.pause).await;
                    }
                },
                Err(e) => {
                    warn!(batch = index, size = batch.len(), "Error fetching batch: {}", e);
                },
            }
        }
        received
    }
}

#[async_trait]
impl<F: BatchFetcher> RecordSource for BatchLookupSource<F> {
    type Raw = Record;
    type Cursor = BTreeMap<String, Record>;

    fn name(&self) -> &str {
        "batch-lookup"
    }

    async fn fetch(
        &mut self,
        since: Option<&Self::Cursor>,
    ) -> Result<Fetched<Record, Self::Cursor>> {
        let mut cache = since.cloned().unwrap_or_default();
        let pending = self.pending_keys(&cache);
        if pending.is_empty() {
            info!("No new keys to look up");
            return Ok(Fetched::empty());
        }

        info!("Fetching metadata for {} new keys...", pending.len());
        let received = self.lookup_into(&pending, &mut cache).await;
        info!("Received {} of {} requested records", received, pending.len());

        Ok(Fetched {
            records: cache.values().cloned().collect(),
            next: Some(cache),
        })
    }
}
