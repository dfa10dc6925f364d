//! Offset-paginated REST source

use super::{Fetched, RecordSource};
use crate::errors::{Result, SyncError};
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// One page request against a remote listing
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Item type returned by the listing
    type Item: Send;

    /// Fetch up to `count` items starting at `offset`, changed after `since`
    async fn fetch_page(
        &self,
        since: Option<i64>,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Self::Item>>;
}

/// Walks a paginated listing until a short page signals the end of data
pub struct PaginatedSource<F> {
    fetcher: F,
    page_size: usize,
    clock: fn() -> i64,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl<F: PageFetcher> PaginatedSource<F> {
    /// Create a source requesting `page_size` items per call
    pub fn new(fetcher: F, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(SyncError::ConfigError(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            fetcher,
            page_size,
            clock: unix_now,
        })
    }

    /// Replace the clock used to stamp the next watermark
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying page fetcher
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch every page after `since`, including the final short page.
    ///
    /// The first failing page aborts the whole walk.
    pub async fn fetch_all(&self, since: Option<i64>) -> Result<Vec<F::Item>> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .fetcher
                .fetch_page(since, offset, self.page_size)
                .await?;
            let len = page.len();
            all.extend(page);
            offset += len;

            if len < self.page_size {
                break;
            }
            debug!("Fetched {} items (total so far: {})", len, all.len());
        }

        Ok(all)
    }
}

#[async_trait]
impl<F: PageFetcher> RecordSource for PaginatedSource<F> {
    type Raw = F::Item;
    type Cursor = i64;

    fn name(&self) -> &str {
        "paginated"
    }

    async fn fetch(&mut self, since: Option<&i64>) -> Result<Fetched<F::Item, i64>> {
        let started = (self.clock)();
        let records = self.fetch_all(since.copied()).await?;
        info!("Fetched a total of {} items", records.len());

        let next = (!records.is_empty()).then_some(started);
        Ok(Fetched { records, next })
    }
}
