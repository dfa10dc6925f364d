//! Record sources
//!
//! A source turns an optional watermark into a batch of raw records plus the
//! watermark to store once that batch has been written. Three variants exist:
//!
//! - [`ArchiveSource`]: newest unprocessed export archive in a directory
//! - [`PaginatedSource`]: offset-paginated REST listing since a timestamp
//! - [`BatchLookupSource`]: keyed lookups in fixed-size batches behind a local cache

use crate::errors::Result;
use async_trait::async_trait;

mod archive;
mod batch;
mod paginated;

pub use archive::{ArchiveLayout, ArchiveSource};
pub use batch::{BatchFetcher, BatchLookupSource, KeyCandidates};
pub use paginated::{PageFetcher, PaginatedSource};

/// Records produced by one fetch together with the watermark they advance to
#[derive(Debug, Clone)]
pub struct Fetched<R, C> {
    /// Raw records, in source order
    pub records: Vec<R>,
    /// Watermark to persist after the records are merged; `None` leaves it untouched
    pub next: Option<C>,
}

impl<R, C> Fetched<R, C> {
    /// Nothing new since the last run
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            next: None,
        }
    }

    /// True when there is neither data nor a watermark to store
    pub fn is_nothing(&self) -> bool {
        self.records.is_empty() && self.next.is_none()
    }
}

/// Produces raw records newer than a watermark
#[async_trait]
pub trait RecordSource: Send {
    /// Raw record shape before normalization
    type Raw: Send;
    /// Watermark type consumed and produced by this source
    type Cursor: Send + Sync;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch everything after `since` (everything when `None`)
    async fn fetch(
        &mut self,
        since: Option<&Self::Cursor>,
    ) -> Result<Fetched<Self::Raw, Self::Cursor>>;
}
