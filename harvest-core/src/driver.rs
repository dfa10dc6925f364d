//! Sync driver
//!
//! One run is: load watermark → fetch → normalize → merge-write → save watermark.
//! The watermark is saved only after the merge has been written, so a failure at
//! any earlier step leaves it untouched and the same data is fetched again next time.

use crate::csv_store::{CsvStore, MergeReport};
use crate::errors::Result;
use crate::source::RecordSource;
use crate::state::WatermarkStore;
use crate::types::Record;
use tracing::{debug, info};

/// Maps a raw source record to an output record; `None` drops it
pub type Normalizer<R> = Box<dyn Fn(&R) -> Option<Record> + Send + Sync>;

/// Summary of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Raw records returned by the source
    pub fetched: usize,
    /// Records that survived normalization
    pub normalized: usize,
    /// Merge outcome, when the store was written
    pub merge: Option<MergeReport>,
    /// Whether a new watermark was saved
    pub watermark_advanced: bool,
}

impl SyncReport {
    /// True when the run found nothing to do
    pub fn is_noop(&self) -> bool {
        self.merge.is_none() && !self.watermark_advanced
    }
}

/// Orchestrates a single incremental sync
pub struct SyncDriver<S: RecordSource, W> {
    source: S,
    watermark: W,
    store: CsvStore,
    normalize: Normalizer<S::Raw>,
}

impl<S, W> SyncDriver<S, W>
where
    S: RecordSource,
    W: WatermarkStore<Mark = S::Cursor>,
{
    /// Wire a source, its watermark store and the output store together
    pub fn new<N>(source: S, watermark: W, store: CsvStore, normalize: N) -> Self
    where
        N: Fn(&S::Raw) -> Option<Record> + Send + Sync + 'static,
    {
        Self {
            source,
            watermark,
            store,
            normalize: Box::new(normalize),
        }
    }

    /// The record source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The output store
    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    /// Run one sync
    pub async fn run(&mut self) -> Result<SyncReport> {
        let since = self.watermark.load()?;
        debug!(source = self.source.name(), resumed = since.is_some(), "Starting sync");

        let fetched = self.source.fetch(since.as_ref()).await?;
        let mut report = SyncReport {
            fetched: fetched.records.len(),
            ..SyncReport::default()
        };
        if fetched.is_nothing() {
            info!("No new {} records to process", self.source.name());
            return Ok(report);
        }

        let records: Vec<Record> = fetched
            .records
            .iter()
            .filter_map(|raw| (self.normalize)(raw))
            .collect();
        report.normalized = records.len();
        if report.normalized < report.fetched {
            debug!(
                dropped = report.fetched - report.normalized,
                "Skipped records without required fields"
            );
        }

        report.merge = Some(self.store.merge_and_write(records)?);

        if let Some(next) = fetched.next {
            self.watermark.save(&next)?;
            report.watermark_advanced = true;
        }

        info!(
            "Successfully processed {} records into {}",
            report.normalized,
            self.store.path().display()
        );
        Ok(report)
    }
}
