//! # harvest-core
//!
//! Building blocks for small incremental export jobs that keep a CSV file in sync
//! with an external service.
//!
//! ## Features
//!
//! - **Keyed CSV store**: merge records by key and rewrite the file atomically
//! - **Watermarks**: versioned JSON state files (timestamp, processed set, cache)
//! - **Record sources**: export archives, paginated listings, batched lookups
//! - **Tag matching**: whole-word vocabulary matching with an automation sentinel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use harvest_core::{
//!     ArchiveLayout, ArchiveSource, CsvStore, StateFile, SyncDriver, normalize,
//! };
//!
//! #[tokio::main]
//! async fn main() -> harvest_core::Result<()> {
//!     let source = ArchiveSource::new("/data/takeout", ArchiveLayout::youtube_takeout());
//!     let watermark = StateFile::processed_archives("/data/takeout/processed_takeouts.json");
//!     let store = CsvStore::new("/data/youtube_history.csv", normalize::watch_history_schema());
//!
//!     let mut driver = SyncDriver::new(source, watermark, store, normalize::watch_event);
//!     let report = driver.run().await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Keyed CSV merge-writer
pub mod csv_store;
/// Incremental sync driver
pub mod driver;
mod errors;
/// Output schemas and per-domain normalizers
pub mod normalize;
/// Bounded retry helper
pub mod retry;
/// Record sources
pub mod source;
/// Watermark state files and atomic writes
pub mod state;
/// Vocabulary tag matching
pub mod tagging;
/// Text normalization helpers
pub mod text;
mod types;

pub use csv_store::{CsvStore, MergeReport};
pub use driver::{SyncDriver, SyncReport};
pub use errors::{Result, SyncError};
pub use retry::{RetryConfig, RetryPolicy};
pub use source::{
    ArchiveLayout, ArchiveSource, BatchFetcher, BatchLookupSource, Fetched, KeyCandidates,
    PageFetcher, PaginatedSource, RecordSource,
};
pub use state::{
    MetadataCacheFile, ProcessedArchivesFile, StateFile, TimestampFile, WatermarkStore,
};
pub use tagging::{AUTO_TAG_SENTINEL, TagMatcher};
pub use types::{Record, Schema};
