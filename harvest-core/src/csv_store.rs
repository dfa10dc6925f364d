//! Keyed CSV store
//!
//! A CSV file is treated as a table with one row per key. New records are merged by
//! key (insert or replace, last write wins) and the whole table is rewritten through
//! [`write_atomic`]. Existing rows keep their file order; new keys are appended in
//! arrival order.

use crate::errors::{Result, SyncError};
use crate::state::write_atomic;
use crate::types::{Record, Schema};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BOM: char = '\u{feff}';

/// Outcome of a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Keys that were not in the file before
    pub inserted: usize,
    /// Keys whose row was replaced
    pub updated: usize,
    /// Rows in the file after the write
    pub total: usize,
}

/// CSV file keyed by the schema's key column
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    schema: Schema,
}

/// Rows indexed by key, remembering first-seen order
#[derive(Default)]
struct KeyedRows {
    order: Vec<String>,
    rows: HashMap<String, Record>,
}

impl KeyedRows {
    /// Returns true when the key already existed
    fn upsert(&mut self, key: String, record: Record) -> bool {
        if self.rows.insert(key.clone(), record).is_some() {
            true
        } else {
            self.order.push(key);
            false
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|k| self.rows.get(k))
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

impl CsvStore {
    /// Store at `path` using `schema`
    pub fn new(path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Output layout
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether the file exists yet
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read every row in file order. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<Record>> {
        let mut reader = match ReaderBuilder::new().has_headers(true).from_path(&self.path) {
            Ok(reader) => reader,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind()
                    && io.kind() == ErrorKind::NotFound
                {
                    return Ok(Vec::new());
                }
                return Err(e.into());
            },
        };

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches(BOM).to_string())
            .collect();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(Record::from_pairs(
                headers.iter().cloned().zip(row.iter().map(str::to_string)),
            ));
        }
        Ok(records)
    }

    /// Set of keys currently stored
    pub fn keys(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .load_keyed()?
            .order
            .into_iter()
            .collect())
    }

    fn load_keyed(&self) -> Result<KeyedRows> {
        let records = self.read_all()?;
        let mut keyed = KeyedRows::default();
        let Some(first) = records.first() else {
            return Ok(keyed);
        };
        if first.get(self.schema.key()).is_none() {
            return Err(SyncError::invalid_state(
                &self.path,
                format!("missing key column '{}'", self.schema.key()),
            ));
        }

        for (index, record) in records.into_iter().enumerate() {
            let Some(key) = self.schema.key_of(&record).map(str::to_string) else {
                return Err(SyncError::invalid_state(
                    &self.path,
                    format!("empty '{}' in row {}", self.schema.key(), index + 1),
                ));
            };
            keyed.upsert(key, record);
        }
        Ok(keyed)
    }

    /// Merge `records` into the file by key and rewrite it atomically.
    ///
    /// Records without a key value are skipped. The file is written even when no
    /// records are given, so the header exists after the first run.
    pub fn merge_and_write<I>(&self, records: I) -> Result<MergeReport>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut keyed = self.load_keyed()?;
        let mut report = MergeReport::default();

        for record in records {
            let Some(key) = self.schema.key_of(&record).map(str::to_string) else {
                warn!(key = self.schema.key(), "Dropping record without a key value");
                continue;
            };
            if keyed.upsert(key, record) {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }
        report.total = keyed.len();

        write_atomic(&self.path, |file| {
            let mut writer = WriterBuilder::new()
                .quote_style(QuoteStyle::Always)
                .from_writer(&mut *file);
            writer.write_record(self.schema.columns())?;
            for record in keyed.iter() {
                writer.write_record(self.schema.row(record))?;
            }
            writer
                .flush()
                .map_err(|e| SyncError::persist(&self.path, e))
        })?;

        debug!(
            path = %self.path.display(),
            inserted = report.inserted,
            updated = report.updated,
            "Merged records"
        );
        info!("Wrote {} rows to {}", report.total, self.path.display());
        Ok(report)
    }
}
