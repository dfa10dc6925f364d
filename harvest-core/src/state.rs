//! Watermark persistence
//!
//! Every piece of bookkeeping state (last sync timestamp, processed archive names,
//! metadata cache) is stored in a small JSON envelope:
//!
//! ```json
//! {"version": 1, "kind": "timestamp", "value": 1700000000}
//! ```
//!
//! Writes go through [`write_atomic`], so a failed save leaves the previous file intact.

use crate::errors::{Result, SyncError};
use crate::types::Record;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Current envelope version
pub const STATE_VERSION: u32 = 1;

/// Persistent cursor marking what has already been consumed
pub trait WatermarkStore {
    /// Watermark payload
    type Mark;

    /// Load the watermark; `None` means "fetch everything"
    fn load(&self) -> Result<Option<Self::Mark>>;

    /// Replace the stored watermark
    fn save(&self, mark: &Self::Mark) -> Result<()>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    kind: &'a str,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    kind: String,
    value: Value,
}

/// JSON state file holding a single value of type `T`
#[derive(Debug, Clone)]
pub struct StateFile<T> {
    path: PathBuf,
    kind: &'static str,
    _marker: PhantomData<fn() -> T>,
}

/// Last successful sync time, in UNIX seconds
pub type TimestampFile = StateFile<i64>;

/// Names of archives that were already imported
pub type ProcessedArchivesFile = StateFile<BTreeSet<String>>;

/// Previously fetched records keyed by identifier
pub type MetadataCacheFile = StateFile<BTreeMap<String, Record>>;

impl StateFile<i64> {
    /// Timestamp watermark stored at `path`
    pub fn timestamp(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, "timestamp")
    }
}

impl StateFile<BTreeSet<String>> {
    /// Processed-archive set stored at `path`
    pub fn processed_archives(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, "processed_archives")
    }
}

impl StateFile<BTreeMap<String, Record>> {
    /// Metadata cache stored at `path`
    pub fn metadata_cache(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, "metadata_cache")
    }
}

impl<T> StateFile<T> {
    /// State file with an explicit envelope kind
    pub fn with_kind(path: impl Into<PathBuf>, kind: &'static str) -> Self {
        Self {
            path: path.into(),
            kind,
            _marker: PhantomData,
        }
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Envelope kind written and expected by this file
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl<T> WatermarkStore for StateFile<T>
where
    T: Serialize + DeserializeOwned,
{
    type Mark = T;

    fn load(&self) -> Result<Option<T>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::persist(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(raw.trim())
            .map_err(|e| SyncError::invalid_state(&self.path, e.to_string()))?;

        let payload = if is_envelope(&value) {
            let envelope: Envelope = serde_json::from_value(value)
                .map_err(|e| SyncError::invalid_state(&self.path, e.to_string()))?;
            if envelope.version != STATE_VERSION {
                return Err(SyncError::invalid_state(
                    &self.path,
                    format!("unsupported version {}", envelope.version),
                ));
            }
            if envelope.kind != self.kind {
                return Err(SyncError::invalid_state(
                    &self.path,
                    format!("expected kind '{}', found '{}'", self.kind, envelope.kind),
                ));
            }
            envelope.value
        } else {
            // Bare payload written before the envelope existed.
            value
        };

        serde_json::from_value(payload)
            .map(Some)
            .map_err(|e| SyncError::invalid_state(&self.path, e.to_string()))
    }

    fn save(&self, mark: &T) -> Result<()> {
        let envelope = EnvelopeRef {
            version: STATE_VERSION,
            kind: self.kind,
            value: mark,
        };
        write_atomic(&self.path, |file| {
            serde_json::to_writer(&mut *file, &envelope)?;
            file.write_all(b"\n")
                .map_err(|e| SyncError::persist(&self.path, e))
        })?;
        debug!(path = %self.path.display(), kind = self.kind, "Saved state file");
        Ok(())
    }
}

fn is_envelope(value: &Value) -> bool {
    value.as_object().is_some_and(|o| {
        o.len() == 3
            && o.contains_key("version")
            && o.contains_key("kind")
            && o.contains_key("value")
    })
}

/// Write `path` by filling a temporary file in the same directory and renaming it
/// over the destination. Readers never observe a partially written file and a
/// failure at any step leaves the previous contents untouched.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| SyncError::persist(&parent, e))?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| SyncError::persist(&parent, e))?;
    fill(tmp.as_file_mut())?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| SyncError::persist(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| SyncError::persist(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = StateFile::timestamp(dir.path().join("out.csv.timestamp"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_timestamp_roundtrip_uses_envelope() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv.timestamp");
        let store = StateFile::timestamp(&path);
        store.save(&1_700_000_000).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"kind\":\"timestamp\""));
        assert!(raw.contains("\"version\":1"));
        assert_eq!(store.load().unwrap(), Some(1_700_000_000));
    }

    #[test]
    fn test_legacy_plain_timestamp_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.timestamp");
        std::fs::write(&path, "1699999999\n").unwrap();
        assert_eq!(StateFile::timestamp(&path).load().unwrap(), Some(1_699_999_999));
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        StateFile::timestamp(&path).save(&5).unwrap();

        let err = StateFile::processed_archives(&path).load().unwrap_err();
        assert!(matches!(err, SyncError::InvalidState { .. }));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version":9,"kind":"timestamp","value":1}"#).unwrap();
        let err = StateFile::timestamp(&path).load().unwrap_err();
        assert!(err.to_string().contains("unsupported version 9"));
    }

    #[test]
    fn test_processed_set_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = StateFile::processed_archives(dir.path().join("processed.json"));
        let set: BTreeSet<String> = ["takeout-1.zip".to_string()].into();
        store.save(&set).unwrap();
        assert_eq!(store.load().unwrap(), Some(set));
    }

    #[test]
    fn test_failed_write_keeps_previous_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "before").unwrap();

        let result = write_atomic(&path, |file| {
            file.write_all(b"half").unwrap();
            Err(SyncError::MissingData("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "before");
        // Only the original file is left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
