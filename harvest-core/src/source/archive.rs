//! Export-archive source
//!
//! Picks the newest archive in a directory that has not been imported yet, pulls a
//! single JSON member out of it and returns the array entries. Older unprocessed
//! archives are left for later runs.

use super::{Fetched, RecordSource};
use crate::errors::{Result, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Naming rules for archives and the member to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    /// File name prefix, e.g. `takeout-`
    pub prefix: String,
    /// File name suffix, e.g. `.zip`
    pub extension: String,
    /// Suffix of the member path to extract
    pub member_suffix: String,
}

impl ArchiveLayout {
    /// Google Takeout archives carrying YouTube watch history
    pub fn youtube_takeout() -> Self {
        Self {
            prefix: "takeout-".to_string(),
            extension: ".zip".to_string(),
            member_suffix: "watch-history.json".to_string(),
        }
    }

    fn matches(&self, name: &str) -> bool {
        name.len() > self.prefix.len() + self.extension.len()
            && name.starts_with(&self.prefix)
            && name.ends_with(&self.extension)
    }
}

/// Reads records out of the newest unprocessed export archive
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    dir: PathBuf,
    layout: ArchiveLayout,
}

impl ArchiveSource {
    /// Source scanning `dir` for archives named per `layout`
    pub fn new(dir: impl Into<PathBuf>, layout: ArchiveLayout) -> Self {
        Self {
            dir: dir.into(),
            layout,
        }
    }

    /// Directory being scanned
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unprocessed archive names, newest (greatest name) first
    pub fn candidates(&self, seen: &BTreeSet<String>) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            SyncError::MissingData(format!(
                "cannot list archive directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if self.layout.matches(&name) && !seen.contains(&name) {
                names.push(name);
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Extract the designated member of `archive_name` and parse it as a JSON array.
    ///
    /// The member is unpacked into a scratch directory next to the archive which is
    /// removed when this returns, whether or not parsing succeeded.
    pub fn extract_entries(&self, archive_name: &str) -> Result<Vec<Value>> {
        let archive_path = self.dir.join(archive_name);
        let file = File::open(&archive_path).map_err(|e| SyncError::persist(&archive_path, e))?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;

        let member = archive
            .file_names()
            .find(|name| name.ends_with(&self.layout.member_suffix))
            .map(str::to_string)
            .ok_or_else(|| {
                SyncError::MissingData(format!(
                    "could not find {} in {}",
                    self.layout.member_suffix, archive_name
                ))
            })?;
        debug!(archive = archive_name, member = %member, "Extracting archive member");

        let scratch = tempfile::Builder::new()
            .prefix(".temp_extract")
            .tempdir_in(&self.dir)
            .map_err(|e| SyncError::persist(&self.dir, e))?;
        let extracted = scratch.path().join(&self.layout.member_suffix);
        {
            let mut entry = archive.by_name(&member)?;
            let mut out =
                File::create(&extracted).map_err(|e| SyncError::persist(&extracted, e))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| SyncError::persist(&extracted, e))?;
        }

        let reader = BufReader::new(
            File::open(&extracted).map_err(|e| SyncError::persist(&extracted, e))?,
        );
        let parsed: Value = serde_json::from_reader(reader)?;

        if let Err(e) = scratch.close() {
            warn!(dir = %self.dir.display(), "Failed to remove extraction directory: {}", e);
        }

        match parsed {
            Value::Array(entries) => Ok(entries),
            _ => Err(SyncError::MissingData(format!(
                "{member} in {archive_name} is not a JSON array"
            ))),
        }
    }
}

#[async_trait]
impl RecordSource for ArchiveSource {
    type Raw = Value;
    type Cursor = BTreeSet<String>;

    fn name(&self) -> &str {
        "archive"
    }

    async fn fetch(
        &mut self,
        since: Option<&Self::Cursor>,
    ) -> Result<Fetched<Value, Self::Cursor>> {
        let seen = since.cloned().unwrap_or_default();
        let candidates = self.candidates(&seen)?;

        let Some(latest) = candidates.first().cloned() else {
            info!(dir = %self.dir.display(), "No new archives to process");
            return Ok(Fetched::empty());
        };
        if candidates.len() > 1 {
            info!(
                "{} older unprocessed archives left for later runs",
                candidates.len() - 1
            );
        }

        info!("Processing latest archive: {}", latest);
        let records = self.extract_entries(&latest)?;

        let mut next = seen;
        next.insert(latest);
        Ok(Fetched {
            records,
            next: Some(next),
        })
    }
}
