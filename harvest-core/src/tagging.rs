//! Vocabulary tag matching
//!
//! Tags applied automatically carry the [`AUTO_TAG_SENTINEL`] prefix so a later
//! cleanup pass can remove exactly those. A user tag that happens to start with the
//! sentinel is indistinguishable and will be removed by cleanup as well.

use crate::errors::{Result, SyncError};
use csv::ReaderBuilder;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Prefix marking automatically applied tags
pub const AUTO_TAG_SENTINEL: char = '*';

/// Prefix `tag` with the automation sentinel
pub fn mark_automated(tag: &str) -> String {
    format!("{AUTO_TAG_SENTINEL}{tag}")
}

/// True for tags written by the tagging pass
pub fn is_automated(tag: &str) -> bool {
    tag.starts_with(AUTO_TAG_SENTINEL)
}

/// Tags that survive cleanup, in their original order
pub fn strip_automated<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter(|t| !is_automated(t.as_ref()))
        .map(|t| t.as_ref().to_string())
        .collect()
}

/// Load a tag vocabulary from a CSV file with a `tag` column.
///
/// Values are lowercased and trimmed; blank values are ignored.
pub fn load_vocabulary(path: &Path) -> Result<BTreeSet<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| SyncError::MissingData(format!("cannot read {}: {e}", path.display())))?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == "tag")
        .ok_or_else(|| {
            SyncError::MissingData(format!("{} has no 'tag' column", path.display()))
        })?;

    let mut tags = BTreeSet::new();
    for row in reader.records() {
        let row = row?;
        if let Some(tag) = row.get(column).map(|t| t.trim().to_lowercase())
            && !tag.is_empty()
        {
            debug!(tag = %tag, "Loaded tag");
            tags.insert(tag);
        }
    }
    Ok(tags)
}

/// Whole-word, case-insensitive matcher over a fixed vocabulary
#[derive(Debug, Clone)]
pub struct TagMatcher {
    patterns: Vec<(String, Regex)>,
}

impl TagMatcher {
    /// Compile one word-boundary pattern per tag
    pub fn new<I, S>(vocabulary: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for tag in vocabulary {
            let tag = tag.as_ref().trim().to_lowercase();
            if tag.is_empty() {
                continue;
            }
            let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&tag)))
                .case_insensitive(true)
                .build()?;
            patterns.push((tag, pattern));
        }
        Ok(Self { patterns })
    }

    /// Number of tags in the vocabulary
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Sentinel-marked tags whose word occurs in `text`
    pub fn matching_tags(&self, text: &str) -> BTreeSet<String> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(tag, _)| mark_automated(tag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_word_boundaries() {
        let matcher = TagMatcher::new(["cat"]).unwrap();
        assert!(matcher.matching_tags("cats are great").is_empty());
        assert_eq!(
            matcher.matching_tags("the cat sat"),
            BTreeSet::from(["*cat".to_string()])
        );
    }

    #[test]
    fn test_case_insensitive_and_multiword() {
        let matcher = TagMatcher::new(["Machine Learning", "rust", "c++"]).unwrap();
        let tags = matcher.matching_tags("Notes on MACHINE LEARNING in Rust.");
        assert_eq!(
            tags,
            BTreeSet::from(["*machine learning".to_string(), "*rust".to_string()])
        );
    }

    #[test]
    fn test_regex_metacharacters_are_escaped() {
        let matcher = TagMatcher::new(["a.b"]).unwrap();
        assert!(matcher.matching_tags("axb").is_empty());
        assert_eq!(matcher.matching_tags("see a.b here").len(), 1);
    }

    #[test]
    fn test_strip_automated() {
        let kept = strip_automated(["*rust", "reading", "*ai", "later"]);
        assert_eq!(kept, ["reading", "later"]);
    }

    #[test]
    fn test_load_vocabulary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pocket_tags.csv");
        std::fs::write(&path, "\u{feff}tag,notes\n  Rust ,x\nAI,\n,\nrust,dup\n").unwrap();

        let tags = load_vocabulary(&path).unwrap();
        assert_eq!(tags, BTreeSet::from(["ai".to_string(), "rust".to_string()]));
    }

    #[test]
    fn test_missing_tag_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tags.csv");
        std::fs::write(&path, "name\nrust\n").unwrap();
        assert!(matches!(
            load_vocabulary(&path).unwrap_err(),
            SyncError::MissingData(_)
        ));
    }
}
