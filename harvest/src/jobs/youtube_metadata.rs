//! Video metadata for every id in the watch history

use super::ensure_data_folder;
use crate::clients::YouTubeClient;
use crate::config::Settings;
use anyhow::{Context, Result, ensure};
use harvest_core::{
    BatchLookupSource, CsvStore, KeyCandidates, Record, StateFile, SyncDriver, SyncError,
    SyncReport, normalize,
};
use std::collections::BTreeSet;
use tracing::info;

/// Non-empty `videoId` values of the watch-history export
fn watched_video_ids(settings: &Settings) -> Result<BTreeSet<String>> {
    let history = CsvStore::new(settings.history_csv(), normalize::watch_history_schema());
    if !history.exists() {
        return Err(SyncError::MissingData(format!(
            "watch history {} not found; run `harvest takeout` first",
            history.path().display()
        ))
        .into());
    }
    Ok(history
        .read_all()?
        .iter()
        .map(|r| r.get_or_empty("videoId").to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

pub async fn run(settings: &Settings, client: YouTubeClient) -> Result<SyncReport> {
    ensure!(
        !settings.youtube.api_key.trim().is_empty(),
        "YouTube API key is not configured; set GOOGLE_API_KEY"
    );
    ensure_data_folder(settings)?;

    let wanted = watched_video_ids(settings)?;
    let store = CsvStore::new(settings.metadata_csv(), normalize::video_metadata_schema());
    let stored = store.keys()?;
    info!(watched = wanted.len(), stored = stored.len(), "Collected video ids");

    let source = BatchLookupSource::new(client, "videoId", settings.youtube.batch_size)?
        .with_pause(settings.youtube.pause())
        .with_candidates(KeyCandidates { wanted, stored });

    let mut driver = SyncDriver::new(
        source,
        StateFile::metadata_cache(&settings.paths.metadata_cache),
        store,
        |record: &Record| Some(record.clone()),
    );
    driver.run().await.context("Metadata update failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_youtube, serve};
    use harvest_core::WatermarkStore;
    use tempfile::TempDir;

    fn write_history(settings: &Settings, ids: &[&str]) {
        std::fs::create_dir_all(&settings.paths.data_folder).unwrap();
        let records = ids.iter().enumerate().map(|(i, id)| {
            Record::new()
                .with("time", format!("2024-01-0{}T00:00:00Z", i + 1))
                .with("videoId", *id)
                .with("source", "youtube")
        });
        CsvStore::new(settings.history_csv(), normalize::watch_history_schema())
            .merge_and_write(records)
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetches_new_ids_and_skips_failed_batch() {
        let base = serve(fake_youtube()).await;
        let dir = TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), &base);
        // Batch size 2 over sorted ids: [a, b], [boom, c]; the second batch fails.
        write_history(&settings, &["a", "b", "boom", "c", "a"]);

        let client = YouTubeClient::new(reqwest::Client::new(), &settings.youtube);
        let report = run(&settings, client.clone()).await.unwrap();
        assert_eq!(report.normalized, 2);

        let cache = StateFile::metadata_cache(&settings.paths.metadata_cache)
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(cache.keys().collect::<Vec<_>>(), ["a", "b"]);

        let rows = CsvStore::new(settings.metadata_csv(), normalize::video_metadata_schema())
            .read_all()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("duration"), Some("PT3M2S"));
    }

    #[tokio::test]
    async fn test_missing_history_is_an_error() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), "http://127.0.0.1:9");
        let client = YouTubeClient::new(reqwest::Client::new(), &settings.youtube);

        let err = run(&settings, client).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::MissingData(_))
        ));
    }
}
