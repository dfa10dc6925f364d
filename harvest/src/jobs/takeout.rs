//! Watch history from the newest unprocessed Takeout archive

use super::ensure_data_folder;
use crate::config::Settings;
use anyhow::{Context, Result, ensure};
use harvest_core::{
    ArchiveLayout, ArchiveSource, CsvStore, StateFile, SyncDriver, SyncReport, normalize,
};
use tracing::info;

pub async fn run(settings: &Settings) -> Result<SyncReport> {
    let takeout_dir = &settings.paths.takeout_dir;
    ensure!(
        takeout_dir.is_dir(),
        "Takeout directory {} does not exist",
        takeout_dir.display()
    );
    ensure_data_folder(settings)?;

    let mut driver = SyncDriver::new(
        ArchiveSource::new(takeout_dir, ArchiveLayout::youtube_takeout()),
        StateFile::processed_archives(settings.processed_takeouts()),
        CsvStore::new(settings.history_csv(), normalize::watch_history_schema()),
        normalize::watch_event,
    );

    let report = driver
        .run()
        .await
        .context("Failed to process takeout archive")?;
    if report.is_noop() {
        info!("No new takeout archives to process");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::WatermarkStore;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_archive(settings: &Settings, name: &str, urls: &[(&str, &str)]) {
        std::fs::create_dir_all(&settings.paths.takeout_dir).unwrap();
        let entries: Vec<_> = urls
            .iter()
            .map(|(url, time)| json!({"header": "YouTube", "titleUrl": url, "time": time}))
            .collect();
        let file = std::fs::File::create(settings.paths.takeout_dir.join(name)).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("Takeout/YouTube/history/watch-history.json", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(serde_json::to_vec(&entries).unwrap().as_slice()).unwrap();
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn test_newest_archive_lands_in_history_csv() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), "http://unused");
        write_archive(
            &settings,
            "takeout-20240101.zip",
            &[("https://www.youtube.com/watch?v=a", "t1")],
        );
        write_archive(
            &settings,
            "takeout-20240201.zip",
            &[
                ("https://www.youtube.com/watch?v=b", "t2"),
                ("https://music.youtube.com/watch?v=c", "t3"),
            ],
        );

        let report = run(&settings).await.unwrap();
        assert_eq!(report.normalized, 2);

        let rows = CsvStore::new(settings.history_csv(), normalize::watch_history_schema())
            .read_all()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("source"), Some("music"));

        let processed = StateFile::processed_archives(settings.processed_takeouts())
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(processed.into_iter().collect::<Vec<_>>(), ["takeout-20240201.zip"]);
        // The scratch extraction directory is gone.
        let leftovers = std::fs::read_dir(&settings.paths.takeout_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".temp_extract"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_nothing_to_do_is_success() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), "http://unused");
        std::fs::create_dir_all(&settings.paths.takeout_dir).unwrap();

        assert!(run(&settings).await.unwrap().is_noop());
        assert!(!settings.history_csv().exists());
    }

    #[tokio::test]
    async fn test_missing_takeout_dir_fails() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), "http://unused");
        assert!(run(&settings).await.is_err());
    }
}
