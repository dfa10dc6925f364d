//! Incremental bookmark export keyed by item id

use super::{ensure_data_folder, require_pocket_credentials};
use crate::clients::{PocketClient, PocketPager};
use crate::config::Settings;
use anyhow::{Context, Result};
use chrono::DateTime;
use harvest_core::{
    CsvStore, PaginatedSource, StateFile, SyncDriver, SyncReport, WatermarkStore, normalize,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// `<csv>.timestamp` next to the export
pub fn timestamp_path(csv_path: &Path) -> PathBuf {
    let mut name = OsString::from(csv_path.as_os_str());
    name.push(".timestamp");
    PathBuf::from(name)
}

fn describe_since(since: Option<i64>) -> String {
    match since.and_then(|s| DateTime::from_timestamp(s, 0)) {
        Some(at) => format!("changes since {}", at.to_rfc3339()),
        None => "full history".to_string(),
    }
}

pub async fn run(settings: &Settings, client: PocketClient) -> Result<SyncReport> {
    require_pocket_credentials(settings)?;
    ensure_data_folder(settings)?;

    let csv_path = settings.bookmarks_csv();
    let watermark = StateFile::timestamp(timestamp_path(&csv_path));
    info!("Exporting Pocket items: {}", describe_since(watermark.load()?));

    let source = PaginatedSource::new(PocketPager::new(client), settings.pocket.page_size)?;
    let mut driver = SyncDriver::new(
        source,
        watermark,
        CsvStore::new(&csv_path, normalize::bookmark_schema()),
        normalize::bookmark,
    );

    let report = driver.run().await.context("Pocket export failed")?;
    if let Some(merge) = &report.merge {
        info!(
            inserted = merge.inserted,
            updated = merge.updated,
            total = merge.total,
            "Updated {}",
            csv_path.display()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePocket, serve};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn item(id: &str, title: &str, updated: i64) -> Value {
        json!({
            "item_id": id,
            "resolved_id": id,
            "given_url": format!("https://example.com/{id}"),
            "resolved_title": title,
            "favorite": "0",
            "status": "0",
            "time_added": "1600000000",
            "time_updated": updated.to_string(),
            "tags": {"reading": {"item_id": id, "tag": "reading"}}
        })
    }

    #[test]
    fn test_timestamp_path_appends_suffix() {
        assert_eq!(
            timestamp_path(Path::new("/data/pocket_items.csv")),
            PathBuf::from("/data/pocket_items.csv.timestamp")
        );
    }

    #[tokio::test]
    async fn test_export_pages_and_resumes() {
        let fake = FakePocket::with_items([
            item("1", "One", 100),
            item("2", "Two", 100),
            item("3", "Three", 100),
        ]);
        let base = serve(fake.router()).await;
        let dir = TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), &base);
        let client = PocketClient::new(reqwest::Client::new(), &settings.pocket);

        let report = run(&settings, client.clone()).await.unwrap();
        assert_eq!(report.normalized, 3);
        // Page size 2: a full page, then a short one.
        let offsets: Vec<Value> = fake.get_requests().iter().map(|r| r["offset"].clone()).collect();
        assert_eq!(offsets, [json!(0), json!(2)]);
        assert!(
            fake.get_requests()
                .iter()
                .all(|r| r["state"] == "all" && r.get("since").is_none())
        );

        let rows = CsvStore::new(settings.bookmarks_csv(), normalize::bookmark_schema())
            .read_all()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("Tags"), Some("reading"));

        let stamp = StateFile::timestamp(timestamp_path(&settings.bookmarks_csv()))
            .load()
            .unwrap()
            .unwrap();
        assert!(stamp > 1_600_000_000);

        // Second run asks only for changes after the stored timestamp.
        let report = run(&settings, client).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(fake.get_requests().last().unwrap()["since"], json!(stamp));
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::for_test(dir.path(), "http://127.0.0.1:9");
        settings.pocket.access_token.clear();
        let client = PocketClient::new(reqwest::Client::new(), &settings.pocket);

        assert!(run(&settings, client).await.is_err());
        assert!(!settings.bookmarks_csv().exists());
    }
}
