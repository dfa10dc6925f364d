//! Per-domain output schemas and normalizers
//!
//! Each normalizer takes the raw JSON shape a service hands back and produces a
//! [`Record`] for its fixed [`Schema`]. Every value ends up as a string.

use crate::text::{clean_text, field_or, flag, join_sorted, scalar_to_string};
use crate::types::{Record, Schema};
use serde_json::Value;

/// Separator used for the bookmark `Tags` column
pub const TAG_SEPARATOR: &str = ";";

/// Watch-history columns
pub const WATCH_HISTORY_COLUMNS: [&str; 3] = ["time", "videoId", "source"];

/// Bookmark columns
pub const BOOKMARK_COLUMNS: [&str; 18] = [
    "Item ID",
    "Resolved ID",
    "Given URL",
    "Given Title",
    "Favorite",
    "Status",
    "Resolved Title",
    "Resolved URL",
    "Is Article",
    "Has Video",
    "Is Index",
    "Word Count",
    "Listen Duration Estimate",
    "Time Added",
    "Time Updated",
    "Time Read",
    "Time Favorited",
    "Tags",
];

/// Video metadata columns
pub const VIDEO_METADATA_COLUMNS: [&str; 12] = [
    "videoId",
    "duration",
    "publishedAt",
    "title",
    "channelId",
    "channelTitle",
    "categoryId",
    "definition",
    "viewCount",
    "likeCount",
    "commentCount",
    "favoriteCount",
];

/// Watch history, one row per watch event keyed by its timestamp
pub fn watch_history_schema() -> Schema {
    Schema::new(WATCH_HISTORY_COLUMNS, "time")
}

/// Bookmarks keyed by item id
pub fn bookmark_schema() -> Schema {
    Schema::new(BOOKMARK_COLUMNS, "Item ID")
}

/// Video metadata keyed by video id
pub fn video_metadata_schema() -> Schema {
    Schema::new(VIDEO_METADATA_COLUMNS, "videoId")
}

/// Video id from a watch URL: the `watch?v=` parameter up to the next `&`,
/// otherwise the last path segment.
pub fn extract_video_id(url: &str) -> String {
    match url.split_once("watch?v=") {
        Some((_, rest)) => rest.split('&').next().unwrap_or_default().to_string(),
        None => url.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

/// `music` for YouTube Music URLs, `youtube` otherwise
pub fn watch_source(url: &str) -> &'static str {
    if url.contains("music.youtube.com") {
        "music"
    } else {
        "youtube"
    }
}

/// Normalize one watch-history archive entry. Entries without `titleUrl` or
/// `time` (removed videos, ads) are dropped.
pub fn watch_event(entry: &Value) -> Option<Record> {
    let url = entry.get("titleUrl")?.as_str()?;
    let time = entry.get("time")?.as_str()?;
    Some(
        Record::new()
            .with("time", time)
            .with("videoId", extract_video_id(url))
            .with("source", watch_source(url)),
    )
}

/// Normalize one bookmark item from the listing endpoint
pub fn bookmark(item: &Value) -> Option<Record> {
    let item_id = field_or(item, "item_id", "");
    if item_id.is_empty() {
        return None;
    }

    let tags = match item.get("tags") {
        Some(Value::Object(tags)) => join_sorted(tags.keys(), TAG_SEPARATOR),
        _ => String::new(),
    };

    Some(Record::from_pairs([
        ("Item ID", item_id),
        ("Resolved ID", field_or(item, "resolved_id", "")),
        ("Given URL", field_or(item, "given_url", "")),
        ("Given Title", clean_text(&field_or(item, "given_title", ""))),
        ("Favorite", flag(item, "favorite").to_string()),
        ("Status", field_or(item, "status", "")),
        ("Resolved Title", clean_text(&field_or(item, "resolved_title", ""))),
        ("Resolved URL", field_or(item, "resolved_url", "")),
        ("Is Article", flag(item, "is_article").to_string()),
        ("Has Video", flag(item, "has_video").to_string()),
        ("Is Index", flag(item, "is_index").to_string()),
        ("Word Count", field_or(item, "word_count", "")),
        (
            "Listen Duration Estimate",
            field_or(item, "listen_duration_estimate", ""),
        ),
        ("Time Added", field_or(item, "time_added", "0")),
        ("Time Updated", field_or(item, "time_updated", "0")),
        ("Time Read", field_or(item, "time_read", "")),
        ("Time Favorited", field_or(item, "time_favorited", "")),
        ("Tags", tags),
    ]))
}

/// Normalize one `videos.list` item (snippet, contentDetails, statistics parts)
pub fn video_metadata(item: &Value) -> Option<Record> {
    let id = item.get("id").map(scalar_to_string).filter(|s| !s.is_empty())?;
    let empty = Value::Null;
    let snippet = item.get("snippet").unwrap_or(&empty);
    let details = item.get("contentDetails").unwrap_or(&empty);
    let stats = item.get("statistics").unwrap_or(&empty);

    Some(Record::from_pairs([
        ("videoId", id),
        ("duration", field_or(details, "duration", "")),
        ("publishedAt", field_or(snippet, "publishedAt", "")),
        ("title", clean_text(&field_or(snippet, "title", ""))),
        ("channelId", field_or(snippet, "channelId", "")),
        ("channelTitle", clean_text(&field_or(snippet, "channelTitle", ""))),
        ("categoryId", field_or(snippet, "categoryId", "")),
        ("definition", field_or(details, "definition", "")),
        ("viewCount", field_or(stats, "viewCount", "0")),
        ("likeCount", field_or(stats, "likeCount", "0")),
        ("commentCount", field_or(stats, "commentCount", "0")),
        ("favoriteCount", field_or(stats, "favoriteCount", "0")),
    ]))
}
