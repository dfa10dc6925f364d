//! YouTube Data API v3 `videos.list`

use super::{ensure_success, transport_error};
use crate::config::YouTubeConfig;
use async_trait::async_trait;
use harvest_core::{BatchFetcher, Record, Result, normalize};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const SERVICE: &str = "youtube";
const PARTS: &str = "snippet,contentDetails,statistics";

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client, config: &YouTubeConfig) -> Self {
        Self {
            http,
            base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Raw `videos.list` items for `ids`
    pub async fn videos(&self, ids: &[String]) -> Result<Vec<Value>> {
        let ids = ids.join(",");
        debug!(ids = %ids, "Requesting video metadata");
        let response = self
            .http
            .get(format!("{}/videos", self.base))
            .query(&[("part", PARTS), ("id", ids.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        let list: VideoListResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(transport_error(SERVICE))?;
        Ok(list.items)
    }
}

#[async_trait]
impl BatchFetcher for YouTubeClient {
    async fn fetch_batch(&self, keys: &[String]) -> Result<Vec<Record>> {
        let items = self.videos(keys).await?;
        Ok(items.iter().filter_map(normalize::video_metadata).collect())
    }
}
