//! Pocket v3 API: retrieve, modify and the OAuth handshake

use super::{ensure_success, transport_error};
use crate::config::PocketConfig;
use async_trait::async_trait;
use harvest_core::{PageFetcher, Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

const SERVICE: &str = "pocket";

/// Redirect target registered for desktop apps; never actually visited
pub const REDIRECT_URI: &str = "http://localhost";

/// Filters for a `/get` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<&'static str>,
    #[serde(rename = "detailType", skip_serializing_if = "Option::is_none")]
    pub detail_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

impl GetQuery {
    /// Every item, full detail
    pub fn all_complete() -> Self {
        Self {
            state: Some("all"),
            detail_type: Some("complete"),
            ..Self::default()
        }
    }

    /// Unread items with the given favorite flag, full detail
    pub fn unread(favorite: bool) -> Self {
        Self {
            state: Some("unread"),
            favorite: Some(if favorite { "1" } else { "0" }),
            detail_type: Some("complete"),
            ..Self::default()
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Serialize)]
struct Authenticated<'a, T> {
    consumer_key: &'a str,
    access_token: &'a str,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct SendBody<'a> {
    actions: &'a [PocketAction],
}

/// One entry of a `/send` batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PocketAction {
    Favorite { item_id: String },
    Unfavorite { item_id: String },
    TagsAdd { item_id: String, tags: String },
    TagsReplace { item_id: String, tags: String },
}

/// Items of a `/get` response. `list` is an object keyed by item id, or an empty
/// array when nothing matched.
fn list_items(response: Value) -> Result<Vec<Value>> {
    match response.get("list") {
        Some(Value::Object(items)) => Ok(items.values().cloned().collect()),
        Some(Value::Array(items)) if items.is_empty() => Ok(Vec::new()),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(other) => Err(SyncError::MissingData(format!(
            "unexpected Pocket list payload: {other}"
        ))),
    }
}

/// Authenticated Pocket client
#[derive(Debug, Clone)]
pub struct PocketClient {
    http: reqwest::Client,
    base: String,
    consumer_key: String,
    access_token: String,
}

impl PocketClient {
    pub fn new(http: reqwest::Client, config: &PocketConfig) -> Self {
        Self {
            http,
            base: config.api_base.trim_end_matches('/').to_string(),
            consumer_key: config.consumer_key.clone(),
            access_token: config.access_token.clone(),
        }
    }

    async fn post<T: Serialize>(&self, endpoint: &str, body: T) -> Result<reqwest::Response> {
        let url = format!("{}/{endpoint}", self.base);
        let response = self
            .http
            .post(&url)
            .header("X-Accept", "application/json")
            .json(&Authenticated {
                consumer_key: &self.consumer_key,
                access_token: &self.access_token,
                body,
            })
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        ensure_success(SERVICE, response).await
    }

    /// Retrieve items matching `query`
    pub async fn get(&self, query: &GetQuery) -> Result<Vec<Value>> {
        debug!(?query, "Requesting Pocket items");
        let response = self.post("get", query).await?;
        let body: Value = response.json().await.map_err(transport_error(SERVICE))?;
        list_items(body)
    }

    /// Apply a batch of modifications. Empty batches are not sent.
    pub async fn send(&self, actions: &[PocketAction]) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }
        self.post("send", SendBody { actions }).await?;
        info!("Successfully processed batch of {} actions", actions.len());
        Ok(())
    }
}

/// Pages through every bookmark for the export job
pub struct PocketPager {
    client: PocketClient,
}

impl PocketPager {
    pub fn new(client: PocketClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for PocketPager {
    type Item = Value;

    async fn fetch_page(
        &self,
        since: Option<i64>,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Value>> {
        let query = GetQuery {
            offset: Some(offset),
            since,
            ..GetQuery::all_complete().with_count(count)
        };
        self.client.get(&query).await
    }
}

#[derive(Deserialize)]
struct RequestToken {
    code: String,
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

/// Request-token / access-token exchange for a consumer key
pub struct PocketAuth {
    http: reqwest::Client,
    base: String,
    consumer_key: String,
}

impl PocketAuth {
    pub fn new(http: reqwest::Client, api_base: &str, consumer_key: impl Into<String>) -> Self {
        Self {
            http,
            base: api_base.trim_end_matches('/').to_string(),
            consumer_key: consumer_key.into(),
        }
    }

    async fn exchange<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/oauth/{endpoint}", self.base))
            .header("X-Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        let response = ensure_success(SERVICE, response).await?;
        response.json().await.map_err(transport_error(SERVICE))
    }

    pub async fn request_token(&self) -> Result<String> {
        let token: RequestToken = self
            .exchange(
                "request",
                serde_json::json!({
                    "consumer_key": self.consumer_key,
                    "redirect_uri": REDIRECT_URI,
                }),
            )
            .await?;
        Ok(token.code)
    }

    pub async fn access_token(&self, request_token: &str) -> Result<String> {
        let token: AccessToken = self
            .exchange(
                "authorize",
                serde_json::json!({
                    "consumer_key": self.consumer_key,
                    "code": request_token,
                }),
            )
            .await?;
        Ok(token.access_token)
    }
}

/// Page the user opens to approve `request_token`
pub fn authorization_url(authorize_url: &str, request_token: &str) -> String {
    format!("{authorize_url}?request_token={request_token}&redirect_uri={REDIRECT_URI}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_support::{FakePocket, serve};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_actions_serialize_with_action_tag() {
        let actions = [
            PocketAction::Favorite {
                item_id: "1".into(),
            },
            PocketAction::TagsAdd {
                item_id: "1".into(),
                tags: "*a,*b".into(),
            },
        ];
        assert_eq!(
            serde_json::to_value(&actions).unwrap(),
            json!([
                {"action": "favorite", "item_id": "1"},
                {"action": "tags_add", "item_id": "1", "tags": "*a,*b"}
            ])
        );
    }

    #[test]
    fn test_list_payload_shapes() {
        assert!(list_items(json!({"list": []})).unwrap().is_empty());
        assert!(list_items(json!({"status": 2})).unwrap().is_empty());
        assert_eq!(
            list_items(json!({"list": {"1": {"item_id": "1"}}})).unwrap(),
            [json!({"item_id": "1"})]
        );
        assert!(list_items(json!({"list": "nope"})).is_err());
    }

    #[tokio::test]
    async fn test_get_sends_credentials_and_filters() {
        let fake =
            FakePocket::with_items([json!({"item_id": "5", "status": "0", "favorite": "0"})]);
        let base = serve(fake.router()).await;
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), &base);
        let client = PocketClient::new(reqwest::Client::new(), &settings.pocket);

        let items = client.get(&GetQuery::unread(false).with_count(10)).await.unwrap();
        assert_eq!(items.len(), 1);

        let request = fake.get_requests().pop().unwrap();
        assert_eq!(request["consumer_key"], "consumer");
        assert_eq!(request["access_token"], "token");
        assert_eq!(request["detailType"], "complete");
        assert_eq!(request["favorite"], "0");
        assert_eq!(request["count"], 10);
        assert!(request.get("since").is_none());
    }

    #[tokio::test]
    async fn test_error_status_carries_x_error() {
        async fn reject() -> (StatusCode, HeaderMap, &'static str) {
            let mut headers = HeaderMap::new();
            headers.insert("X-Error", "Invalid consumer key.".parse().unwrap());
            (StatusCode::FORBIDDEN, headers, "")
        }
        let base = serve(Router::new().route("/get", post(reject))).await;
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::for_test(dir.path(), &base);
        let client = PocketClient::new(reqwest::Client::new(), &settings.pocket);

        match client.get(&GetQuery::all_complete()).await.unwrap_err() {
            SyncError::Api { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body, "Invalid consumer key.");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_oauth_exchange() {
        async fn request(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(headers["x-accept"], "application/json");
            assert_eq!(body["redirect_uri"], REDIRECT_URI);
            Json(json!({"code": "req-123", "state": null}))
        }
        async fn authorize(Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(body["code"], "req-123");
            Json(json!({"access_token": "acc-456", "username": "reader"}))
        }
        let base = serve(
            Router::new()
                .route("/oauth/request", post(request))
                .route("/oauth/authorize", post(authorize)),
        )
        .await;

        let auth = PocketAuth::new(reqwest::Client::new(), &base, "ck");
        let code = auth.request_token().await.unwrap();
        assert_eq!(code, "req-123");
        assert_eq!(auth.access_token(&code).await.unwrap(), "acc-456");
        assert_eq!(
            authorization_url("https://getpocket.com/auth/authorize", &code),
            "https://getpocket.com/auth/authorize?request_token=req-123&redirect_uri=http://localhost"
        );
    }
}
