//! In-process stand-ins for the remote services

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Default)]
struct PocketState {
    items: BTreeMap<String, Value>,
    get_requests: Vec<Value>,
    sent: Vec<Vec<Value>>,
}

/// Pocket `/get` and `/send` over an in-memory item list
#[derive(Clone, Default)]
pub struct FakePocket {
    state: Arc<Mutex<PocketState>>,
}

impl FakePocket {
    pub fn with_items<I: IntoIterator<Item = Value>>(items: I) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            for item in items {
                let id = item["item_id"].as_str().unwrap().to_string();
                state.items.insert(id, item);
            }
        }
        fake
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/get", post(pocket_get))
            .route("/send", post(pocket_send))
            .with_state(self.clone())
    }

    pub fn get_requests(&self) -> Vec<Value> {
        self.state.lock().unwrap().get_requests.clone()
    }

    pub fn sent_batches(&self) -> Vec<Vec<Value>> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn item(&self, id: &str) -> Value {
        self.state.lock().unwrap().items[id].clone()
    }
}

fn field_matches(item: &Value, request: &Value, field: &str) -> bool {
    match request.get(field).and_then(Value::as_str) {
        None | Some("all") => true,
        Some(wanted) => item.get(field).and_then(Value::as_str).unwrap_or("0") == wanted,
    }
}

async fn pocket_get(State(fake): State<FakePocket>, Json(request): Json<Value>) -> Json<Value> {
    let mut state = fake.state.lock().unwrap();
    state.get_requests.push(request.clone());

    // "unread" is status 0 in item payloads
    let status = match request.get("state").and_then(Value::as_str) {
        Some("unread") => Some("0"),
        _ => None,
    };
    let since = request.get("since").and_then(Value::as_i64).unwrap_or(0);
    let offset = request.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
    let count = request
        .get("count")
        .and_then(Value::as_u64)
        .map_or(usize::MAX, |c| c as usize);

    let list: serde_json::Map<String, Value> = state
        .items
        .iter()
        .filter(|(_, item)| field_matches(item, &request, "favorite"))
        .filter(|(_, item)| status.is_none_or(|s| item["status"] == s))
        .filter(|(_, item)| {
            item.get("time_updated")
                .and_then(Value::as_str)
                .and_then(|t| t.parse::<i64>().ok())
                .unwrap_or(i64::MAX)
                > since
        })
        .skip(offset)
        .take(count)
        .map(|(id, item)| (id.clone(), item.clone()))
        .collect();

    if list.is_empty() {
        Json(json!({"status": 2, "list": []}))
    } else {
        Json(json!({"status": 1, "list": list}))
    }
}

fn tag_map(tags: &str) -> Value {
    let map: serde_json::Map<String, Value> = tags
        .split(',')
        .filter(|t| !t.is_empty())
        .map(|t| (t.to_string(), json!({"tag": t})))
        .collect();
    Value::Object(map)
}

async fn pocket_send(State(fake): State<FakePocket>, Json(request): Json<Value>) -> Json<Value> {
    let mut state = fake.state.lock().unwrap();
    let actions = request["actions"].as_array().cloned().unwrap_or_default();
    for action in &actions {
        let id = action["item_id"].as_str().unwrap_or_default();
        let Some(item) = state.items.get_mut(id) else {
            continue;
        };
        let tags = action["tags"].as_str().unwrap_or_default();
        match action["action"].as_str().unwrap_or_default() {
            "favorite" => item["favorite"] = json!("1"),
            "unfavorite" => item["favorite"] = json!("0"),
            "tags_replace" => item["tags"] = tag_map(tags),
            "tags_add" => {
                let mut merged = item.get("tags").cloned().unwrap_or_else(|| json!({}));
                if let (Some(existing), Value::Object(added)) =
                    (merged.as_object_mut(), tag_map(tags))
                {
                    existing.extend(added);
                }
                item["tags"] = merged;
            },
            other => panic!("unexpected action {other}"),
        }
    }
    let results = vec![json!(true); actions.len()];
    state.sent.push(actions);
    Json(json!({"status": 1, "action_results": results}))
}

fn fake_video(id: &str) -> Value {
    json!({
        "id": id,
        "snippet": {
            "publishedAt": "2021-06-01T12:00:00Z",
            "title": format!("Video {id}"),
            "channelId": "UC123",
            "channelTitle": "Channel",
            "categoryId": "27"
        },
        "contentDetails": {"duration": "PT3M2S", "definition": "hd"},
        "statistics": {"viewCount": "100"}
    })
}

/// `videos.list` answering every id except `missing`; any batch containing `boom` fails
pub fn fake_youtube() -> Router {
    async fn videos(
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<Value>, StatusCode> {
        assert_eq!(
            params.get("part").map(String::as_str),
            Some("snippet,contentDetails,statistics")
        );
        let ids = params.get("id").cloned().unwrap_or_default();
        if ids.split(',').any(|id| id == "boom") {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        let items: Vec<Value> = ids
            .split(',')
            .filter(|id| !id.is_empty() && *id != "missing")
            .map(fake_video)
            .collect();
        Ok(Json(json!({"kind": "youtube#videoListResponse", "items": items})))
    }
    Router::new().route("/videos", get(videos))
}
