//! Fake index server
//!
//! Speaks the subset of the Algolia REST API the client uses, keeping
//! records as raw JSON so tests see exactly what went over the wire.

use super::constants::{ADMIN_KEY, INDEX_NAME, SEARCH_KEY};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct IndexState {
    records: BTreeMap<String, Value>,
    /// Write requests refused for lack of the admin key.
    rejected_writes: usize,
    /// Write requests accepted.
    accepted_writes: usize,
}

type SharedState = Arc<Mutex<IndexState>>;

#[derive(PartialEq)]
enum Access {
    Read,
    Write,
    Denied,
}

fn access(headers: &HeaderMap) -> Access {
    match headers.get("X-Algolia-API-Key").and_then(|v| v.to_str().ok()) {
        Some(ADMIN_KEY) => Access::Write,
        Some(SEARCH_KEY) => Access::Read,
        _ => Access::Denied,
    }
}

fn denied() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"message": "Invalid Application-ID or API key", "status": 403})),
    )
        .into_response()
}

fn unknown_index(index: &str) -> Option<Response> {
    (index != INDEX_NAME).then(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Index does not exist", "status": 404})),
        )
            .into_response()
    })
}

/// Reads need any known key. Writes need the admin key.
fn check_write(state: &SharedState, headers: &HeaderMap) -> Option<Response> {
    let mut state = state.lock().unwrap();
    if access(headers) == Access::Write {
        state.accepted_writes += 1;
        None
    } else {
        state.rejected_writes += 1;
        Some(denied())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    #[serde(default)]
    query: String,
    hits_per_page: Option<usize>,
    filters: Option<String>,
}

fn matches(record: &Value, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    ["searchableText", "title"].iter().any(|field| {
        record[*field]
            .as_str()
            .is_some_and(|text| text.to_lowercase().contains(query))
    })
}

async fn query_index(
    State(state): State<SharedState>,
    Path(index): Path<String>,
    headers: HeaderMap,
    Json(body): Json<QueryBody>,
) -> Response {
    if let Some(response) = unknown_index(&index) {
        return response;
    }
    if access(&headers) == Access::Denied {
        return denied();
    }
    let visible_only = body.filters.as_deref() == Some("hidden:false");
    let query = body.query.trim().to_lowercase();
    let state = state.lock().unwrap();
    let hits: Vec<Value> = state
        .records
        .values()
        .filter(|r| !(visible_only && r["hidden"].as_bool().unwrap_or(false)))
        .filter(|r| matches(r, &query))
        .take(body.hits_per_page.unwrap_or(20))
        .cloned()
        .collect();
    Json(json!({"hits": hits, "nbHits": hits.len()})).into_response()
}

async fn get_object(
    State(state): State<SharedState>,
    Path((index, object_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = unknown_index(&index) {
        return response;
    }
    if access(&headers) == Access::Denied {
        return denied();
    }
    match state.lock().unwrap().records.get(&object_id) {
        Some(record) => Json(record.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "ObjectID does not exist", "status": 404})),
        )
            .into_response(),
    }
}

async fn put_object(
    State(state): State<SharedState>,
    Path((index, object_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut record): Json<Value>,
) -> Response {
    if let Some(response) = unknown_index(&index) {
        return response;
    }
    if let Some(response) = check_write(&state, &headers) {
        return response;
    }
    record["objectID"] = Value::String(object_id.clone());
    state.lock().unwrap().records.insert(object_id.clone(), record);
    Json(json!({"objectID": object_id, "taskID": 1})).into_response()
}

async fn delete_object(
    State(state): State<SharedState>,
    Path((index, object_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = unknown_index(&index) {
        return response;
    }
    if let Some(response) = check_write(&state, &headers) {
        return response;
    }
    state.lock().unwrap().records.remove(&object_id);
    Json(json!({"taskID": 2})).into_response()
}

#[derive(Deserialize)]
struct BatchBody {
    requests: Vec<BatchItem>,
}

#[derive(Deserialize)]
struct BatchItem {
    action: String,
    body: Value,
}

async fn batch(
    State(state): State<SharedState>,
    Path(index): Path<String>,
    headers: HeaderMap,
    Json(batch): Json<BatchBody>,
) -> Response {
    if let Some(response) = unknown_index(&index) {
        return response;
    }
    if let Some(response) = check_write(&state, &headers) {
        return response;
    }
    let mut state = state.lock().unwrap();
    let mut object_ids = Vec::new();
    for item in batch.requests {
        let Some(id) = item.body["objectID"].as_str().map(str::to_string) else {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "objectID is required", "status": 400})),
            )
                .into_response();
        };
        match item.action.as_str() {
            "updateObject" | "addObject" => {
                state.records.insert(id.clone(), item.body);
            }
            "deleteObject" => {
                state.records.remove(&id);
            }
            _ => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"message": "unknown action", "status": 400})),
                )
                    .into_response()
            }
        }
        object_ids.push(id);
    }
    Json(json!({"objectIDs": object_ids, "taskID": 3})).into_response()
}

/// Fake index instance on a random local port.
///
/// When dropped, the server shuts down.
pub struct FakeIndexServer {
    /// Base URL for the client (e.g., "http://127.0.0.1:12345")
    pub base_url: String,
    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeIndexServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(Vec::new()).await
    }

    /// Spawn a server already holding `records` (JSON objects with an
    /// `objectID`).
    pub async fn spawn_with(records: Vec<Value>) -> Self {
        let state: SharedState = Arc::new(Mutex::new(IndexState::default()));
        {
            let mut guard = state.lock().unwrap();
            for record in records {
                let id = record["objectID"]
                    .as_str()
                    .expect("fixture record without objectID")
                    .to_string();
                guard.records.insert(id, record);
            }
        }

        let app = Router::new()
            .route("/1/indexes/{index}/query", post(query_index))
            .route("/1/indexes/{index}/batch", post(batch))
            .route(
                "/1/indexes/{index}/{object_id}",
                get(get_object).put(put_object).delete(delete_object),
            )
            .with_state(state.clone());

        // Connections queue on the bound listener until the task polls it.
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// A URL nothing listens on.
    pub async fn closed_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    pub fn record(&self, object_id: &str) -> Option<Value> {
        self.state.lock().unwrap().records.get(object_id).cloned()
    }

    /// Change the index behind the client's back, as another editor would.
    pub fn put_record(&self, record: Value) {
        let id = record["objectID"]
            .as_str()
            .expect("record without objectID")
            .to_string();
        self.state.lock().unwrap().records.insert(id, record);
    }

    pub fn object_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().records.keys().cloned().collect()
    }

    pub fn rejected_writes(&self) -> usize {
        self.state.lock().unwrap().rejected_writes
    }

    pub fn accepted_writes(&self) -> usize {
        self.state.lock().unwrap().accepted_writes
    }

    /// Stop serving. Later requests fail to connect.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for FakeIndexServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
