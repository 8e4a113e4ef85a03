//! # Mock Backend
//!
//! A small axum server speaking the same wire contract as the real
//! backend: POST `/graphql` with `{query, variables}` envelopes, cursor
//! pagination over an in-memory store, idempotency-key deduplication for
//! mutations, and a `/subscriptions` WebSocket pushing change events.
//!
//! Cursors are `base64("v1:<offset>")` over the filtered+sorted sequence,
//! which keeps them stable for a fixed query. Failure injection
//! (`fail_with`) lets tests exercise the client's retry path.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, Mutex};

use lib_livedata::{ChangeEvent, ChangeKind, Record};

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    revision: u64,
    fields: Map<String, Value>,
}

impl StoredRecord {
    fn to_value(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert("id".to_string(), Value::from(self.id.clone()));
        obj.insert("revision".to_string(), Value::from(self.revision));
        Value::Object(obj)
    }

    fn to_record(&self) -> Record {
        serde_json::from_value(self.to_value()).expect("stored record is a valid record")
    }
}

#[derive(Default)]
struct BackendState {
    collections: HashMap<String, Vec<StoredRecord>>,
    /// Idempotency-Key -> the exact response body it produced.
    idempotency: HashMap<String, Value>,
    /// Injected HTTP statuses, served (and popped) before real handling.
    fail_next: VecDeque<u16>,
    next_id: u64,
}

/// Handle to the in-memory backend; clone freely.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
    events_tx: broadcast::Sender<ChangeEvent>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(BackendState::default())),
            events_tx,
        }
    }

    /// Seeds a collection with records. Each value is an object; `id` is
    /// taken from the payload or generated, revision starts at 1.
    pub async fn seed(&self, collection: &str, records: Vec<Value>) {
        let mut state = self.state.lock().await;
        for value in records {
            let mut fields = match value {
                Value::Object(map) => map,
                other => panic!("seed values must be objects, got {}", other),
            };
            let id = match fields.remove("id") {
                Some(Value::String(s)) => s,
                _ => {
                    state.next_id += 1;
                    format!("rec-{}", state.next_id)
                }
            };
            fields.remove("revision");
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(StoredRecord {
                    id,
                    revision: 1,
                    fields,
                });
        }
    }

    /// Serves `status` for the next `times` requests before handling
    /// resumes normally.
    pub async fn fail_with(&self, status: u16, times: u32) {
        let mut state = self.state.lock().await;
        for _ in 0..times {
            state.fail_next.push_back(status);
        }
    }

    /// Pushes a change event to every connected subscriber.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.events_tx.send(event);
    }

    pub async fn record_count(&self, collection: &str) -> usize {
        let state = self.state.lock().await;
        state.collections.get(collection).map_or(0, Vec::len)
    }

    /// Binds an ephemeral port and serves forever in a background task.
    pub async fn serve(&self) -> anyhow::Result<SocketAddr> {
        let app = Router::new()
            .route("/graphql", post(graphql_handler))
            .route("/subscriptions", any(ws_handler))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("mock backend exited: {}", e);
            }
        });
        log::info!("mock backend listening on {}", addr);
        Ok(addr)
    }
}

fn graphql_error(code: &str, message: &str, fields: Vec<Value>) -> Json<Value> {
    Json(json!({
        "data": null,
        "errors": [{
            "message": message,
            "extensions": { "code": code, "fields": fields }
        }]
    }))
}

fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("v1:{}", offset))
}

fn decode_cursor(cursor: &str) -> Option<usize> {
    let raw = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let text = String::from_utf8(raw).ok()?;
    text.strip_prefix("v1:")?.parse().ok()
}

async fn graphql_handler(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    {
        let mut state = backend.state.lock().await;
        if let Some(status) = state.fail_next.pop_front() {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
            return (status, Json(json!({ "error": "injected failure" })));
        }
    }

    if !headers.contains_key("authorization") {
        return (
            StatusCode::OK,
            graphql_error("UNAUTHENTICATED", "missing credential", vec![]),
        );
    }
    if !headers.contains_key("x-tenant-id") {
        return (
            StatusCode::OK,
            graphql_error("UNAUTHENTICATED", "missing tenant scope", vec![]),
        );
    }

    let query = body["query"].as_str().unwrap_or_default();
    let variables = body["variables"].clone();

    let response = if query.trim_start().starts_with("mutation") {
        handle_mutation(&backend, &headers, &variables).await
    } else {
        handle_query(&backend, &variables).await
    };
    (StatusCode::OK, response)
}

async fn handle_query(backend: &MockBackend, variables: &Value) -> Json<Value> {
    let collection = variables["collection"].as_str().unwrap_or_default();
    if collection == "restricted" {
        return graphql_error("FORBIDDEN", "no capability for this collection", vec![]);
    }

    let state = backend.state.lock().await;
    let records = state
        .collections
        .get(collection)
        .cloned()
        .unwrap_or_default();

    // Validate referenced fields against what the collection holds.
    if !records.is_empty() {
        let known = |field: &str| {
            field == "id"
                || field == "revision"
                || records.iter().any(|r| r.fields.contains_key(field))
        };
        let mut bad_fields = Vec::new();
        if let Some(filters) = variables["filters"].as_array() {
            for f in filters {
                let field = f["field"].as_str().unwrap_or_default();
                if !known(field) {
                    bad_fields.push(json!({ "field": field, "message": "unknown field" }));
                }
            }
        }
        if let Some(field) = variables["sort"]["field"].as_str() {
            if !known(field) {
                bad_fields.push(json!({ "field": field, "message": "unknown field" }));
            }
        }
        if !bad_fields.is_empty() {
            return graphql_error("VALIDATION_ERROR", "unknown fields referenced", bad_fields);
        }
    }

    let mut matching: Vec<StoredRecord> = records
        .into_iter()
        .filter(|r| matches_filters(r, variables["filters"].as_array()))
        .collect();

    if let Some(field) = variables["sort"]["field"].as_str() {
        let descending = variables["sort"]["direction"].as_str() == Some("desc");
        matching.sort_by(|a, b| {
            let ord = compare_values(&field_of(a, field), &field_of(b, field));
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    let total = matching.len();
    let (start, end) = if let Some(last) = variables["last"].as_u64() {
        let end = variables["before"]
            .as_str()
            .and_then(decode_cursor)
            .unwrap_or(total)
            .min(total);
        let start = end.saturating_sub(last as usize);
        (start, end)
    } else {
        let first = variables["first"].as_u64().unwrap_or(25) as usize;
        let start = variables["after"]
            .as_str()
            .and_then(decode_cursor)
            .map(|c| c + 1)
            .unwrap_or(0);
        (start.min(total), (start + first).min(total))
    };

    let edges: Vec<Value> = matching[start..end]
        .iter()
        .enumerate()
        .map(|(i, r)| {
            json!({
                "node": r.to_value(),
                "cursor": encode_cursor(start + i),
            })
        })
        .collect();

    Json(json!({
        "data": {
            "collection": {
                "edges": edges,
                "pageInfo": {
                    "hasNextPage": end < total,
                    "hasPreviousPage": start > 0,
                    "startCursor": if start < end { Value::from(encode_cursor(start)) } else { Value::Null },
                    "endCursor": if start < end { Value::from(encode_cursor(end - 1)) } else { Value::Null },
                },
                "totalCount": total,
            }
        }
    }))
}

async fn handle_mutation(backend: &MockBackend, headers: &HeaderMap, variables: &Value) -> Json<Value> {
    let Some(key) = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return graphql_error("VALIDATION_ERROR", "missing Idempotency-Key header", vec![]);
    };

    let collection = variables["collection"].as_str().unwrap_or_default().to_string();
    if collection == "restricted" {
        return graphql_error("FORBIDDEN", "no capability for this collection", vec![]);
    }

    let mut state = backend.state.lock().await;

    // Deduplicate by token: a retried intent gets the original response.
    if let Some(prior) = state.idempotency.get(&key) {
        log::debug!("replaying idempotent response for key {}", key);
        return Json(prior.clone());
    }

    let payload = match &variables["payload"] {
        Value::Object(map) => map.clone(),
        _ => return graphql_error("VALIDATION_ERROR", "payload must be an object", vec![]),
    };

    let (stored, kind) = if let Some(id) = variables["id"].as_str() {
        let Some(existing) = state
            .collections
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
        else {
            return graphql_error("VALIDATION_ERROR", "unknown record id", vec![]);
        };
        if let Some(expected) = variables["expectedRevision"].as_u64() {
            if expected != existing.revision {
                return graphql_error(
                    "CONFLICT",
                    &format!("revision mismatch: expected {}, have {}", expected, existing.revision),
                    vec![],
                );
            }
        }
        for (k, v) in payload {
            if k != "id" && k != "revision" {
                existing.fields.insert(k, v);
            }
        }
        existing.revision += 1;
        (existing.clone(), ChangeKind::Updated)
    } else {
        let mut fields = payload;
        let id = match fields.remove("id") {
            Some(Value::String(s)) => s,
            _ => {
                state.next_id += 1;
                format!("rec-{}", state.next_id)
            }
        };
        fields.remove("revision");
        let stored = StoredRecord {
            id,
            revision: 1,
            fields,
        };
        state
            .collections
            .entry(collection.clone())
            .or_default()
            .push(stored.clone());
        (stored, ChangeKind::Created)
    };

    let response = json!({
        "data": { "upsertRecord": { "record": stored.to_value() } }
    });
    state.idempotency.insert(key, response.clone());
    drop(state);

    backend.publish(ChangeEvent {
        collection,
        kind,
        record: stored.to_record(),
    });
    Json(response)
}

fn field_of(record: &StoredRecord, field: &str) -> Value {
    match field {
        "id" => Value::from(record.id.clone()),
        "revision" => Value::from(record.revision),
        other => record.fields.get(other).cloned().unwrap_or(Value::Null),
    }
}

fn matches_filters(record: &StoredRecord, filters: Option<&Vec<Value>>) -> bool {
    let Some(filters) = filters else { return true };
    filters.iter().all(|f| {
        let actual = field_of(record, f["field"].as_str().unwrap_or_default());
        let expected = &f["value"];
        match f["op"].as_str().unwrap_or_default() {
            "eq" => &actual == expected,
            "neq" => &actual != expected,
            "gt" => compare_values(&actual, expected).is_gt(),
            "gte" => compare_values(&actual, expected).is_ge(),
            "lt" => compare_values(&actual, expected).is_lt(),
            "lte" => compare_values(&actual, expected).is_le(),
            "contains" => match (&actual, expected) {
                (Value::String(s), Value::String(n)) => s.contains(n.as_str()),
                (Value::Array(items), needle) => items.contains(needle),
                _ => false,
            },
            "in" => expected
                .as_array()
                .map(|options| options.contains(&actual))
                .unwrap_or(false),
            _ => false,
        }
    })
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

async fn ws_handler(State(backend): State<MockBackend>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(backend, socket))
}

async fn handle_socket(backend: MockBackend, mut socket: WebSocket) {
    // Handshake: connection_init carrying the credential, then an ack.
    let Some(Ok(Message::Text(text))) = socket.recv().await else {
        return;
    };
    let init: Value = match serde_json::from_str(text.as_str()) {
        Ok(v) => v,
        Err(_) => return,
    };
    if init["type"] != json!("connection_init") || init["payload"]["tenant"].as_str().is_none() {
        log::warn!("rejecting subscription with bad handshake: {}", init);
        return;
    }
    let ack = json!({ "type": "connection_ack" }).to_string();
    if socket.send(Message::Text(ack.into())).await.is_err() {
        return;
    }

    // Subscribe frame scopes the stream to one collection.
    let Some(Ok(Message::Text(text))) = socket.recv().await else {
        return;
    };
    let sub: Value = match serde_json::from_str(text.as_str()) {
        Ok(v) => v,
        Err(_) => return,
    };
    let Some(collection) = sub["payload"]["collection"].as_str().map(str::to_string) else {
        return;
    };

    let mut events = backend.events_tx.subscribe();
    log::debug!("mock subscriber attached to '{}'", collection);
    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                None | Some(Err(_)) => return,
                Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(event) if event.collection == collection => {
                    let frame = json!({ "type": "next", "payload": event }).to_string();
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("mock subscriber lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
