//! In-memory stand-in for the Olog service.
//!
//! Serves the same resource layout as a real Olog (`/resources/logs`,
//! `/resources/logbooks`, `/resources/tags`, `/resources/properties`,
//! `/resources/attachments`) with the same JSON envelopes. State lives in one
//! `RwLock` and is lost when the process exits.

mod error;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ServerError;

fn active() -> String {
    "Active".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logbook {
    pub name: String,
    #[serde(default)]
    pub owner: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default = "active")]
    pub state: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub created_date: Option<i64>,
    #[serde(default)]
    pub modified_date: Option<i64>,
    #[serde(default)]
    pub logbooks: Vec<Logbook>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub file_name: String,
    pub content_type: String,
    pub file_size: u64,
}

struct StoredFile {
    meta: AttachmentMeta,
    bytes: Vec<u8>,
}

#[derive(Default)]
pub struct Store {
    next_id: u64,
    logs: BTreeMap<u64, LogEntry>,
    logbooks: BTreeMap<String, Logbook>,
    tags: BTreeMap<String, Tag>,
    properties: BTreeMap<String, Property>,
    attachments: HashMap<u64, Vec<StoredFile>>,
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    /// Expected `authorization` header for writes; `None` accepts anyone.
    required_auth: Option<Arc<str>>,
}

impl AppState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), ServerError> {
        let Some(expected) = &self.required_auth else {
            return Ok(());
        };
        let given = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if given == expected.as_ref() {
            Ok(())
        } else {
            Err(ServerError::Unauthorized)
        }
    }
}

/// Router that accepts writes from anyone.
pub fn app() -> Router {
    router(None)
}

/// Router that requires HTTP Basic credentials for every write.
pub fn app_with_auth(username: &str, password: &str) -> Router {
    let token = STANDARD.encode(format!("{username}:{password}"));
    router(Some(Arc::from(format!("Basic {token}"))))
}

/// Largest request body accepted, attachments included.
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

fn router(required_auth: Option<Arc<str>>) -> Router {
    let state = AppState {
        store: Arc::new(RwLock::new(Store::default())),
        required_auth,
    };
    Router::new()
        .route("/resources/logs", get(find_logs).post(create_logs))
        .route("/resources/logs/{id}", get(get_log).delete(delete_log))
        .route("/resources/logbooks", get(list_logbooks))
        .route("/resources/logbooks/{name}", put(put_logbook).delete(delete_logbook))
        .route("/resources/tags", get(list_tags))
        .route("/resources/tags/{name}", put(put_tag).delete(delete_tag))
        .route("/resources/properties", get(list_properties))
        .route("/resources/properties/{name}", put(put_property).delete(delete_property))
        .route(
            "/resources/attachments/{id}",
            get(list_attachments).post(upload_attachment),
        )
        .route("/resources/attachments/{id}/{file_name}", get(get_attachment))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_app(listener, app()).await
}

pub async fn run_app(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// --- logs ---

/// `*` matches any run of characters; matching ignores case.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let text = text.to_lowercase();
    if !pattern.contains('*') {
        return text == pattern;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = text.as_str();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn parse_param<T: std::str::FromStr>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>, ServerError> {
    params
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ServerError::BadRequest(format!("invalid {key}: {raw}")))
        })
        .transpose()
}

fn matches(entry: &LogEntry, params: &HashMap<String, String>, start: Option<f64>, end: Option<f64>) -> bool {
    if let Some(search) = params.get("search") {
        if !wildcard_match(search, &entry.description) {
            return false;
        }
    }
    if let Some(name) = params.get("logbook") {
        if !entry.logbooks.iter().any(|l| &l.name == name) {
            return false;
        }
    }
    if let Some(name) = params.get("tag") {
        if !entry.tags.iter().any(|t| &t.name == name) {
            return false;
        }
    }
    if let Some(name) = params.get("property") {
        if !entry.properties.iter().any(|p| &p.name == name) {
            return false;
        }
    }
    let created_secs = entry.created_date.unwrap_or_default() as f64 / 1000.0;
    if start.is_some_and(|s| created_secs < s) || end.is_some_and(|e| created_secs > e) {
        return false;
    }
    true
}

async fn find_logs(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<LogEntry>>, ServerError> {
    let start = parse_param::<f64>(&params, "start")?;
    let end = parse_param::<f64>(&params, "end")?;
    let page = parse_param::<usize>(&params, "page")?.unwrap_or(1).max(1);
    let limit = parse_param::<usize>(&params, "limit")?;

    let store = state.store.read().await;
    let found = store
        .logs
        .values()
        .filter(|entry| matches(entry, &params, start, end));
    let found: Vec<LogEntry> = match limit {
        Some(limit) => found.skip((page - 1) * limit).take(limit).cloned().collect(),
        None => found.cloned().collect(),
    };
    Ok(Json(found))
}

async fn create_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(entries): Json<Vec<LogEntry>>,
) -> Result<Json<Vec<LogEntry>>, ServerError> {
    state.authorize(&headers)?;
    for entry in &entries {
        if entry.owner.trim().is_empty() {
            return Err(ServerError::BadRequest("log entry has no owner".into()));
        }
        if entry.logbooks.is_empty() {
            return Err(ServerError::BadRequest("log entry has no logbook".into()));
        }
    }

    let mut store = state.store.write().await;
    let mut created = Vec::with_capacity(entries.len());
    for mut entry in entries {
        store.next_id += 1;
        let id = store.next_id;
        let now = now_millis();
        entry.id = Some(id);
        entry.created_date = Some(now);
        entry.modified_date = Some(now);
        info!(id, owner = %entry.owner, "log entry created");
        store.logs.insert(id, entry.clone());
        created.push(entry);
    }
    Ok(Json(created))
}

async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<LogEntry>, ServerError> {
    let store = state.store.read().await;
    store
        .logs
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("log entry {id}")))
}

async fn delete_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<(), ServerError> {
    state.authorize(&headers)?;
    let mut store = state.store.write().await;
    store
        .logs
        .remove(&id)
        .ok_or_else(|| ServerError::NotFound(format!("log entry {id}")))?;
    store.attachments.remove(&id);
    Ok(())
}

// --- logbooks / tags / properties ---

async fn list_logbooks(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.store.read().await;
    let logbooks: Vec<&Logbook> = store.logbooks.values().collect();
    Json(serde_json::json!({ "logbook": logbooks }))
}

async fn put_logbook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(mut logbook): Json<Logbook>,
) -> Result<Json<Logbook>, ServerError> {
    state.authorize(&headers)?;
    logbook.name = name.clone();
    state.store.write().await.logbooks.insert(name, logbook.clone());
    Ok(Json(logbook))
}

async fn delete_logbook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<(), ServerError> {
    state.authorize(&headers)?;
    state
        .store
        .write()
        .await
        .logbooks
        .remove(&name)
        .map(|_| ())
        .ok_or_else(|| ServerError::NotFound(format!("logbook {name}")))
}

async fn list_tags(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.store.read().await;
    let tags: Vec<&Tag> = store.tags.values().collect();
    Json(serde_json::json!({ "tag": tags }))
}

async fn put_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(mut tag): Json<Tag>,
) -> Result<Json<Tag>, ServerError> {
    state.authorize(&headers)?;
    tag.name = name.clone();
    state.store.write().await.tags.insert(name, tag.clone());
    Ok(Json(tag))
}

/// Deleting a tag also removes it from every log entry.
async fn delete_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<(), ServerError> {
    state.authorize(&headers)?;
    let mut store = state.store.write().await;
    store
        .tags
        .remove(&name)
        .ok_or_else(|| ServerError::NotFound(format!("tag {name}")))?;
    for entry in store.logs.values_mut() {
        entry.tags.retain(|t| t.name != name);
    }
    Ok(())
}

async fn list_properties(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.store.read().await;
    let properties: Vec<&Property> = store.properties.values().collect();
    Json(serde_json::json!({ "property": properties }))
}

async fn put_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(mut property): Json<Property>,
) -> Result<Json<Property>, ServerError> {
    state.authorize(&headers)?;
    property.name = name.clone();
    state
        .store
        .write()
        .await
        .properties
        .insert(name, property.clone());
    Ok(Json(property))
}

/// Deleting a property also removes it from every log entry.
async fn delete_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<(), ServerError> {
    state.authorize(&headers)?;
    let mut store = state.store.write().await;
    store
        .properties
        .remove(&name)
        .ok_or_else(|| ServerError::NotFound(format!("property {name}")))?;
    for entry in store.logs.values_mut() {
        entry.properties.retain(|p| p.name != name);
    }
    Ok(())
}

// --- attachments ---

async fn upload_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    mut multipart: Multipart,
) -> Result<Json<AttachmentMeta>, ServerError> {
    state.authorize(&headers)?;
    if !state.store.read().await.logs.contains_key(&id) {
        return Err(ServerError::NotFound(format!("log entry {id}")));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ServerError::BadRequest("file part has no filename".into()))?;
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?
            .to_vec();

        let meta = AttachmentMeta {
            file_name,
            content_type,
            file_size: bytes.len() as u64,
        };
        info!(id, file = %meta.file_name, size = meta.file_size, "attachment stored");

        let mut store = state.store.write().await;
        let files = store.attachments.entry(id).or_default();
        files.retain(|f| f.meta.file_name != meta.file_name);
        files.push(StoredFile {
            meta: meta.clone(),
            bytes,
        });
        return Ok(Json(meta));
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn list_attachments(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let store = state.store.read().await;
    if !store.logs.contains_key(&id) {
        return Err(ServerError::NotFound(format!("log entry {id}")));
    }
    let metas: Vec<&AttachmentMeta> = store
        .attachments
        .get(&id)
        .map(|files| files.iter().map(|f| &f.meta).collect())
        .unwrap_or_default();
    Ok(Json(serde_json::json!({ "attachment": metas })))
}

async fn get_attachment(
    State(state): State<AppState>,
    Path((id, file_name)): Path<(u64, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let store = state.store.read().await;
    let file = store
        .attachments
        .get(&id)
        .and_then(|files| files.iter().find(|f| f.meta.file_name == file_name))
        .ok_or_else(|| ServerError::NotFound(format!("attachment {file_name}")))?;
    Ok((
        [(header::CONTENT_TYPE, file.meta.content_type.clone())],
        file.bytes.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(wildcard_match("*timing*", "Timing system reset"));
        assert!(wildcard_match("beam*", "Beam dump"));
        assert!(wildcard_match("*dump", "Beam dump"));
        assert!(wildcard_match("beam dump", "BEAM DUMP"));
        assert!(wildcard_match("*", "anything"));
        assert!(!wildcard_match("*rf*", "Beam dump"));
        assert!(!wildcard_match("dump*", "Beam dump"));
    }
}
