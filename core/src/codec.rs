//! JSON wire format of the Olog service.
//!
//! # Design
//! Encoding goes straight to `serde_json::Value` with the field names the
//! service expects, so the exact envelope shape is visible in one place.
//! Decoding goes through private serde structs that tolerate missing optional
//! fields, then through the validating domain constructors. A `null` or empty
//! value decodes to `None` rather than an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::OlogError;
use crate::types::{LogEntry, Logbook, Property, Tag, DEFAULT_TAG_STATE};

/// Severity sent with every new log entry.
pub const LEVEL_INFO: &str = "Info";

/// Conversion between a domain type and its JSON representation.
pub trait Wire: Sized {
    fn encode(&self) -> Value;

    /// Rebuild a value from its JSON form. `Ok(None)` means the input was
    /// `null` or empty.
    fn decode(value: Value) -> Result<Option<Self>, OlogError>;
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn from_value<T: for<'de> Deserialize<'de>>(what: &str, value: Value) -> Result<T, OlogError> {
    serde_json::from_value(value)
        .map_err(|e| OlogError::Deserialization(format!("invalid {what}: {e}")))
}

/// Domain validation failures while decoding mean the server sent something
/// unusable, not that the caller passed bad arguments.
fn rejected(what: &str) -> impl Fn(OlogError) -> OlogError + '_ {
    move |err| match err {
        OlogError::Validation(msg) => {
            OlogError::Deserialization(format!("server sent an invalid {what}: {msg}"))
        }
        other => other,
    }
}

fn decode_all<T: Wire>(values: Option<Vec<Value>>) -> Result<Vec<T>, OlogError> {
    let mut decoded = Vec::new();
    for value in values.unwrap_or_default() {
        if let Some(item) = T::decode(value)? {
            decoded.push(item);
        }
    }
    Ok(decoded)
}

/// Serialize a wire value into a request body.
pub fn to_body(value: &Value) -> Result<Vec<u8>, OlogError> {
    serde_json::to_vec(value).map_err(|e| OlogError::Serialization(e.to_string()))
}

/// Parse a response body into a JSON value.
pub fn parse_body(body: &[u8]) -> Result<Value, OlogError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| OlogError::Deserialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Logbook / Tag / Property
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LogbookWire {
    name: String,
    #[serde(default)]
    owner: Option<String>,
}

impl Wire for Logbook {
    fn encode(&self) -> Value {
        json!({ "name": self.name(), "owner": self.owner() })
    }

    fn decode(value: Value) -> Result<Option<Self>, OlogError> {
        if is_absent(&value) {
            return Ok(None);
        }
        let wire: LogbookWire = from_value("logbook", value)?;
        Logbook::persisted(&wire.name, wire.owner.as_deref())
            .map(Some)
            .map_err(rejected("logbook"))
    }
}

#[derive(Deserialize)]
struct TagWire {
    name: String,
    #[serde(default)]
    state: Option<String>,
}

impl Wire for Tag {
    fn encode(&self) -> Value {
        json!({ "state": self.state(), "name": self.name() })
    }

    fn decode(value: Value) -> Result<Option<Self>, OlogError> {
        if is_absent(&value) {
            return Ok(None);
        }
        let wire: TagWire = from_value("tag", value)?;
        let state = wire.state.unwrap_or_else(|| DEFAULT_TAG_STATE.to_string());
        Tag::with_state(&wire.name, &state)
            .map(Some)
            .map_err(rejected("tag"))
    }
}

#[derive(Deserialize)]
struct PropertyWire {
    name: String,
    #[serde(default)]
    attributes: Option<BTreeMap<String, Value>>,
}

fn attribute_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Wire for Property {
    fn encode(&self) -> Value {
        json!({ "name": self.name(), "attributes": self.attributes() })
    }

    fn decode(value: Value) -> Result<Option<Self>, OlogError> {
        if is_absent(&value) {
            return Ok(None);
        }
        let wire: PropertyWire = from_value("property", value)?;
        let attributes = wire
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, attribute_string(value)));
        Property::with_attributes(&wire.name, attributes)
            .map(Some)
            .map_err(rejected("property"))
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEntryWire {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    created_date: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    modified_date: Option<DateTime<Utc>>,
    #[serde(default)]
    logbooks: Option<Vec<Value>>,
    #[serde(default)]
    tags: Option<Vec<Value>>,
    #[serde(default)]
    properties: Option<Vec<Value>>,
}

impl Wire for LogEntry {
    /// The service takes a list of entries; a single entry is sent as a
    /// one-element list.
    fn encode(&self) -> Value {
        let logbooks: Vec<Value> = self.logbooks().iter().map(Wire::encode).collect();
        let tags: Vec<Value> = self.tags().iter().map(Wire::encode).collect();
        let properties: Vec<Value> = self.properties().iter().map(Wire::encode).collect();
        json!([{
            "description": self.text(),
            "owner": self.owner(),
            "level": LEVEL_INFO,
            "logbooks": logbooks,
            "tags": tags,
            "properties": properties,
        }])
    }

    fn decode(value: Value) -> Result<Option<Self>, OlogError> {
        if is_absent(&value) {
            return Ok(None);
        }
        let wire: LogEntryWire = from_value("log entry", value)?;
        Ok(Some(LogEntry::persisted(
            &wire.description.unwrap_or_default(),
            &wire.owner.unwrap_or_default(),
            decode_all(wire.logbooks)?,
            decode_all(wire.tags)?,
            decode_all(wire.properties)?,
            wire.id,
            wire.created_date,
            wire.modified_date,
        )))
    }
}

/// Decode a body holding a JSON array of log entries, as returned by searches
/// and by log creation.
pub fn decode_log_entries(body: &[u8]) -> Result<Vec<LogEntry>, OlogError> {
    match parse_body(body)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => decode_all(Some(items)),
        other => Err(OlogError::Deserialization(format!(
            "expected a list of log entries, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Listing envelopes
// ---------------------------------------------------------------------------

/// Decode a listing response shaped `{"<key>": [ ... ]}`.
///
/// A missing or `null` key is an empty listing.
pub fn decode_envelope<T, F>(body: &[u8], key: &str, decode: F) -> Result<Vec<T>, OlogError>
where
    F: Fn(Value) -> Result<Option<T>, OlogError>,
{
    let mut envelope = match parse_body(body)? {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(OlogError::Deserialization(format!(
                "expected an object with key '{key}', got {other}"
            )))
        }
    };
    let items = match envelope.remove(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(OlogError::Deserialization(format!(
                "expected '{key}' to be a list, got {other}"
            )))
        }
    };
    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        if let Some(value) = decode(item)? {
            decoded.push(value);
        }
    }
    Ok(decoded)
}

/// Server-side description of a stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl AttachmentInfo {
    pub fn decode(value: Value) -> Result<Option<Self>, OlogError> {
        if is_absent(&value) {
            return Ok(None);
        }
        from_value("attachment", value).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

/// A `multipart/form-data` body with a single file part.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    /// Value for the `content-type` header, including the boundary.
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Encode one file under form field `field`.
pub fn encode_multipart(field: &str, filename: &str, mime: &str, content: &[u8]) -> MultipartBody {
    let boundary = format!("olog-{}", Uuid::new_v4().simple());
    let filename: String = filename
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .replace('"', "%22");

    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    MultipartBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        body,
    }
}
