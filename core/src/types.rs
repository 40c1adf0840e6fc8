//! Domain types for the Olog: log entries and the logbooks, tags, properties
//! and attachments they reference.
//!
//! # Design
//! Every type validates its mandatory fields when it is built by the caller.
//! Values decoded from the service skip those checks and keep whatever the
//! server stored. Equality is defined over identity-bearing
//! fields only: server-assigned ids and timestamps never take part, which lets
//! an entry that went through the service compare equal to the one that was
//! submitted.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::config::ClientConfig;
use crate::error::OlogError;
use crate::mime;

/// State given to tags created without one.
pub const DEFAULT_TAG_STATE: &str = "Active";

fn required(field: &str, value: &str) -> Result<String, OlogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OlogError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Unicode general category `Cf`: invisible characters such as zero-width
/// spaces, byte-order marks and bidi controls.
fn is_format(c: char) -> bool {
    matches!(c,
        '\u{00AD}'
        | '\u{0600}'..='\u{0605}'
        | '\u{061C}'
        | '\u{06DD}'
        | '\u{070F}'
        | '\u{0890}'..='\u{0891}'
        | '\u{08E2}'
        | '\u{180E}'
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{2066}'..='\u{206F}'
        | '\u{FEFF}'
        | '\u{FFF9}'..='\u{FFFB}'
        | '\u{110BD}'
        | '\u{110CD}'
        | '\u{13430}'..='\u{1343F}'
        | '\u{1BCA0}'..='\u{1BCA3}'
        | '\u{1D173}'..='\u{1D17A}'
        | '\u{E0001}'
        | '\u{E0020}'..='\u{E007F}'
    )
}

/// Keep printable text: drop control characters (except whitespace) and
/// invisible format characters, then trim.
fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|&c| (!c.is_control() || c.is_whitespace()) && !is_format(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

// ---------------------------------------------------------------------------
// Logbook
// ---------------------------------------------------------------------------

/// A named, owned collection of log entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Logbook {
    name: String,
    owner: String,
}

impl Logbook {
    pub fn new(name: &str, owner: &str) -> Result<Self, OlogError> {
        Ok(Self {
            name: required("logbook name", name)?,
            owner: required("logbook owner", owner)?,
        })
    }

    /// A logbook as reported by the server, which may omit the owner.
    pub(crate) fn persisted(name: &str, owner: Option<&str>) -> Result<Self, OlogError> {
        Ok(Self {
            name: required("logbook name", name)?,
            owner: owner.map(str::trim).unwrap_or_default().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty for logbooks the server listed without an owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A label attachable to log entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    name: String,
    state: String,
}

impl Tag {
    /// A tag in the default `Active` state.
    pub fn new(name: &str) -> Result<Self, OlogError> {
        Self::with_state(name, DEFAULT_TAG_STATE)
    }

    pub fn with_state(name: &str, state: &str) -> Result<Self, OlogError> {
        let state = state.trim();
        Ok(Self {
            name: required("tag name", name)?,
            state: if state.is_empty() {
                DEFAULT_TAG_STATE.to_string()
            } else {
                state.to_string()
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &str {
        &self.state
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// A named bag of string attributes, e.g. a ticket with `Id` and `URL`.
///
/// Two properties are equal when they share a name and the same set of
/// attribute names; attribute values do not take part.
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    attributes: BTreeMap<String, String>,
}

impl Property {
    pub fn new(name: &str) -> Result<Self, OlogError> {
        Ok(Self {
            name: required("property name", name)?,
            attributes: BTreeMap::new(),
        })
    }

    /// Add an attribute. The value is stored in its string form.
    pub fn attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    pub fn with_attributes<I, K, V>(name: &str, attributes: I) -> Result<Self, OlogError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let mut property = Self::new(name)?;
        for (key, value) in attributes {
            property.attributes.insert(key.into(), value.to_string());
        }
        Ok(property)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn attribute_value(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    fn identity(&self) -> (&str, BTreeSet<&str>) {
        (&self.name, self.attributes.keys().map(String::as_str).collect())
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Property {}

impl PartialOrd for Property {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Property {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
    /// Downloaded content living in a temporary directory that is removed
    /// once the last clone of the attachment is dropped.
    Materialized { path: PathBuf, _dir: Arc<TempDir> },
}

/// A file associated with a log entry.
#[derive(Clone)]
pub struct Attachment {
    source: Source,
    filename: Option<String>,
}

impl Attachment {
    /// An attachment read from `path` when it is uploaded.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Path(path.into()),
            filename: None,
        }
    }

    /// An in-memory attachment. A filename is required since nothing else
    /// names the content.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, filename: &str) -> Result<Self, OlogError> {
        Ok(Self {
            source: Source::Bytes(bytes.into()),
            filename: Some(required("attachment filename", filename)?),
        })
    }

    /// Override the name the server sees.
    pub fn with_filename(mut self, filename: &str) -> Result<Self, OlogError> {
        self.filename = Some(required("attachment filename", filename)?);
        Ok(self)
    }

    /// Write downloaded content to `<tempdir>/<filename>`.
    ///
    /// Only the final path component of `filename` is used.
    pub(crate) fn materialize(filename: &str, bytes: &[u8]) -> Result<Self, OlogError> {
        let name = basename(filename).unwrap_or_else(|| "attachment".to_string());
        let dir = tempfile::Builder::new().prefix("olog-").tempdir()?;
        let path = dir.path().join(&name);
        fs::write(&path, bytes)?;
        Ok(Self {
            source: Source::Materialized {
                path,
                _dir: Arc::new(dir),
            },
            filename: Some(name),
        })
    }

    /// Name sent to the server: the explicit filename if given, otherwise the
    /// final component of the path.
    pub fn filename(&self) -> String {
        if let Some(name) = self.filename.as_deref().and_then(basename) {
            return name;
        }
        match &self.source {
            Source::Path(path) | Source::Materialized { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string()),
            Source::Bytes(_) => "attachment".to_string(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        mime::guess_from_filename(&self.filename())
    }

    /// Local path of the content, if it lives on disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) | Source::Materialized { path, .. } => Some(path),
            Source::Bytes(_) => None,
        }
    }

    /// Read the full content.
    pub fn read(&self) -> Result<Vec<u8>, OlogError> {
        match &self.source {
            Source::Path(path) | Source::Materialized { path, .. } => Ok(fs::read(path)?),
            Source::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Attachment");
        dbg.field("filename", &self.filename());
        match &self.source {
            Source::Path(path) | Source::Materialized { path, .. } => dbg.field("path", path),
            Source::Bytes(bytes) => dbg.field("len", &bytes.len()),
        };
        dbg.finish()
    }
}

fn basename(name: &str) -> Option<String> {
    Path::new(name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// A timestamped, owned text record.
///
/// Built client-side with [`LogEntry::builder`]; `id`, `created_at` and
/// `modified_at` are only present on entries decoded from a server response.
#[derive(Debug, Clone)]
pub struct LogEntry {
    text: String,
    owner: String,
    logbooks: Vec<Logbook>,
    tags: Vec<Tag>,
    properties: Vec<Property>,
    attachments: Vec<Attachment>,
    id: Option<u64>,
    created_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
}

impl LogEntry {
    pub fn builder(text: &str) -> LogEntryBuilder {
        LogEntryBuilder {
            text: text.to_string(),
            owner: None,
            logbooks: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn logbooks(&self) -> &[Logbook] {
        &self.logbooks
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    /// Reconstruct an entry as reported by the server. Nothing is validated
    /// or sanitized here: stored entries come back exactly as the service
    /// holds them.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn persisted(
        text: &str,
        owner: &str,
        logbooks: Vec<Logbook>,
        tags: Vec<Tag>,
        properties: Vec<Property>,
        id: Option<u64>,
        created_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            text: text.to_string(),
            owner: owner.to_string(),
            logbooks,
            tags,
            properties,
            attachments: Vec::new(),
            id,
            created_at,
            modified_at,
        }
    }
}

/// Equal when text, owner and the sets of logbooks, tags and properties
/// match. Ids, timestamps and attachments are ignored.
impl PartialEq for LogEntry {
    fn eq(&self, other: &Self) -> bool {
        fn set<T: Ord>(items: &[T]) -> BTreeSet<&T> {
            items.iter().collect()
        }
        self.text == other.text
            && self.owner == other.owner
            && set(&self.logbooks) == set(&other.logbooks)
            && set(&self.tags) == set(&other.tags)
            && set(&self.properties) == set(&other.properties)
    }
}

impl Eq for LogEntry {}

/// Collects log entry fields; [`build`](Self::build) fills anything missing
/// from a [`ClientConfig`] and validates the result.
#[derive(Debug, Clone)]
pub struct LogEntryBuilder {
    text: String,
    owner: Option<String>,
    logbooks: Vec<Logbook>,
    tags: Vec<Tag>,
    properties: Vec<Property>,
    attachments: Vec<Attachment>,
}

impl LogEntryBuilder {
    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn logbook(mut self, logbook: Logbook) -> Self {
        push_unique(&mut self.logbooks, logbook);
        self
    }

    pub fn logbooks(self, logbooks: impl IntoIterator<Item = Logbook>) -> Self {
        logbooks.into_iter().fold(self, Self::logbook)
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        push_unique(&mut self.tags, tag);
        self
    }

    pub fn tags(self, tags: impl IntoIterator<Item = Tag>) -> Self {
        tags.into_iter().fold(self, Self::tag)
    }

    pub fn property(mut self, property: Property) -> Self {
        push_unique(&mut self.properties, property);
        self
    }

    pub fn properties(self, properties: impl IntoIterator<Item = Property>) -> Self {
        properties.into_iter().fold(self, Self::property)
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    /// Finish the entry.
    ///
    /// Without an explicit owner the configured username is used; without
    /// logbooks the configured logbook names are used (owned by the entry's
    /// owner); without tags the configured tags are used. Fails with
    /// [`OlogError::Validation`] when the text is empty after sanitizing, or
    /// when no owner or logbook can be determined.
    pub fn build(self, config: &ClientConfig) -> Result<LogEntry, OlogError> {
        let text = sanitize_text(&self.text);
        if text.is_empty() {
            return Err(OlogError::Validation(
                "log entry text must not be empty".to_string(),
            ));
        }

        let owner = match self.owner.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
            Some(owner) => owner.to_string(),
            None => config
                .default_owner()
                .map(str::to_string)
                .ok_or_else(|| OlogError::Validation("you must specify an owner".to_string()))?,
        };

        let mut logbooks = self.logbooks;
        if logbooks.is_empty() {
            for name in &config.logbooks {
                push_unique(&mut logbooks, Logbook::new(name, &owner)?);
            }
        }
        if logbooks.is_empty() {
            return Err(OlogError::Validation(
                "you must specify a logbook".to_string(),
            ));
        }

        let mut tags = self.tags;
        if tags.is_empty() {
            for name in &config.tags {
                push_unique(&mut tags, Tag::new(name)?);
            }
        }

        Ok(LogEntry {
            text,
            owner,
            logbooks,
            tags,
            properties: self.properties,
            attachments: self.attachments,
            id: None,
            created_at: None,
            modified_at: None,
        })
    }
}
