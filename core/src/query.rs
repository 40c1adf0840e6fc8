//! Search criteria for log entries and targets for deletion.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::OlogError;

/// Conjunctive search over log entries.
///
/// Each criterion is one query parameter; the service returns entries that
/// match all of them. Parameters are encoded in the order they were first
/// set, and setting the same criterion twice keeps the latest value.
///
/// ```
/// use olog_client::FindQuery;
///
/// let query = FindQuery::new().logbook("controls").tag("magnets");
/// assert_eq!(query.to_query_string(), "logbook=controls&tag=magnets");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindQuery {
    params: Vec<(&'static str, String)>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text search in the entry description. The service accepts `*`
    /// wildcards, e.g. `*Timing*`.
    pub fn search(self, text: &str) -> Self {
        self.set("search", text.to_string())
    }

    pub fn logbook(self, name: &str) -> Self {
        self.set("logbook", name.trim().to_string())
    }

    pub fn tag(self, name: &str) -> Self {
        self.set("tag", name.trim().to_string())
    }

    pub fn property(self, name: &str) -> Self {
        self.set("property", name.trim().to_string())
    }

    /// Only entries created at or after `time`.
    pub fn start(self, time: DateTime<Utc>) -> Self {
        self.set("start", time.timestamp().to_string())
    }

    /// Only entries created at or before `time`.
    pub fn end(self, time: DateTime<Utc>) -> Self {
        self.set("end", time.timestamp().to_string())
    }

    pub fn page(self, page: u32) -> Self {
        self.set("page", page.to_string())
    }

    pub fn limit(self, limit: u32) -> Self {
        self.set("limit", limit.to_string())
    }

    fn set(mut self, key: &'static str, value: String) -> Self {
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    /// URL-encoded `key=value` pairs joined with `&`.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// The one thing a delete call removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    LogEntry(u64),
    Logbook(String),
    Tag(String),
    /// Removes the property from every log entry that carries it.
    Property(String),
}

impl DeleteTarget {
    pub fn logbook(name: &str) -> Result<Self, OlogError> {
        named("logbook", name).map(DeleteTarget::Logbook)
    }

    pub fn tag(name: &str) -> Result<Self, OlogError> {
        named("tag", name).map(DeleteTarget::Tag)
    }

    pub fn property(name: &str) -> Result<Self, OlogError> {
        named("property", name).map(DeleteTarget::Property)
    }

    /// Fails for a blank name, which would address the whole collection
    /// instead of one member.
    pub fn check(&self) -> Result<(), OlogError> {
        match self {
            DeleteTarget::LogEntry(_) => Ok(()),
            DeleteTarget::Logbook(name) => named("logbook", name).map(drop),
            DeleteTarget::Tag(name) => named("tag", name).map(drop),
            DeleteTarget::Property(name) => named("property", name).map(drop),
        }
    }

    /// Parse string-keyed criteria such as command-line flags.
    ///
    /// Exactly one of `logEntryId`, `logbookName`, `tagName` or
    /// `propertyName` must be given.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, OlogError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(K, V)> = pairs.into_iter().collect();
        let [(key, value)] = pairs.as_slice() else {
            return Err(OlogError::Usage(format!(
                "delete takes exactly one logbook, tag, property or log entry, got {} criteria",
                pairs.len()
            )));
        };
        let value = value.as_ref().trim();
        match key.as_ref() {
            "logEntryId" => value.parse().map(DeleteTarget::LogEntry).map_err(|_| {
                OlogError::Usage(format!("logEntryId must be a number, got '{value}'"))
            }),
            "logbookName" => DeleteTarget::logbook(value),
            "tagName" => DeleteTarget::tag(value),
            "propertyName" => DeleteTarget::property(value),
            other => Err(OlogError::Usage(format!(
                "unknown key '{other}', use logEntryId, logbookName, tagName or propertyName"
            ))),
        }
    }
}

fn named(kind: &str, name: &str) -> Result<String, OlogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(OlogError::Usage(format!("{kind} name to delete must not be empty")));
    }
    Ok(name.to_string())
}

impl fmt::Display for DeleteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteTarget::LogEntry(id) => write!(f, "log entry {id}"),
            DeleteTarget::Logbook(name) => write!(f, "logbook '{name}'"),
            DeleteTarget::Tag(name) => write!(f, "tag '{name}'"),
            DeleteTarget::Property(name) => write!(f, "property '{name}'"),
        }
    }
}
