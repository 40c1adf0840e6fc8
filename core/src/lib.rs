//! Blocking client for the Olog electronic logbook service.
//!
//! # Overview
//! The Olog keeps log entries, the logbooks and tags they are filed under,
//! structured properties, and file attachments behind an HTTP/JSON API. This
//! crate maps those resources to typed values and back, and runs the
//! sequences of calls some operations need (creating an entry, then uploading
//! its attachments).
//!
//! # Design
//! - [`OlogApi`] builds `HttpRequest` values and parses `HttpResponse` values
//!   without touching the network, so every request and every decoding rule
//!   can be tested as plain data.
//! - [`OlogClient`] drives those requests through a [`Transport`]; the
//!   default one is a blocking `ureq` agent.
//! - Configuration is an explicit [`ClientConfig`] value, loaded with figment
//!   from TOML files and `OLOG_*` environment variables.
//! - Passwords are looked up through a [`CredentialChain`] of
//!   [`CredentialSource`]s.

pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod mime;
pub mod query;
pub mod transport;
pub mod types;

pub use api::OlogApi;
pub use client::{ClientBuilder, OlogClient};
pub use codec::{AttachmentInfo, Wire};
pub use config::ClientConfig;
pub use credentials::{CredentialChain, CredentialSource, Credentials};
pub use error::OlogError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{DeleteTarget, FindQuery};
pub use transport::{Transport, UreqTransport};
pub use types::{Attachment, LogEntry, LogEntryBuilder, Logbook, Property, Tag};
