//! Error types for the Olog client.
//!
//! # Design
//! Every non-2xx response lands in `HttpStatus` with the raw status code and
//! body. The client never retries and never interprets status codes beyond
//! success/failure, so there is no dedicated "not found" variant. Errors that
//! happen before any request is sent (validation, usage, configuration) have
//! their own variants so callers can tell "you asked for something invalid"
//! apart from "the server said no".

use thiserror::Error;

/// Errors returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum OlogError {
    /// A domain object is missing a mandatory field (owner, logbook, name,
    /// text), or the client has no base URL.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Credentials could not be obtained from a source that was expected to
    /// provide them.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The operation was called with an unusable combination of arguments.
    #[error("incorrect usage: {0}")]
    Usage(String),

    /// The server could not be reached at the transport level.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The response body could not be decoded into the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Reading or writing an attachment file failed.
    #[error("attachment I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration sources could not be merged or extracted.
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
}

impl OlogError {
    /// The HTTP status carried by an `HttpStatus` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            OlogError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
