//! Structured error types for turnscribe-core.
//!
//! Uses `thiserror` for better API surface and error composition.
//! The binary crate (turnscribe-cli) can still use `anyhow` for
//! convenience, but library consumers get structured errors.

use std::io;
use thiserror::Error;

/// Main error type for export pipeline operations
#[derive(Error, Debug)]
pub enum ExportError {
    /// No credential available; the export cannot proceed
    #[error("no credential available for backend request")]
    Unauthorized,

    /// Backend responded with a non-success status
    #[error("backend request failed with status {status}: {context}")]
    Transport { status: u16, context: String },

    /// Request never produced a response (connect/timeout/TLS)
    #[error("backend request failed: {reason}")]
    Network { reason: String },

    /// The active conversation changed while the fetch was in flight
    #[error("stale result: fetched {fetched} but active conversation is now {active}")]
    StaleResult { fetched: String, active: String },

    /// A single node failed to parse; recovered locally by the caller
    #[error("failed to process {kind} node {node_id}: {reason}")]
    Item {
        kind: &'static str,
        node_id: String,
        reason: String,
    },

    /// No conversation id was supplied and none is active
    #[error("no conversation id available to export")]
    NoConversation,

    /// Configuration error
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },
}

/// Result type alias for export pipeline operations
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Create a transport error from a response status
    pub fn transport(status: u16, context: impl Into<String>) -> Self {
        Self::Transport {
            status,
            context: context.into(),
        }
    }

    /// Create a per-item error for a node that failed to parse
    pub fn item(kind: &'static str, node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Item {
            kind,
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Transport {
                status: status.as_u16(),
                context: err.to_string(),
            },
            None => Self::Network {
                reason: err.to_string(),
            },
        }
    }
}
