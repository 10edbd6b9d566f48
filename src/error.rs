//! Error types for sticker-porter
//!
//! The taxonomy mirrors how callers need to react:
//! - [`Error::PackNotFound`] — the user typed a pack name Telegram does not
//!   know; recoverable, callers re-prompt.
//! - [`Error::Transport`] — network failure, non-2xx status, or a response
//!   whose shape does not match the documented API; surfaced as a generic
//!   failure.
//! - [`Error::UnsupportedFormat`] — one sticker's bytes cannot be decoded;
//!   attributable to that sticker, never fatal to the batch.

use thiserror::Error;

/// Result type alias for sticker-porter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sticker-porter
#[derive(Debug, Error)]
pub enum Error {
    /// The named sticker pack does not exist on Telegram
    #[error("sticker pack not found: {name}")]
    PackNotFound {
        /// The pack name the user supplied
        name: String,
    },

    /// Failure talking to either platform (network, non-2xx, bad shape)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Sticker bytes could not be decoded into an image
    #[error("unsupported sticker format: {0}")]
    UnsupportedFormat(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive construction failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A spawned pipeline task panicked or was aborted
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Transport-level failures against the Telegram or TamTam APIs
///
/// [`TransportError::Asset`] wraps any of the others with the sticker id the
/// failure belongs to, so the pipeline can report one bad sticker without
/// losing the rest of the pack.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request itself failed (DNS, connect, timeout, ...)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered with an unexpected status code
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (or API error description) for diagnostics
        body: String,
    },

    /// The response did not match the documented shape
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// What was missing or mis-typed
        reason: String,
    },

    /// A per-sticker failure, tagged with the sticker id
    #[error("asset {id}: {source}")]
    Asset {
        /// Telegram file id of the sticker the failure belongs to
        id: String,
        /// The underlying transport failure
        source: Box<TransportError>,
    },
}

impl TransportError {
    /// Tag this failure with the sticker id it belongs to
    pub fn for_asset(self, id: impl Into<String>) -> Self {
        TransportError::Asset {
            id: id.into(),
            source: Box::new(self),
        }
    }
}
