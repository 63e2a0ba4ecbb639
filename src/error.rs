//! Error taxonomy for the contents backend
//!
//! Every failure surfaces to the caller as a terminal, user-visible
//! error carrying an HTTP-style status code and message; nothing is
//! retried at this layer. Transient store failures arrive here as
//! `Backend` errors, indistinguishable from permanent ones.

use actix_web::http::StatusCode;
use actix_web::ResponseError;
use thiserror::Error;

/// Failures surfaced by the contents and checkpoint layers
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad root configuration; fatal at construction time.
    #[error("unexpected scheme in '{uri}', expected s3://")]
    InvalidUriScheme { uri: String },

    /// Requested key absent from the store.
    #[error("{0} not found")]
    NotFound(String),

    /// Fetch succeeded but the payload failed to parse or decode.
    #[error("unreadable content: {0}")]
    UnreadableContent(String),

    /// Save requested with a format this store cannot persist.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Rename/copy destination already occupied.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store returned a last-modified string not matching the
    /// expected format for the API path that produced it.
    #[error("unparseable last-modified '{raw}': {reason}")]
    TimestampParse { raw: String, reason: String },

    /// Malformed request input (missing content, bad model fields).
    #[error("{0}")]
    BadRequest(String),

    /// Object store I/O failure, surfaced verbatim.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::UnreadableContent(_)
            | StoreError::UnsupportedFormat(_)
            | StoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StoreError::InvalidUriScheme { .. }
            | StoreError::TimestampParse { .. }
            | StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
