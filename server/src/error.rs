//! Error Taxonomy
//!
//! One error type shared by the gate, the storage layer, and the HTTP
//! surface. Path-safety rejections and out-of-scope lookups are both
//! surfaced as 404 so a caller cannot distinguish "hidden from you"
//! from "does not exist".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors that can occur during media and attachment operations.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Validation error (size, content, request shape).
    #[error("Validation error: {0}")]
    Validation(String),

    /// File too large.
    #[error("File too large (max: {max_kb} KB)")]
    TooLarge {
        /// Maximum allowed size in kilobytes.
        max_kb: u64,
    },

    /// Invalid MIME type.
    #[error("Invalid file type: {mime_type}")]
    InvalidMimeType {
        /// The rejected MIME type.
        mime_type: String,
    },

    /// No file provided.
    #[error("No file provided")]
    NoFile,

    /// Invalid filename.
    #[error("Invalid filename")]
    InvalidFilename,

    /// Caller lacks a required capability.
    #[error("Access denied")]
    AccessDenied,

    /// Record or file not found (or hidden by scoping).
    #[error("Not found")]
    NotFound,

    /// Path rejected by the path-safety guard.
    ///
    /// Logged as a security-relevant event where it is raised; the HTTP
    /// response is indistinguishable from [`Self::NotFound`].
    #[error("Unsafe path")]
    PathUnsafe,

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error.
    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                self.to_string(),
            ),
            Self::TooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                self.to_string(),
            ),
            Self::InvalidMimeType { .. } => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "INVALID_MIME_TYPE",
                self.to_string(),
            ),
            Self::NoFile => (StatusCode::BAD_REQUEST, "NO_FILE", self.to_string()),
            Self::InvalidFilename => (
                StatusCode::BAD_REQUEST,
                "INVALID_FILENAME",
                self.to_string(),
            ),
            Self::AccessDenied => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            // PathUnsafe deliberately maps to the NotFound body: echoing
            // why a path was rejected would aid enumeration.
            Self::NotFound | Self::PathUnsafe => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Not found".to_string())
            }
            Self::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Storage operation failed, try again".to_string(),
            ),
            Self::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database operation failed".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
