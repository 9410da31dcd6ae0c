//! Error types for playlist-dl
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error types (input validation, resolution, fetch, archival)
//! - HTTP status code mapping for the embedding API layer
//! - Structured error responses with machine-readable error codes
//! - Context information (collection URL, file path, tool name, etc.)
//!
//! Per-item fetch failures are deliberately NOT represented here as operation
//! errors: a single item failing inside a batch is expected data, carried in
//! [`crate::types::DownloadOutcome`] and aggregated into a
//! [`crate::types::BatchSummary`]. Only operation-level failures surface as
//! [`Error`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for playlist-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playlist-dl
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed collection URL or missing required query component
    /// (e.g., no `list` identifier). Surfaced immediately, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The listing call returned no data or the remote source rejected the
    /// collection URL.
    #[error("collection unavailable for {url}: {reason}")]
    CollectionUnavailable {
        /// The collection URL that could not be resolved
        url: String,
        /// Why resolution failed (empty listing, tool error, parse failure)
        reason: String,
    },

    /// Media fetch failure that must surface at operation level
    /// (metadata path, service construction). Per-item fetch failures inside
    /// a batch never take this path.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error while writing the archive. The source files that would have
    /// been included are preserved on disk.
    #[error("archive write failed at {path}: {reason}")]
    ArchiveWriteFailed {
        /// The archive path that could not be written
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// The working directory cannot be created or written. Raised before any
    /// fetch is attempted.
    #[error("destination unwritable at {path}: {reason}")]
    DestinationUnwritable {
        /// The directory that could not be used
        path: PathBuf,
        /// The reason the directory is unusable
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new download operations
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,
}

/// Fetch-layer errors produced when invoking the external media tool
///
/// These classify one invocation of the media source. Inside a batch they are
/// folded into per-item outcomes; they only escalate to [`Error::Fetch`] on
/// paths where the operation cannot proceed without the tool's answer.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The configured media tool binary was not found on this host
    #[error("media tool not found: {tool}")]
    ToolNotFound {
        /// The binary name or path that was looked up
        tool: String,
    },

    /// The media tool process could not be spawned
    #[error("failed to spawn {tool}: {reason}")]
    Spawn {
        /// The binary that failed to start
        tool: String,
        /// The spawn failure reason
        reason: String,
    },

    /// The media tool exited with a failure status
    #[error("media tool exited with status {code:?}: {stderr_tail}")]
    ExitStatus {
        /// The process exit code, if one was reported
        code: Option<i32>,
        /// The trailing lines of stderr, kept for diagnosis
        stderr_tail: String,
    },

    /// The remote content is permanently unavailable (removed, private,
    /// region-locked). Retrying cannot succeed.
    #[error("content unavailable: {reason}")]
    Unavailable {
        /// The upstream-reported reason
        reason: String,
    },

    /// The tool produced output that could not be parsed
    #[error("malformed tool output: {reason}")]
    MalformedOutput {
        /// The parse failure description
        reason: String,
    },

    /// The operation was cancelled between attempts
    #[error("fetch cancelled")]
    Cancelled,
}

/// API error response format
///
/// This structure is returned by the embedding API layer when an operation
/// fails. It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details. The crate does
/// not own any routes; it only supplies the payload shape and the
/// [`ToHttpStatus`] mapping.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "collection_unavailable",
///     "message": "collection unavailable for https://...: empty listing",
///     "details": {
///       "url": "https://..."
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "invalid_input", "collection_unavailable")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    ///
    /// This can include fields like the collection URL, archive path, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create a "service unavailable" error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::InvalidInput(_) => 400,

            // 404 Not Found - the collection (or its content) does not resolve
            Error::CollectionUnavailable { .. } => 404,
            Error::Fetch(FetchError::Unavailable { .. }) => 404,

            // 500 Internal Server Error - Server-side issues
            Error::ArchiveWriteFailed { .. } => 500,
            Error::DestinationUnwritable { .. } => 500,
            Error::Io(_) => 500,
            Error::Fetch(FetchError::Spawn { .. }) => 500,

            // 502 Bad Gateway - the external tool failed mid-conversation
            Error::Fetch(FetchError::ExitStatus { .. }) => 502,
            Error::Fetch(FetchError::MalformedOutput { .. }) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::Fetch(FetchError::ToolNotFound { .. }) => 503,
            Error::Fetch(FetchError::Cancelled) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::CollectionUnavailable { .. } => "collection_unavailable",
            Error::Fetch(e) => match e {
                FetchError::ToolNotFound { .. } => "tool_not_found",
                FetchError::Spawn { .. } => "spawn_failed",
                FetchError::ExitStatus { .. } => "fetch_failed",
                FetchError::Unavailable { .. } => "content_unavailable",
                FetchError::MalformedOutput { .. } => "malformed_output",
                FetchError::Cancelled => "cancelled",
            },
            Error::ArchiveWriteFailed { .. } => "archive_write_failed",
            Error::DestinationUnwritable { .. } => "destination_unwritable",
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::CollectionUnavailable { url, .. } => Some(serde_json::json!({
                "url": url,
            })),
            Error::ArchiveWriteFailed { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            Error::DestinationUnwritable { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            Error::Fetch(FetchError::ToolNotFound { tool }) => Some(serde_json::json!({
                "tool": tool,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
