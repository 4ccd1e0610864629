//! Error types for the relay.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`RelayError::code()`].

use std::fmt;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// A required credential or configuration value is missing or unreadable.
    pub const CONFIG_MISSING: &str = "CONFIG_MISSING";

    /// A completion was requested without any conversation turns.
    pub const EMPTY_REQUEST: &str = "EMPTY_REQUEST";

    /// An upstream provider or the vector index failed.
    pub const UPSTREAM_FAILED: &str = "UPSTREAM_FAILED";

    /// The caller violated an input contract detected locally.
    pub const INVALID_INPUT: &str = "INVALID_INPUT";

    /// Filesystem error.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// The external service an [`RelayError::Upstream`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamService {
    /// Chat completion endpoint.
    Completion,
    /// Speech-to-text endpoint.
    Transcription,
    /// Embedding endpoint.
    Embedding,
    /// Text-to-speech endpoint.
    Speech,
    /// Vector index (Qdrant REST API).
    VectorIndex,
}

impl UpstreamService {
    /// Short lowercase name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Transcription => "transcription",
            Self::Embedding => "embedding",
            Self::Speech => "speech",
            Self::VectorIndex => "vector index",
        }
    }
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the relay core.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A required credential is missing. Raised before any network attempt.
    #[error("[{}] {}", error_codes::CONFIG_MISSING, .0)]
    Configuration(String),

    /// A completion was requested with zero conversation turns.
    #[error("[{}] {}", error_codes::EMPTY_REQUEST, .0)]
    EmptyRequest(String),

    /// Non-success HTTP status, transport failure, or unreadable response body.
    ///
    /// `status` is `None` when the failure happened below HTTP (connect, read,
    /// decode) and no status line was available.
    #[error(
        "[{}] {service} request failed{}: {detail}",
        error_codes::UPSTREAM_FAILED,
        status_suffix(.status)
    )]
    Upstream {
        /// Which external service failed.
        service: UpstreamService,
        /// HTTP status code, when one was received.
        status: Option<u16>,
        /// Best-effort decoded response body or transport error message.
        detail: String,
    },

    /// Caller-side contract violation detected before any network call.
    #[error("[{}] {}", error_codes::INVALID_INPUT, .0)]
    InvalidInput(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

impl RelayError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => error_codes::CONFIG_MISSING,
            Self::EmptyRequest(_) => error_codes::EMPTY_REQUEST,
            Self::Upstream { .. } => error_codes::UPSTREAM_FAILED,
            Self::InvalidInput(_) => error_codes::INVALID_INPUT,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Build an upstream error from a non-success HTTP status and its body.
    pub fn upstream_status(service: UpstreamService, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status: Some(status),
            detail: body.into(),
        }
    }

    /// Build an upstream error for a transport or protocol failure.
    pub fn upstream_transport(service: UpstreamService, detail: impl fmt::Display) -> Self {
        Self::Upstream {
            service,
            status: None,
            detail: detail.to_string(),
        }
    }

    /// HTTP status carried by an upstream error, if any.
    pub fn upstream_status_code(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, RelayError>;
