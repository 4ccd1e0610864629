//! HTTP mapping for [`RelayError`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// JSON error envelope returned by every failing route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `UPSTREAM_FAILED`.
    pub code: String,
    pub message: String,
}

impl RelayError {
    /// HTTP status reported for this error.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::EmptyRequest(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&RelayError> for ErrorResponse {
    fn from(err: &RelayError) -> Self {
        Self {
            error: ErrorBody {
                code: err.code().to_owned(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "request failed");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamService;

    #[test]
    fn status_mapping() {
        assert_eq!(
            RelayError::EmptyRequest("x".into()).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::InvalidInput("x".into()).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::Configuration("x".into()).http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RelayError::upstream_status(UpstreamService::Speech, 500, "boom").http_status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn envelope_carries_code() {
        let body = ErrorResponse::from(&RelayError::EmptyRequest("no turns".into()));
        assert_eq!(body.error.code, "EMPTY_REQUEST");
        assert!(body.error.message.contains("no turns"));
    }
}
