use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use umlforge_orchestrator::OrchestratorError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        warn!(%error, "rejecting malformed multipart body");
        Self::new(error.status(), error.body_text())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        let status = match &error {
            OrchestratorError::Validation(_) | OrchestratorError::Encoding { .. } => {
                StatusCode::BAD_REQUEST
            }
            OrchestratorError::UpstreamUnavailable(_)
            | OrchestratorError::UpstreamStatus { .. }
            | OrchestratorError::StreamInterrupted(_)
            | OrchestratorError::MalformedUpstreamLine(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_client_error() {
            warn!(%error, "rejecting request");
        } else {
            error!(error = ?error, "orchestrator error");
        }
        Self::new(status, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let error = ApiError::from(OrchestratorError::validation("too many images"));
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.message, "too many images");

        let error = ApiError::from(OrchestratorError::Encoding {
            index: 2,
            reason: "empty upload".into(),
        });
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let error = ApiError::from(OrchestratorError::UpstreamStatus {
            status: 500,
            body: "boom".into(),
        });
        assert_eq!(error.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn remaining_errors_map_to_internal_error() {
        let error = ApiError::from(OrchestratorError::CallerDisconnected);
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
