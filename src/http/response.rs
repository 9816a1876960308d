//! Gateway error responses.
//!
//! # Responsibilities
//! - Map every rejection in the pipeline to one HTTP status
//! - Render a small JSON error body with a fixed, generic message
//!
//! # Design Decisions
//! - The `Display` text of a `GatewayError` carries the underlying cause and
//!   is for server logs only; clients see `public_message()`
//! - Status mapping: 404 no route, 401 missing/malformed credentials,
//!   403 token not authenticated, 400 malformed request input,
//!   500 verifier or handler failure

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::auth::VerifierError;
use crate::routing::Operation;
use crate::transcode::TranscodeError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("missing or malformed bearer token")]
    Unauthenticated,

    #[error("token is not authenticated")]
    Denied,

    #[error("token validation failed: {0}")]
    Verifier(#[from] VerifierError),

    #[error("unreadable request body: {0}")]
    Body(String),

    #[error("invalid request: {0}")]
    InvalidRequest(#[source] TranscodeError),

    #[error("{operation} failed: {source}")]
    Handler {
        operation: Operation,
        #[source]
        source: TranscodeError,
    },

    #[error("no handler registered for operation '{0}'")]
    Unhandled(Operation),
}

impl GatewayError {
    /// Classify a transcoding failure as the client's or the gateway's.
    pub fn from_transcode(operation: Operation, err: TranscodeError) -> Self {
        if err.is_client_error() {
            GatewayError::InvalidRequest(err)
        } else {
            GatewayError::Handler {
                operation,
                source: err,
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::Denied => StatusCode::FORBIDDEN,
            GatewayError::Body(_) | GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Verifier(_)
            | GatewayError::Handler { .. }
            | GatewayError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::NotFound { .. } => "not found",
            GatewayError::Unauthenticated => "unauthorized",
            GatewayError::Denied => "forbidden",
            GatewayError::Verifier(_) => "token validation failed",
            GatewayError::Body(_) | GatewayError::InvalidRequest(_) => "invalid request",
            GatewayError::Handler { .. } | GatewayError::Unhandled(_) => "proxy operation failed",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.public_message(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    async fn body_of(err: GatewayError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        let not_found = GatewayError::NotFound {
            method: "GET".into(),
            path: "/nope".into(),
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::Denied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::Verifier(VerifierError::DeadlineExceeded).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::Unhandled(Operation::Get).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_transcode_classification() {
        let client = GatewayError::from_transcode(
            Operation::Rollback,
            TranscodeError::Capture {
                name: "revision",
                value: "x".into(),
            },
        );
        assert_eq!(client.status_code(), StatusCode::BAD_REQUEST);

        let server = GatewayError::from_transcode(
            Operation::Get,
            TranscodeError::Backend(BackendError::Transport("connection reset".into())),
        );
        assert_eq!(server.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(server.to_string(), "get failed: transport error: connection reset");
    }

    #[tokio::test]
    async fn test_body_never_leaks_cause() {
        let err = GatewayError::from_transcode(
            Operation::Get,
            TranscodeError::Backend(BackendError::Status {
                status: 500,
                message: "secret internal detail".into(),
            }),
        );

        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({ "error": { "code": 500, "message": "proxy operation failed" } })
        );
    }
}
