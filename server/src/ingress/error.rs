//! Ingress Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::adapters::{AdapterError, UnknownProvider};
use crate::store::StoreError;

/// Request-pipeline error types.
#[derive(Debug, Error)]
pub enum IngressError {
    /// The path's provider tag is not a known provider.
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),

    /// No endpoint exists for the given public key.
    #[error("Unknown endpoint")]
    UnknownEndpoint,

    /// The endpoint exists but has been deactivated.
    #[error("Endpoint is inactive")]
    EndpointInactive,

    /// The endpoint's provider does not match the path's provider tag.
    #[error("Endpoint provider does not match request path")]
    ProviderMismatch,

    /// Subscriber token missing or wrong.
    #[error("Invalid subscriber token")]
    SubscriberTokenInvalid,

    /// Adapter verification or parse failure.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Endpoint store failure.
    #[error("Endpoint store error")]
    Store(#[from] StoreError),
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::UnknownProvider(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PROVIDER"),
            Self::UnknownEndpoint => (StatusCode::NOT_FOUND, "UNKNOWN_ENDPOINT"),
            Self::EndpointInactive => (StatusCode::FORBIDDEN, "ENDPOINT_INACTIVE"),
            Self::ProviderMismatch => (StatusCode::BAD_REQUEST, "PROVIDER_MISMATCH"),
            Self::SubscriberTokenInvalid => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            Self::Adapter(err) => {
                let code = match err.status() {
                    StatusCode::BAD_REQUEST => "MALFORMED_BODY",
                    _ => "VERIFICATION_FAILED",
                };
                (err.status(), code)
            }
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type for ingress operations.
pub type IngressResult<T> = Result<T, IngressError>;
