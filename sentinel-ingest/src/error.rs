// sentinel-ingest/src/error.rs
// ============================================================================
// Module: Ingest Error Mapping
// Description: Maps `SentinelError` (and the gateway's own auth/validation
// failures) onto the HTTP status codes of §6/§7.
// Purpose: Give every handler one `Result<_, IngestError>` return type
// instead of hand-rolling a status code at each call site.
// Dependencies: axum, sentinel-contract
// ============================================================================

use axum::Json;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use sentinel_contract::SentinelError;
use serde_json::json;
use thiserror::Error;

/// Errors a handler can return; every variant carries its own HTTP mapping
/// (§7).
#[derive(Debug, Error)]
pub enum IngestError {
    /// Propagated from the storage/guardrail layers.
    #[error(transparent)]
    Store(#[from] SentinelError),
    /// The request body failed to deserialize.
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    /// `Authorization` header missing or not a recognised bearer scheme.
    #[error("missing or malformed authorization header")]
    MissingCredential,
    /// Presented key does not match any stored hash, or is revoked.
    #[error("invalid or revoked api key")]
    InvalidCredential,
    /// Path/resource owned by another tenant or absent.
    #[error("not found")]
    NotFound,
}

impl IngestError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) => StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential | Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        let mut response = (status, body).into_response();
        if let Self::Store(SentinelError::RateLimit { retry_after_secs }) = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                let headers: &mut HeaderMap = response.headers_mut();
                headers.insert("retry-after", value);
            }
        }
        response
    }
}
