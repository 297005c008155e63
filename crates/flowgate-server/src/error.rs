// crates/flowgate-server/src/error.rs
// ============================================================================
// Module: HTTP Error Mapping
// Description: Maps the platform error taxonomy onto HTTP responses.
// Purpose: Keep status-code decisions at the boundary, nowhere else.
// Dependencies: axum, flowgate-core, serde_json
// ============================================================================

//! ## Overview
//! [`HttpError`] wraps [`ApiError`] and renders the JSON error body clients
//! see: `{"error": {"kind", "message"}}` plus per-kind headers (rate-limit
//! responses carry `Retry-After`). Handlers return `Result<_, HttpError>`
//! and use `?` on anything producing an [`ApiError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::IntoResponse;
use axum::response::Response;
use flowgate_core::ApiError;
use serde_json::json;

// ============================================================================
// SECTION: HTTP Error
// ============================================================================

/// Boundary wrapper rendering [`ApiError`] as an HTTP response.
///
/// # Invariants
/// - Authentication failures never reveal whether the account exists.
#[derive(Debug)]
pub struct HttpError(pub ApiError);

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<flowgate_core::StoreError> for HttpError {
    fn from(err: flowgate_core::StoreError) -> Self {
        Self(ApiError::from(err))
    }
}

impl HttpError {
    /// Returns the status code for the wrapped kind.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) | ApiError::InvalidGraph(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited {
                ..
            } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the stable kind label used in the body.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match &self.0 {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation(_) => "validation",
            ApiError::RateLimited {
                ..
            } => "rate_limited",
            ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
            ApiError::Timeout(_) => "timeout",
            ApiError::InvalidGraph(_) => "invalid_graph",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.0.to_string(),
            }
        }));
        let mut response = (status, body).into_response();
        if let ApiError::RateLimited {
            retry_after_secs,
        } = &self.0
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}
