// crates/flowgate-server/src/routes/sandbox.rs
// ============================================================================
// Module: Sandbox Fetch Passthrough
// Description: Policed GET proxy for the graph editor's sandbox.
// Purpose: Let the editor preview external responses without leaving policy.
// Dependencies: axum, flowgate-core, flowgate-providers, crate::state
// ============================================================================

//! ## Overview
//! The editor sandbox previews what an HTTP action would see. The
//! passthrough issues a policed GET through the same outbound client (and
//! therefore the same SSRF guard) as every other platform call, with its
//! own 10-second deadline, and returns the protocol response as data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use flowgate_core::ApiError;
use flowgate_providers::OutboundError;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::error::HttpError;
use crate::state::AppState;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Sandbox fetch payload.
#[derive(Debug, Deserialize)]
pub struct SandboxFetchRequest {
    /// Target URL.
    pub url: String,
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// `POST /sandbox/fetch` — policed GET returning `{status, body, headers}`.
pub async fn fetch(
    State(state): State<AppState>,
    Json(request): Json<SandboxFetchRequest>,
) -> Result<Json<Value>, HttpError> {
    let headers = std::collections::BTreeMap::new();
    let response = state
        .outbound
        .get(&request.url, &headers, state.sandbox_fetch_timeout)
        .await
        .map_err(|err| match err {
            OutboundError::Timeout(detail) => ApiError::Timeout(detail),
            OutboundError::Policy(policy) => ApiError::Validation(policy.to_string()),
            OutboundError::InvalidRequest(detail) => ApiError::Validation(detail),
            other => ApiError::UpstreamUnavailable(other.to_string()),
        })?;
    Ok(Json(json!({
        "status": response.status,
        "body": response.body,
        "headers": response.headers,
    })))
}
