// crates/flowgate-server/src/routes/ip_allowlist.rs
// ============================================================================
// Module: IP Allowlist Routes
// Description: Per-user allowlist management and current-IP echo.
// Purpose: Manage the addresses the policy gate accepts for opted-in users.
// Dependencies: axum, flowgate-core, crate::{extract, state}
// ============================================================================

//! ## Overview
//! Entries are stored in the same canonical textual form the gate derives
//! for incoming requests, so equality is exact. The current-IP endpoint
//! echoes the derived address back so users can allowlist themselves before
//! opting in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use axum::Extension;
use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use flowgate_core::ApiError;
use flowgate_core::IpAllowlistEntry;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::error::HttpError;
use crate::extract::RequestContext;
use crate::state::AppState;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Allowlist entry payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEntryRequest {
    /// Address to allow.
    pub ip_address: String,
    /// Operator note.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /ip-whitelist` — the caller's entries.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<IpAllowlistEntry>>, HttpError> {
    Ok(Json(state.store.list_ip_allowlist(principal.user_id)?))
}

/// `POST /ip-whitelist` — add an entry in canonical form.
pub async fn add(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<AddEntryRequest>,
) -> Result<Response, HttpError> {
    let parsed: IpAddr = request
        .ip_address
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation("ip address is malformed".to_string()))?;
    let canonical = match parsed {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or_else(|| v6.to_string(), |mapped| mapped.to_string()),
        IpAddr::V4(v4) => v4.to_string(),
    };
    let entry = state.store.add_ip_allowlist_entry(
        principal.user_id,
        &canonical,
        request.description.as_deref(),
        Timestamp::now(),
    )?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "ip_allowlist.add",
            target_type: Some("ip_allowlist"),
            target_id: Some(entry.id.to_string()),
            route: "/ip-whitelist",
            method: "POST",
            status_code: 201,
            metadata: Some(json!({ "ip": canonical })),
        },
    );
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

/// `DELETE /ip-whitelist/{id}` — remove an entry.
pub async fn remove(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(entry_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    state.store.remove_ip_allowlist_entry(principal.user_id, entry_id)?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "ip_allowlist.remove",
            target_type: Some("ip_allowlist"),
            target_id: Some(entry_id.to_string()),
            route: "/ip-whitelist/{id}",
            method: "DELETE",
            status_code: 204,
            metadata: None,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /ip-whitelist/current-ip` — echo the derived client address.
pub async fn current_ip(
    Extension(context): Extension<RequestContext>,
) -> Json<serde_json::Value> {
    Json(json!({ "currentIp": context.client_ip }))
}
