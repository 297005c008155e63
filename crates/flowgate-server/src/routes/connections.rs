// crates/flowgate-server/src/routes/connections.rs
// ============================================================================
// Module: Connection Routes
// Description: Encrypted provider credential management.
// Purpose: Create and list the credential blobs provider nodes execute with.
// Dependencies: axum, flowgate-core, crate::{audit, state}
// ============================================================================

//! ## Overview
//! A connection is the encrypted credential blob backing dotted provider
//! operations. The raw configuration is sealed by the vault before it
//! reaches the store and is never returned by reads; listings expose
//! metadata only. With no vault key configured, creation fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use flowgate_core::ApiError;
use flowgate_core::Connection;
use flowgate_core::ConnectionEnv;
use flowgate_core::ConnectionId;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::error::HttpError;
use crate::extract::RequestContext;
use crate::state::AppState;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Connection creation payload.
#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    /// Provider label (`mtn`, `flutterwave`, …).
    pub provider: String,
    /// Target environment label; `sandbox` when absent.
    #[serde(default)]
    pub env: Option<String>,
    /// Display label.
    pub label: String,
    /// Raw credential configuration; sealed before storage.
    pub config: Value,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /connections` — seal and store provider credentials.
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CreateConnectionRequest>,
) -> Result<Response, HttpError> {
    let provider = request.provider.trim().to_ascii_lowercase();
    if provider.is_empty() {
        return Err(ApiError::Validation("provider must not be empty".to_string()).into());
    }
    let env = match request.env.as_deref() {
        None => ConnectionEnv::Sandbox,
        Some(raw) => ConnectionEnv::parse(raw)
            .ok_or_else(|| ApiError::Validation(format!("unknown env: {raw}")))?,
    };
    let Some(vault) = &state.vault else {
        return Err(ApiError::Internal("secret vault key not configured".to_string()).into());
    };
    let config_enc = vault
        .encrypt_value(&request.config)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let connection = Connection {
        id: ConnectionId::generate(),
        owner_user_id: principal.user_id,
        provider,
        env,
        label: request.label,
        config_enc,
        created_at: Timestamp::now(),
    };
    state.store.create_connection(&connection)?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "connection.create",
            target_type: Some("connection"),
            target_id: Some(connection.id.to_string()),
            route: "/connections",
            method: "POST",
            status_code: 201,
            metadata: Some(json!({ "provider": connection.provider })),
        },
    );
    Ok((StatusCode::CREATED, Json(connection_metadata(&connection))).into_response())
}

/// `GET /connections` — the caller's connections, ciphertext omitted.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Value>>, HttpError> {
    let connections = state.store.list_connections(principal.user_id)?;
    Ok(Json(connections.iter().map(connection_metadata).collect()))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Metadata view of a connection; the encrypted blob never leaves the store
/// through the API.
fn connection_metadata(connection: &Connection) -> Value {
    json!({
        "id": connection.id,
        "provider": connection.provider,
        "env": connection.env.as_str(),
        "label": connection.label,
        "createdAt": connection.created_at,
    })
}
