// crates/flowgate-server/src/routes/integrations.rs
// ============================================================================
// Module: Integration Routes
// Description: Integration CRUD and verification entry points.
// Purpose: Feed the verification worker and expose integration health.
// Dependencies: axum, flowgate-core, flowgate-verify, crate::{audit, state}
// ============================================================================

//! ## Overview
//! Creating an integration (or hitting its verify endpoint) hands a probe
//! job to the verification worker: the row is `pending` before the response
//! leaves, and the worker settles it after the deferral. The supplied API
//! key is probe material only; it is never persisted on the integration
//! row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Extension;
use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use flowgate_core::ApiError;
use flowgate_core::Integration;
use flowgate_core::IntegrationId;
use flowgate_core::IntegrationStatus;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use flowgate_verify::VerificationRequest;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::error::HttpError;
use crate::extract::RequestContext;
use crate::state::AppState;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Integration creation payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntegrationRequest {
    /// Display name, unique per org case-insensitively.
    pub name: String,
    /// Credential to probe with; not persisted.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Probe URL override.
    #[serde(default)]
    pub test_url: Option<String>,
}

/// Integration update payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIntegrationRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New probe URL override.
    #[serde(default)]
    pub test_url: Option<String>,
}

/// Verification payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIntegrationRequest {
    /// Credential to probe with; not persisted.
    pub api_key: String,
    /// Probe URL override for this run.
    #[serde(default)]
    pub test_url: Option<String>,
}

// ============================================================================
// SECTION: CRUD
// ============================================================================

/// `POST /integrations` — create the row and, when a key is supplied, start
/// verification immediately.
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CreateIntegrationRequest>,
) -> Result<Response, HttpError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("integration name must not be empty".to_string()).into());
    }
    let integration = Integration {
        id: IntegrationId::generate(),
        org_id: principal.org_id,
        name: name.clone(),
        status: IntegrationStatus::Pending,
        test_url: request.test_url.clone().filter(|url| !url.trim().is_empty()),
        last_checked: None,
        created_at: Timestamp::now(),
    };
    state.store.create_integration(&integration)?;

    if let Some(api_key) = request.api_key.filter(|key| !key.is_empty()) {
        state.verifier.spawn_probe(VerificationRequest {
            integration_id: integration.id,
            org_id: principal.org_id,
            name,
            api_key,
            test_url: integration.test_url.clone(),
        });
    }
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "integration.create",
            target_type: Some("integration"),
            target_id: Some(integration.id.to_string()),
            route: "/integrations",
            method: "POST",
            status_code: 201,
            metadata: None,
        },
    );
    Ok((StatusCode::CREATED, Json(integration)).into_response())
}

/// `GET /integrations` — the org's integrations.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Integration>>, HttpError> {
    Ok(Json(state.store.list_integrations(principal.org_id)?))
}

/// `PATCH /integrations/{id}` — rename or change the probe URL.
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(integration_id): Path<IntegrationId>,
    Json(request): Json<UpdateIntegrationRequest>,
) -> Result<Json<Integration>, HttpError> {
    let existing = state
        .store
        .integration_by_id(principal.org_id, integration_id)?
        .ok_or_else(|| ApiError::NotFound(format!("integration {integration_id}")))?;
    let name = request
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or(existing.name);
    let test_url = request
        .test_url
        .filter(|url| !url.trim().is_empty())
        .or(existing.test_url);
    state.store.update_integration_settings(
        principal.org_id,
        integration_id,
        &name,
        test_url.as_deref(),
    )?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "integration.update",
            target_type: Some("integration"),
            target_id: Some(integration_id.to_string()),
            route: "/integrations/{id}",
            method: "PATCH",
            status_code: 200,
            metadata: None,
        },
    );
    let updated = state
        .store
        .integration_by_id(principal.org_id, integration_id)?
        .ok_or_else(|| ApiError::NotFound(format!("integration {integration_id}")))?;
    Ok(Json(updated))
}

/// `DELETE /integrations/{id}` — remove the integration.
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(integration_id): Path<IntegrationId>,
) -> Result<StatusCode, HttpError> {
    state.store.delete_integration(principal.org_id, integration_id)?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "integration.delete",
            target_type: Some("integration"),
            target_id: Some(integration_id.to_string()),
            route: "/integrations/{id}",
            method: "DELETE",
            status_code: 204,
            metadata: None,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// `POST /integrations/{id}/verify` — queue a probe; answers once the row
/// is `pending`.
pub async fn verify(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(integration_id): Path<IntegrationId>,
    Json(request): Json<VerifyIntegrationRequest>,
) -> Result<Response, HttpError> {
    if request.api_key.is_empty() {
        return Err(ApiError::Validation("apiKey must not be empty".to_string()).into());
    }
    let integration = state
        .store
        .integration_by_id(principal.org_id, integration_id)?
        .ok_or_else(|| ApiError::NotFound(format!("integration {integration_id}")))?;
    state.verifier.spawn_probe(VerificationRequest {
        integration_id,
        org_id: principal.org_id,
        name: integration.name.clone(),
        api_key: request.api_key,
        test_url: request.test_url.or(integration.test_url),
    });
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "integration.verify",
            target_type: Some("integration"),
            target_id: Some(integration_id.to_string()),
            route: "/integrations/{id}/verify",
            method: "POST",
            status_code: 202,
            metadata: None,
        },
    );
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "pending" }))).into_response())
}
