// crates/flowgate-server/src/routes/flows.rs
// ============================================================================
// Module: Flow Routes
// Description: Flow CRUD, versioning, and status transitions.
// Purpose: Manage the template side of the platform.
// Dependencies: axum, flowgate-core, crate::{audit, state}
// ============================================================================

//! ## Overview
//! Flows are soft-deleted, versioned, and org-scoped. Saving a version runs
//! the full graph validation (duplicate ids, dangling endpoints, cycles)
//! before anything is written, so every stored graph is executable.
//! Activating a flow starts a `deploy`-triggered execution of its latest
//! version.

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
use flowgate_core::Flow;
use flowgate_core::FlowGraph;
use flowgate_core::FlowId;
use flowgate_core::FlowStatus;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use flowgate_core::TriggerType;
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

/// Flow creation payload.
#[derive(Debug, Deserialize)]
pub struct CreateFlowRequest {
    /// Display name, unique per org case-insensitively.
    pub name: String,
}

/// Version creation payload.
#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    /// The graph snapshot.
    pub graph: FlowGraph,
    /// Editor variables carried alongside.
    #[serde(default)]
    pub variables: Option<Value>,
}

/// Status transition payload.
#[derive(Debug, Deserialize)]
pub struct PatchStatusRequest {
    /// Target status label.
    pub status: String,
}

// ============================================================================
// SECTION: Flow CRUD
// ============================================================================

/// `POST /flows` — create a draft flow.
pub async fn create_flow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CreateFlowRequest>,
) -> Result<Response, HttpError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("flow name must not be empty".to_string()).into());
    }
    let now = Timestamp::now();
    let flow = Flow {
        id: FlowId::generate(),
        org_id: principal.org_id,
        name,
        status: FlowStatus::Draft,
        is_deleted: false,
        created_by: principal.user_id,
        created_at: now,
        updated_at: now,
    };
    state.store.create_flow(&flow)?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "flow.create",
            target_type: Some("flow"),
            target_id: Some(flow.id.to_string()),
            route: "/flows",
            method: "POST",
            status_code: 201,
            metadata: None,
        },
    );
    Ok((StatusCode::CREATED, Json(flow)).into_response())
}

/// `GET /flows` — list the org's non-deleted flows.
pub async fn list_flows(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Flow>>, HttpError> {
    Ok(Json(state.store.list_flows(principal.org_id)?))
}

/// `GET /flows/{id}` — fetch one flow.
pub async fn get_flow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(flow_id): Path<FlowId>,
) -> Result<Json<Flow>, HttpError> {
    let flow = visible_flow(&state, principal.org_id, flow_id)?;
    Ok(Json(flow))
}

/// `DELETE /flows/{id}` — soft delete.
pub async fn delete_flow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(flow_id): Path<FlowId>,
) -> Result<StatusCode, HttpError> {
    state.store.soft_delete_flow(principal.org_id, flow_id, Timestamp::now())?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "flow.delete",
            target_type: Some("flow"),
            target_id: Some(flow_id.to_string()),
            route: "/flows/{id}",
            method: "DELETE",
            status_code: 204,
            metadata: None,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// SECTION: Versioning
// ============================================================================

/// `POST /flows/{id}/versions` — validate and store the next version.
pub async fn create_version(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(flow_id): Path<FlowId>,
    Json(request): Json<CreateVersionRequest>,
) -> Result<Response, HttpError> {
    visible_flow(&state, principal.org_id, flow_id)?;
    request
        .graph
        .validate()
        .map_err(|err| ApiError::InvalidGraph(err.to_string()))?;
    let variables = request.variables.unwrap_or_else(|| json!({}));
    let version =
        state.store.create_flow_version(flow_id, &request.graph, &variables, Timestamp::now())?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "flow.version.create",
            target_type: Some("flow_version"),
            target_id: Some(version.id.to_string()),
            route: "/flows/{id}/versions",
            method: "POST",
            status_code: 201,
            metadata: Some(json!({ "version": version.version })),
        },
    );
    Ok((StatusCode::CREATED, Json(version)).into_response())
}

/// `GET /flows/{id}/versions` — list versions, newest first.
pub async fn list_versions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(flow_id): Path<FlowId>,
) -> Result<Json<Value>, HttpError> {
    visible_flow(&state, principal.org_id, flow_id)?;
    let versions = state.store.list_flow_versions(flow_id)?;
    Ok(Json(json!({ "versions": versions })))
}

/// `GET /flows/{id}/versions/{v}` — fetch one version.
pub async fn get_version(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((flow_id, version)): Path<(FlowId, u32)>,
) -> Result<Json<flowgate_core::FlowVersion>, HttpError> {
    visible_flow(&state, principal.org_id, flow_id)?;
    let version = state
        .store
        .flow_version(flow_id, version)?
        .ok_or_else(|| ApiError::NotFound(format!("version {version}")))?;
    Ok(Json(version))
}

// ============================================================================
// SECTION: Status Transition
// ============================================================================

/// `PATCH /flows/{id}/status` — set the status; activation starts a
/// `deploy`-triggered execution.
pub async fn patch_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(flow_id): Path<FlowId>,
    Json(request): Json<PatchStatusRequest>,
) -> Result<Json<Value>, HttpError> {
    let status = FlowStatus::parse(&request.status)
        .ok_or_else(|| ApiError::Validation(format!("unknown status: {}", request.status)))?;
    state.store.set_flow_status(principal.org_id, flow_id, status, Timestamp::now())?;

    let execution = if status == FlowStatus::Active {
        Some(state.runner.start_execution(
            principal.org_id,
            flow_id,
            TriggerType::Deploy,
            json!({ "reason": "deploy" }),
        )?)
    } else {
        None
    };
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "flow.status",
            target_type: Some("flow"),
            target_id: Some(flow_id.to_string()),
            route: "/flows/{id}/status",
            method: "PATCH",
            status_code: 200,
            metadata: Some(json!({ "status": status.as_str() })),
        },
    );
    Ok(Json(json!({ "status": status.as_str(), "execution": execution })))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves a non-deleted flow in the caller's org.
fn visible_flow(state: &AppState, org_id: flowgate_core::OrgId, flow_id: FlowId) -> Result<Flow, HttpError> {
    state
        .store
        .flow_by_id(org_id, flow_id)?
        .filter(|flow| !flow.is_deleted)
        .ok_or_else(|| HttpError(ApiError::NotFound(format!("flow {flow_id}"))))
}
