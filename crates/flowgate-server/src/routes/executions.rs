// crates/flowgate-server/src/routes/executions.rs
// ============================================================================
// Module: Execution Routes
// Description: Start, read, cancel, and delete flow executions.
// Purpose: Expose the engine's public contract over HTTP.
// Dependencies: axum, flowgate-core, flowgate-engine, crate::{audit, state}
// ============================================================================

//! ## Overview
//! Starting an execution answers 202 with the committed `running` row's
//! acknowledgement; the engine interprets asynchronously. Reads join
//! through the flow for org scoping. Cancel is cooperative and idempotent
//! on terminal states; delete removes logs, steps, then the row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Extension;
use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use flowgate_core::ApiError;
use flowgate_core::ExecutionId;
use flowgate_core::ExecutionLog;
use flowgate_core::ExecutionStep;
use flowgate_core::FlowExecution;
use flowgate_core::FlowId;
use flowgate_core::Principal;
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

/// Execution start payload.
#[derive(Debug, Deserialize)]
pub struct StartExecutionRequest {
    /// Flow to execute.
    pub flow_id: FlowId,
    /// Trigger label; `manual` when absent.
    #[serde(default)]
    pub trigger_type: Option<String>,
    /// Trigger payload; `{}` when absent.
    #[serde(default)]
    pub trigger_data: Option<Value>,
}

/// Listing limit query.
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    /// Maximum rows returned.
    #[serde(default)]
    pub limit: Option<usize>,
}

// ============================================================================
// SECTION: Start
// ============================================================================

/// `POST /executions/start` — begin executing the flow's latest version.
pub async fn start(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<StartExecutionRequest>,
) -> Result<Response, HttpError> {
    let trigger_type = match request.trigger_type.as_deref() {
        None => TriggerType::Manual,
        Some(raw) => TriggerType::parse(raw)
            .ok_or_else(|| ApiError::Validation(format!("unknown trigger type: {raw}")))?,
    };
    let started = state.runner.start_execution(
        principal.org_id,
        request.flow_id,
        trigger_type,
        request.trigger_data.unwrap_or_else(|| json!({})),
    )?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "execution.start",
            target_type: Some("execution"),
            target_id: Some(started.execution_id.to_string()),
            route: "/executions/start",
            method: "POST",
            status_code: 202,
            metadata: Some(json!({ "trigger": trigger_type.as_str() })),
        },
    );
    Ok((StatusCode::ACCEPTED, Json(started)).into_response())
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// `GET /executions/{id}` — one execution.
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<FlowExecution>, HttpError> {
    Ok(Json(state.runner.get_execution(principal.org_id, execution_id)?))
}

/// `GET /executions/{id}/steps` — the execution's steps in plan order.
pub async fn steps(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Vec<ExecutionStep>>, HttpError> {
    Ok(Json(state.runner.get_steps(principal.org_id, execution_id)?))
}

/// `GET /executions/{id}/logs` — the execution's log lines.
pub async fn logs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(execution_id): Path<ExecutionId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ExecutionLog>>, HttpError> {
    let limit = query.limit.unwrap_or(100);
    Ok(Json(state.runner.get_logs(principal.org_id, execution_id, limit)?))
}

/// `GET /executions/flow/{id}` — executions of one flow, newest first.
pub async fn for_flow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(flow_id): Path<FlowId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<FlowExecution>>, HttpError> {
    let limit = query.limit.unwrap_or(50);
    Ok(Json(state.runner.list_flow_executions(principal.org_id, flow_id, limit)?))
}

/// `GET /executions/recent` — the org's most recent executions (≤ 100).
pub async fn recent(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<FlowExecution>>, HttpError> {
    let limit = query.limit.unwrap_or(20);
    Ok(Json(state.runner.list_recent_for_org(principal.org_id, limit)?))
}

// ============================================================================
// SECTION: Cancel & Delete
// ============================================================================

/// `POST /executions/{id}/cancel` — cooperative cancellation.
pub async fn cancel(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<FlowExecution>, HttpError> {
    let execution = state.runner.cancel_execution(principal.org_id, execution_id)?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "execution.cancel",
            target_type: Some("execution"),
            target_id: Some(execution_id.to_string()),
            route: "/executions/{id}/cancel",
            method: "POST",
            status_code: 200,
            metadata: None,
        },
    );
    Ok(Json(execution))
}

/// `DELETE /executions/{id}` — delete logs, steps, then the row.
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(execution_id): Path<ExecutionId>,
) -> Result<StatusCode, HttpError> {
    state.runner.delete_execution(principal.org_id, execution_id)?;
    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "execution.delete",
            target_type: Some("execution"),
            target_id: Some(execution_id.to_string()),
            route: "/executions/{id}",
            method: "DELETE",
            status_code: 204,
            metadata: None,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}
