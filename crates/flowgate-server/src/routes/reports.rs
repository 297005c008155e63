// crates/flowgate-server/src/routes/reports.rs
// ============================================================================
// Module: Report Routes
// Description: Compliance report generation for the caller's organization.
// Purpose: Assemble the org's posture and persist it through the writer.
// Dependencies: axum, flowgate-core, crate::{audit, reports, state}
// ============================================================================

//! ## Overview
//! A compliance report is a point-in-time snapshot of the org: integrations
//! with their verified health, recent executions with outcome counts, and
//! the recent provider-call rollup. The JSON artifact lands in the report
//! directory under the canonical `<sanitized-org-id>_<epoch-ms>.json` name;
//! PDF rendering is the external collaborator's job and feeds on this file.

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
use flowgate_core::ExecutionStatus;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::error::HttpError;
use crate::extract::RequestContext;
use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Executions included in one report.
const REPORT_EXECUTION_LIMIT: usize = 100;

/// Provider-call rollup rows included in one report.
const REPORT_TX_LIMIT: usize = 100;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// `POST /reports/compliance` — assemble and persist the org snapshot.
pub async fn generate(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
) -> Result<Response, HttpError> {
    let org = state
        .store
        .organization_by_id(principal.org_id)?
        .ok_or_else(|| ApiError::Internal("organization missing".to_string()))?;
    let integrations = state.store.list_integrations(principal.org_id)?;
    let executions =
        state.store.recent_executions_for_org(principal.org_id, REPORT_EXECUTION_LIMIT)?;
    let tx_events = state.store.recent_tx_events(principal.org_id, REPORT_TX_LIMIT)?;

    let generated_at = Timestamp::now();
    let report = json!({
        "organization": { "id": org.id, "name": org.name },
        "generated_at": generated_at.as_unix_millis(),
        "integrations": integrations,
        "executions": {
            "recent": executions,
            "counts": execution_counts(&executions),
        },
        "provider_calls": {
            "recent": tx_events,
            "failures": tx_events.iter().filter(|event| !event.success).count(),
        },
    });
    let path = state.reports.write_report(principal.org_id, &report)?;

    state.auditor.record(
        Some(&principal),
        &context,
        AuditEvent {
            action: "report.generate",
            target_type: Some("report"),
            target_id: Some(path.display().to_string()),
            route: "/reports/compliance",
            method: "POST",
            status_code: 201,
            metadata: None,
        },
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "path": path.display().to_string(),
            "generatedAt": generated_at.as_unix_millis(),
        })),
    )
        .into_response())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Per-status counts over the reported executions.
fn execution_counts(executions: &[flowgate_core::FlowExecution]) -> Value {
    let count = |status: ExecutionStatus| {
        executions.iter().filter(|execution| execution.status == status).count()
    };
    json!({
        "running": count(ExecutionStatus::Running),
        "completed": count(ExecutionStatus::Completed),
        "failed": count(ExecutionStatus::Failed),
        "cancelled": count(ExecutionStatus::Cancelled),
    })
}
