// crates/flowgate-server/src/routes/notifications.rs
// ============================================================================
// Module: Notification Routes
// Description: The org's user-visible event queue.
// Purpose: List, create, and acknowledge notifications.
// Dependencies: axum, flowgate-core, crate::state
// ============================================================================

//! ## Overview
//! Notifications are payload-light rows the front-end re-reads whenever the
//! bus announces `notifications:update`. Creating one here (dashboards and
//! integrations do it server-side too) publishes that announcement through
//! the store hook automatically.

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
use flowgate_core::Notification;
use flowgate_core::NotificationId;
use flowgate_core::NotificationKind;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use serde::Deserialize;
use serde_json::json;

use crate::error::HttpError;
use crate::state::AppState;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Listing limit query.
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    /// Maximum rows returned.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Notification creation payload.
#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    /// Severity label; `info` when absent.
    #[serde(default)]
    pub kind: Option<String>,
    /// Short title.
    pub title: String,
    /// Full message.
    pub message: String,
    /// Related row identifier.
    #[serde(default)]
    pub related_id: Option<String>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /notifications` — the org's notifications, newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Notification>>, HttpError> {
    let limit = query.limit.unwrap_or(50);
    Ok(Json(state.store.list_notifications(principal.org_id, limit)?))
}

/// `POST /notifications` — insert one notification (publishes the bus
/// announcement through the store hook).
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<Response, HttpError> {
    let kind = match request.kind.as_deref() {
        None => NotificationKind::Info,
        Some(raw) => NotificationKind::parse(raw)
            .ok_or_else(|| ApiError::Validation(format!("unknown kind: {raw}")))?,
    };
    let notification = Notification {
        id: NotificationId::generate(),
        org_id: principal.org_id,
        kind,
        title: request.title,
        message: request.message,
        related_id: request.related_id,
        is_read: false,
        created_at: Timestamp::now(),
    };
    state.store.insert_notification(&notification)?;
    Ok((StatusCode::CREATED, Json(notification)).into_response())
}

/// `POST /notifications/{id}/read` — mark one notification read.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(notification_id): Path<NotificationId>,
) -> Result<Json<serde_json::Value>, HttpError> {
    state.store.mark_notification_read(principal.org_id, notification_id)?;
    Ok(Json(json!({ "read": true })))
}

/// `POST /notifications/read-all` — mark everything read.
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let updated = state.store.mark_all_notifications_read(principal.org_id)?;
    Ok(Json(json!({ "updated": updated })))
}
