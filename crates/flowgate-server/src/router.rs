// crates/flowgate-server/src/router.rs
// ============================================================================
// Module: Router Assembly
// Description: Route table and gate layering for the HTTP surface.
// Purpose: One place where paths, handlers, and middleware meet.
// Dependencies: axum, crate::{gate, routes, state}
// ============================================================================

//! ## Overview
//! Two route groups: the public auth surface (signup, verification, login,
//! OAuth, forgot-password) and everything else behind the policy gate. The
//! gate attaches the principal and request context to extensions; gated
//! handlers extract both.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Router;
use axum::middleware;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;

use crate::gate::policy_gate;
use crate::routes::auth;
use crate::routes::connections;
use crate::routes::executions;
use crate::routes::flows;
use crate::routes::integrations;
use crate::routes::ip_allowlist;
use crate::routes::notifications;
use crate::routes::reports;
use crate::routes::sandbox;
use crate::routes::ws;
use crate::state::AppState;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/google", get(auth::google))
        .route("/auth/google/callback", get(auth::google_callback));

    let gated = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/flows", post(flows::create_flow).get(flows::list_flows))
        .route("/flows/{id}", get(flows::get_flow).delete(flows::delete_flow))
        .route(
            "/flows/{id}/versions",
            post(flows::create_version).get(flows::list_versions),
        )
        .route("/flows/{id}/versions/{v}", get(flows::get_version))
        .route("/flows/{id}/status", patch(flows::patch_status))
        .route("/executions/start", post(executions::start))
        .route("/executions/recent", get(executions::recent))
        .route("/executions/flow/{id}", get(executions::for_flow))
        .route("/executions/{id}", get(executions::get).delete(executions::delete))
        .route("/executions/{id}/steps", get(executions::steps))
        .route("/executions/{id}/logs", get(executions::logs))
        .route("/executions/{id}/cancel", post(executions::cancel))
        .route("/connections", post(connections::create).get(connections::list))
        .route("/integrations", post(integrations::create).get(integrations::list))
        .route(
            "/integrations/{id}",
            patch(integrations::update).delete(integrations::delete),
        )
        .route("/integrations/{id}/verify", post(integrations::verify))
        .route(
            "/notifications",
            get(notifications::list).post(notifications::create),
        )
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/ip-whitelist", get(ip_allowlist::list).post(ip_allowlist::add))
        .route("/ip-whitelist/current-ip", get(ip_allowlist::current_ip))
        .route("/ip-whitelist/{id}", delete(ip_allowlist::remove))
        .route("/reports/compliance", post(reports::generate))
        .route("/sandbox/fetch", post(sandbox::fetch))
        .route("/ws", get(ws::subscribe))
        .layer(middleware::from_fn_with_state(state.clone(), policy_gate));

    public.merge(gated).with_state(state)
}
