// crates/flowgate-server/src/gate.rs
// ============================================================================
// Module: Principal & Policy Gate
// Description: Session resolution, IP allowlist, and rate quota middleware.
// Purpose: Admit or reject every authenticated request before routing.
// Dependencies: axum, flowgate-core, crate::{extract, session, state}
// ============================================================================

//! ## Overview
//! The gate runs before every authenticated endpoint, in order: resolve the
//! principal from the session cookies (primary, then development fallback);
//! enforce the per-user IP allowlist when the account opted in; enforce the
//! hourly rate quota, appending one sample per admitted request and setting
//! the `X-RateLimit-*` headers on the response.
//!
//! Failure policy: allowlist store errors fail OPEN (the request proceeds,
//! with a warning log) so a store outage cannot lock operators out — this
//! is explicit, documented policy. Quota store errors likewise admit the
//! request without accounting. Deactivated accounts are read-only: any
//! non-read method is refused.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use flowgate_core::ApiError;
use flowgate_core::ApiRateSample;
use flowgate_core::Timestamp;
use flowgate_core::User;
use flowgate_core::core::policy::RATE_WINDOW_MILLIS;
use serde_json::json;

use crate::error::HttpError;
use crate::extract::RequestContext;
use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Seconds a rate-limited caller is told to wait.
const RETRY_AFTER_SECS: u64 = 3_600;

// ============================================================================
// SECTION: Gate Middleware
// ============================================================================

/// The policy gate: principal → allowlist → quota, then the handler.
pub async fn policy_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let context = RequestContext::derive(request.headers(), peer);

    // Principal resolution.
    let principal = match state.sessions.principal_from_headers(request.headers()) {
        Ok(principal) => principal,
        Err(err) => return HttpError(err).into_response(),
    };
    let user = match state.store.user_by_id(principal.user_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpError(ApiError::Unauthenticated("unknown principal".to_string()))
                .into_response();
        }
        Err(err) => return HttpError(ApiError::from(err)).into_response(),
    };

    // Deactivated accounts are read-only.
    if user.is_deactivated() && !is_read_method(request.method()) {
        return HttpError(ApiError::Forbidden("account is read-only".to_string()))
            .into_response();
    }

    // IP allowlist (fail open on unexpected errors).
    if user.allow_ip_whitelist
        && let Some(denied) = check_allowlist(&state, &user, &context)
    {
        return denied;
    }

    // Rate quota.
    let endpoint = format!("{} {}", request.method(), request.uri().path());
    let quota = match check_quota(&state, &user, &context, &endpoint) {
        Ok(quota) => quota,
        Err(denied) => return denied,
    };

    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;
    if let Some(quota) = quota {
        apply_rate_headers(&mut response, quota);
    }
    response
}

/// Returns true for methods a read-only account may use.
fn is_read_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

// ============================================================================
// SECTION: Allowlist Check
// ============================================================================

/// Returns the denial response when the allowlist rejects the request.
fn check_allowlist(
    state: &AppState,
    user: &User,
    context: &RequestContext,
) -> Option<Response> {
    let Some(client_ip) = context.client_ip.clone() else {
        tracing::warn!(user = %user.id, "client ip unresolvable; allowlist failing open");
        return None;
    };
    match state.store.ip_allowed(user.id, &client_ip) {
        Ok(true) => None,
        Ok(false) => {
            let body = axum::Json(json!({
                "error": {
                    "kind": "forbidden",
                    "message": "ip address not allowed",
                },
                "currentIp": client_ip,
            }));
            Some((axum::http::StatusCode::FORBIDDEN, body).into_response())
        }
        Err(err) => {
            tracing::warn!(user = %user.id, error = %err, "allowlist check failed open");
            None
        }
    }
}

// ============================================================================
// SECTION: Quota Check
// ============================================================================

/// Rate header values applied to admitted responses.
#[derive(Debug, Clone, Copy)]
struct QuotaHeaders {
    /// The user's hourly limit.
    limit: u32,
    /// Requests left in the window after this one.
    remaining: u64,
    /// Unix-second instant the window resets.
    reset: i64,
}

/// Checks and accounts the quota; returns headers for admitted requests or
/// the 429 response.
fn check_quota(
    state: &AppState,
    user: &User,
    context: &RequestContext,
    endpoint: &str,
) -> Result<Option<QuotaHeaders>, Response> {
    let now = Timestamp::now();
    let since = now.saturating_sub_millis(RATE_WINDOW_MILLIS);
    let used = match state.store.count_rate_samples_since(user.id, since) {
        Ok(used) => used,
        Err(err) => {
            tracing::warn!(user = %user.id, error = %err, "quota count failed open");
            return Ok(None);
        }
    };
    if used >= u64::from(user.rate_limit) {
        let mut response = HttpError(ApiError::RateLimited {
            retry_after_secs: RETRY_AFTER_SECS,
        })
        .into_response();
        apply_rate_headers(
            &mut response,
            QuotaHeaders {
                limit: user.rate_limit,
                remaining: 0,
                reset: now.as_unix_seconds() + i64::try_from(RETRY_AFTER_SECS).unwrap_or(3_600),
            },
        );
        return Err(response);
    }
    let sample = ApiRateSample {
        user_id: user.id,
        endpoint: endpoint.to_string(),
        ip_address: context.client_ip.clone(),
        timestamp: now,
    };
    if let Err(err) = state.store.insert_rate_sample(&sample) {
        tracing::warn!(user = %user.id, error = %err, "rate sample lost");
    }
    Ok(Some(QuotaHeaders {
        limit: user.rate_limit,
        remaining: u64::from(user.rate_limit).saturating_sub(used + 1),
        reset: now.as_unix_seconds() + i64::try_from(RETRY_AFTER_SECS).unwrap_or(3_600),
    }))
}

/// Applies the `X-RateLimit-*` headers.
fn apply_rate_headers(response: &mut Response, quota: QuotaHeaders) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&quota.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.reset.to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
}
