// crates/flowgate-server/src/routes/auth.rs
// ============================================================================
// Module: Auth Routes
// Description: Signup, verification, login, logout, profile, and OAuth.
// Purpose: Produce the `(user_id, org_id)` principal everything else uses.
// Dependencies: axum, flowgate-core, crate::{password, session, state}
// ============================================================================

//! ## Overview
//! Signup creates a pending row and mails a six-digit code; verification
//! atomically creates the organization and user and clears the pending row;
//! login issues the session cookie pair. Authentication failures are
//! deliberately indistinguishable between unknown accounts and wrong
//! passwords, and forgot-password always answers 200. Deactivated accounts
//! may still sign in inside the 30-day window (the gate keeps them
//! read-only); beyond it, sign-in is refused.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Extension;
use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use flowgate_core::ApiError;
use flowgate_core::MailMessage;
use flowgate_core::OrgId;
use flowgate_core::Organization;
use flowgate_core::PendingUser;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use flowgate_core::User;
use flowgate_core::UserId;
use flowgate_core::core::org::DEFAULT_RATE_LIMIT;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::error::HttpError;
use crate::password::generate_verification_code;
use crate::password::hash_password;
use crate::password::verify_password;
use crate::session::SessionVariant;
use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum accepted password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum seconds between verification-code sends.
const RESEND_INTERVAL_SECS: u64 = 60;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Signup payload.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Account email.
    pub email: String,
    /// Chosen password.
    pub password: String,
}

/// Verification payload.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Account email.
    pub email: String,
    /// Six-digit code from the signup mail.
    pub code: String,
    /// Optional organization name; derived from the email when absent.
    #[serde(default)]
    pub org_name: Option<String>,
}

/// Login payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Password.
    pub password: String,
    /// Extends the session to 30 days.
    #[serde(default)]
    pub remember: bool,
}

/// Forgot-password payload.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    /// Account email.
    pub email: String,
}

/// OAuth callback query.
#[derive(Debug, Deserialize)]
pub struct OauthCallbackQuery {
    /// Authorization code.
    pub code: String,
}

// ============================================================================
// SECTION: Signup & Verification
// ============================================================================

/// `POST /auth/signup` — create a pending signup and mail the code.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Response, HttpError> {
    let email = request.email.trim().to_string();
    if !email.contains('@') {
        return Err(ApiError::Validation("email is malformed".to_string()).into());
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        ))
        .into());
    }
    if state.store.user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("email already registered".to_string()).into());
    }
    let now = Timestamp::now();
    if let Some(existing) = state.store.pending_user_by_email(&email)?
        && now.millis_since(existing.last_sent_at)
            < i64::try_from(RESEND_INTERVAL_SECS * 1_000).unwrap_or(i64::MAX)
    {
        return Err(ApiError::RateLimited {
            retry_after_secs: RESEND_INTERVAL_SECS,
        }
        .into());
    }

    let code = generate_verification_code();
    let pending = PendingUser {
        email: email.clone(),
        password_hash: hash_password(&request.password)?,
        verification_code: code.clone(),
        last_sent_at: now,
    };
    state.store.upsert_pending_user(&pending)?;
    let mail = MailMessage {
        to: email,
        subject: "Your Flowgate verification code".to_string(),
        body: format!("Your verification code is {code}. It expires in 24 hours."),
    };
    if let Err(err) = state.mailer.send(&mail).await {
        tracing::warn!(error = %err, "verification mail not delivered");
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "verification code sent" })),
    )
        .into_response())
}

/// `POST /auth/verify` — validate the code, create the org and user, clear
/// the pending row, and open a session.
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, HttpError> {
    let email = request.email.trim().to_string();
    let pending = state
        .store
        .pending_user_by_email(&email)?
        .ok_or_else(|| ApiError::Validation("invalid verification code".to_string()))?;
    let now = Timestamp::now();
    if pending.is_expired(now) {
        state.store.delete_pending_user(&email)?;
        return Err(ApiError::Validation("verification code expired".to_string()).into());
    }
    if pending.verification_code != request.code.trim() {
        return Err(ApiError::Validation("invalid verification code".to_string()).into());
    }

    let org = create_unique_org(&state, request.org_name.as_deref(), &email, now)?;
    let user = User {
        id: UserId::generate(),
        org_id: org.id,
        email: pending.email.clone(),
        password_hash: Some(pending.password_hash.clone()),
        first_name: None,
        last_name: None,
        deactivated_at: None,
        rate_limit: DEFAULT_RATE_LIMIT,
        allow_ip_whitelist: false,
        send_error_alerts: false,
        profile_picture: None,
    };
    state.store.create_user(&user)?;
    state.store.delete_pending_user(&email)?;

    let principal = Principal {
        user_id: user.id,
        org_id: org.id,
        email: user.email.clone(),
    };
    let token = state.sessions.issue(&principal, SessionVariant::Default)?;
    let mut response =
        (StatusCode::CREATED, Json(profile_body(&user, &org))).into_response();
    append_cookies(
        &mut response,
        state.sessions.login_cookies(&token, SessionVariant::Default),
    );
    Ok(response)
}

/// Creates an organization, deriving a unique name when necessary.
fn create_unique_org(
    state: &AppState,
    requested: Option<&str>,
    email: &str,
    now: Timestamp,
) -> Result<Organization, HttpError> {
    let base = requested
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| derive_org_name(email), ToString::to_string);
    let mut candidate = base.clone();
    for attempt in 0..4_u8 {
        let org = Organization {
            id: OrgId::generate(),
            name: candidate.clone(),
            created_at: now,
        };
        match state.store.create_organization(&org) {
            Ok(()) => return Ok(org),
            Err(flowgate_core::StoreError::Conflict(_)) if requested.is_none() => {
                candidate = format!("{base}-{}", u32::from(attempt) + 2);
            }
            Err(flowgate_core::StoreError::Conflict(_)) => {
                return Err(ApiError::Conflict("organization name already taken".to_string())
                    .into());
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(ApiError::Conflict("organization name already taken".to_string()).into())
}

/// Derives a default organization name from the email local part.
fn derive_org_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("workspace");
    format!("{local}-org")
}

// ============================================================================
// SECTION: Login & Logout
// ============================================================================

/// `POST /auth/login` — verify credentials and open a session. Unknown
/// accounts and wrong passwords answer identically.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, HttpError> {
    let rejection =
        || HttpError(ApiError::Unauthenticated("invalid credentials".to_string()));
    let user = state.store.user_by_email(request.email.trim())?.ok_or_else(rejection)?;
    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err(rejection());
    };
    if !verify_password(&request.password, stored_hash) {
        return Err(rejection());
    }
    let now = Timestamp::now();
    if user.is_deactivated() && !user.reactivation_allowed(now) {
        return Err(ApiError::Forbidden("account deactivated".to_string()).into());
    }
    let org = state
        .store
        .organization_by_id(user.org_id)?
        .ok_or_else(|| ApiError::Internal("organization missing".to_string()))?;

    let variant = if request.remember {
        SessionVariant::Remember
    } else {
        SessionVariant::Default
    };
    let principal = Principal {
        user_id: user.id,
        org_id: user.org_id,
        email: user.email.clone(),
    };
    let token = state.sessions.issue(&principal, variant)?;
    let mut response = (StatusCode::OK, Json(profile_body(&user, &org))).into_response();
    append_cookies(&mut response, state.sessions.login_cookies(&token, variant));
    Ok(response)
}

/// `POST /auth/logout` — clear the session cookies on both path scopes.
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    append_cookies(&mut response, state.sessions.logout_cookies());
    response
}

/// `GET /auth/me` — the authenticated principal's profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, HttpError> {
    let user = state
        .store
        .user_by_id(principal.user_id)?
        .ok_or_else(|| ApiError::Unauthenticated("unknown principal".to_string()))?;
    let org = state
        .store
        .organization_by_id(user.org_id)?
        .ok_or_else(|| ApiError::Internal("organization missing".to_string()))?;
    Ok(Json(profile_body(&user, &org)))
}

/// `POST /auth/forgot-password` — always 200, whether or not the account
/// exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, HttpError> {
    if let Ok(Some(user)) = state.store.user_by_email(request.email.trim()) {
        let mail = MailMessage {
            to: user.email.clone(),
            subject: "Flowgate password reset".to_string(),
            body: "A password reset was requested for your account.".to_string(),
        };
        if let Err(err) = state.mailer.send(&mail).await {
            tracing::warn!(error = %err, "reset mail not delivered");
        }
    }
    Ok(Json(json!({ "message": "if the account exists, a reset mail was sent" })))
}

// ============================================================================
// SECTION: Google OAuth
// ============================================================================

/// `GET /auth/google` — redirect into the provider flow.
pub async fn google(State(state): State<AppState>) -> Result<Redirect, HttpError> {
    let oidc = state
        .oidc
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("google login not configured".to_string()))?;
    let nonce = UserId::generate().to_string();
    Ok(Redirect::temporary(&oidc.authorization_url(&nonce)))
}

/// `GET /auth/google/callback` — exchange the code, upsert the user, open a
/// seven-day session, and bounce back to the front-end.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<OauthCallbackQuery>,
) -> Result<Response, HttpError> {
    let oidc = state
        .oidc
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("google login not configured".to_string()))?;
    let profile = oidc.exchange_code(&query.code).await?;

    let now = Timestamp::now();
    let user = match state.store.user_by_email(&profile.email)? {
        Some(user) => user,
        None => {
            let org = create_unique_org(&state, None, &profile.email, now)?;
            let user = User {
                id: UserId::generate(),
                org_id: org.id,
                email: profile.email.clone(),
                password_hash: None,
                first_name: profile.first_name.clone(),
                last_name: profile.last_name.clone(),
                deactivated_at: None,
                rate_limit: DEFAULT_RATE_LIMIT,
                allow_ip_whitelist: false,
                send_error_alerts: false,
                profile_picture: profile.picture.clone(),
            };
            state.store.create_user(&user)?;
            user
        }
    };
    if user.is_deactivated() && !user.reactivation_allowed(now) {
        return Err(ApiError::Forbidden("account deactivated".to_string()).into());
    }

    let principal = Principal {
        user_id: user.id,
        org_id: user.org_id,
        email: user.email.clone(),
    };
    let token = state.sessions.issue(&principal, SessionVariant::Oauth)?;
    let destination = state.frontend_origin.clone().unwrap_or_else(|| "/".to_string());
    let mut response = Redirect::temporary(&destination).into_response();
    append_cookies(
        &mut response,
        state.sessions.login_cookies(&token, SessionVariant::Oauth),
    );
    Ok(response)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Profile body shared by verify, login, and me.
fn profile_body(user: &User, org: &Organization) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "firstName": user.first_name,
        "lastName": user.last_name,
        "profilePicture": user.profile_picture,
        "deactivated": user.is_deactivated(),
        "rateLimit": user.rate_limit,
        "allowIpWhitelist": user.allow_ip_whitelist,
        "sendErrorAlerts": user.send_error_alerts,
        "org": { "id": org.id, "name": org.name },
    })
}

/// Appends `Set-Cookie` values to a response.
fn append_cookies(response: &mut Response, cookies: Vec<String>) {
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
}
