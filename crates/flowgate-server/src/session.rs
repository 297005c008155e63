// crates/flowgate-server/src/session.rs
// ============================================================================
// Module: Session Tokens
// Description: Signed session tokens and the cookie pair carrying them.
// Purpose: Resolve `(user_id, org_id)` principals from verified tokens.
// Dependencies: jsonwebtoken, flowgate-core, flowgate-config, axum
// ============================================================================

//! ## Overview
//! Sessions are HS256 JWTs carrying `{user_id, email, org_id}`. Lifetime
//! depends on how the session was created: 30 days for `remember = true`,
//! 1 day otherwise, 7 days for OAuth logins. The token rides a `Secure`
//! primary cookie plus, outside production, a fallback cookie without
//! `Secure` — some browsers drop `Secure` cookies on plain HTTP during
//! development. Verification accepts the primary first, then the fallback;
//! signature or expiry failures yield `Unauthenticated`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use flowgate_core::ApiError;
use flowgate_core::OrgId;
use flowgate_core::Principal;
use flowgate_core::Timestamp;
use flowgate_core::UserId;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Primary session cookie (marked `Secure`).
pub const SESSION_COOKIE: &str = "fg_session";
/// Development fallback cookie (no `Secure` attribute).
pub const SESSION_FALLBACK_COOKIE: &str = "fg_session_dev";

/// Seconds per day.
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

// ============================================================================
// SECTION: Variants
// ============================================================================

/// How the session was created; selects the token lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVariant {
    /// Password login without `remember`.
    Default,
    /// Password login with `remember = true`.
    Remember,
    /// OAuth login.
    Oauth,
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// JWT claim set for a session.
///
/// # Invariants
/// - `sub` and `org` are hyphenated UUIDs; `exp`/`iat` are unix seconds.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    /// User id.
    sub: String,
    /// Organization id.
    org: String,
    /// Email recorded at issue time.
    email: String,
    /// Expiry, unix seconds.
    exp: i64,
    /// Issued-at, unix seconds.
    iat: i64,
}

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Issues and verifies session tokens.
///
/// # Invariants
/// - Tokens are HS256 over the configured secret; nothing else is accepted.
pub struct SessionSigner {
    /// Encoding key derived from the session secret.
    encoding: EncodingKey,
    /// Decoding key derived from the session secret.
    decoding: DecodingKey,
    /// Lifetime for default sessions, days.
    default_ttl_days: i64,
    /// Lifetime for remembered sessions, days.
    remember_ttl_days: i64,
    /// Lifetime for OAuth sessions, days.
    oauth_ttl_days: i64,
    /// Whether only the `Secure` primary cookie is issued.
    production: bool,
}

impl SessionSigner {
    /// Creates a signer from the session configuration.
    #[must_use]
    pub fn new(config: &flowgate_config::SessionConfig, production: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            default_ttl_days: config.default_ttl_days,
            remember_ttl_days: config.remember_ttl_days,
            oauth_ttl_days: config.oauth_ttl_days,
            production,
        }
    }

    /// Returns the lifetime in seconds for a session variant.
    #[must_use]
    pub const fn ttl_seconds(&self, variant: SessionVariant) -> i64 {
        let days = match variant {
            SessionVariant::Default => self.default_ttl_days,
            SessionVariant::Remember => self.remember_ttl_days,
            SessionVariant::Oauth => self.oauth_ttl_days,
        };
        days * SECONDS_PER_DAY
    }

    /// Issues a signed token for a principal.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] when signing fails.
    pub fn issue(
        &self,
        principal: &Principal,
        variant: SessionVariant,
    ) -> Result<String, ApiError> {
        let now = Timestamp::now().as_unix_seconds();
        let claims = SessionClaims {
            sub: principal.user_id.to_string(),
            org: principal.org_id.to_string(),
            email: principal.email.clone(),
            exp: now + self.ttl_seconds(variant),
            iat: now,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| ApiError::Internal(format!("token signing failed: {err}")))
    }

    /// Verifies a token and returns its principal.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] on signature, expiry, or claim
    /// failures.
    pub fn verify(&self, token: &str) -> Result<Principal, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|_| ApiError::Unauthenticated("invalid session".to_string()))?;
        let user_id = UserId::parse(&data.claims.sub)
            .ok_or_else(|| ApiError::Unauthenticated("invalid session".to_string()))?;
        let org_id = OrgId::parse(&data.claims.org)
            .ok_or_else(|| ApiError::Unauthenticated("invalid session".to_string()))?;
        Ok(Principal {
            user_id,
            org_id,
            email: data.claims.email,
        })
    }

    /// Resolves a principal from the request cookies: primary first, then
    /// the development fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] when no cookie verifies.
    pub fn principal_from_headers(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        for name in [SESSION_COOKIE, SESSION_FALLBACK_COOKIE] {
            if let Some(token) = cookie_value(headers, name)
                && let Ok(principal) = self.verify(&token)
            {
                return Ok(principal);
            }
        }
        Err(ApiError::Unauthenticated("missing or invalid session".to_string()))
    }

    /// Renders the `Set-Cookie` values for a fresh session. Outside
    /// production this includes the fallback cookie.
    #[must_use]
    pub fn login_cookies(&self, token: &str, variant: SessionVariant) -> Vec<String> {
        let max_age = self.ttl_seconds(variant);
        let mut cookies = vec![format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age}"
        )];
        if !self.production {
            cookies.push(format!(
                "{SESSION_FALLBACK_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; \
                 Max-Age={max_age}"
            ));
        }
        cookies
    }

    /// Renders the `Set-Cookie` values clearing both cookies on both path
    /// scopes.
    #[must_use]
    pub fn logout_cookies(&self) -> Vec<String> {
        let mut cookies = Vec::with_capacity(4);
        for name in [SESSION_COOKIE, SESSION_FALLBACK_COOKIE] {
            for path in ["/", "/auth"] {
                cookies.push(format!("{name}=; Path={path}; HttpOnly; Max-Age=0"));
            }
        }
        cookies
    }
}

// ============================================================================
// SECTION: Cookie Parsing
// ============================================================================

/// Extracts one cookie value from the `Cookie` headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            let pair = pair.trim();
            if let Some((key, value)) = pair.split_once('=')
                && key == name
            {
                return Some(value.to_string());
            }
        }
    }
    None
}
