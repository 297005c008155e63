// crates/flowgate-server/src/oidc.rs
// ============================================================================
// Module: OIDC Capability
// Description: Narrow Google OIDC interface and its HTTP implementation.
// Purpose: Upsert users from verified Google identities.
// Dependencies: flowgate-core, flowgate-providers, flowgate-config, serde
// ============================================================================

//! ## Overview
//! The OAuth flow reduces to two capability calls: build the authorization
//! redirect URL, and exchange a callback code for a verified profile
//! (email plus names). [`GoogleOidc`] implements both over the fixed Google
//! endpoints using the policed outbound client; discovery is out of scope.
//! Providers that reject the exchange surface as
//! [`ApiError::Unauthenticated`] — the callback treats any failure as a
//! failed login, never a server error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use flowgate_config::OauthConfig;
use flowgate_core::ApiError;
use flowgate_providers::OutboundHttp;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Google authorization endpoint.
const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google token endpoint.
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
/// Google userinfo endpoint.
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
/// Exchange deadline.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Capability
// ============================================================================

/// Verified profile returned by a successful exchange.
///
/// # Invariants
/// - `email` is verified by the provider before it reaches here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcProfile {
    /// Verified email address.
    pub email: String,
    /// Given name, when shared.
    pub first_name: Option<String>,
    /// Family name, when shared.
    pub last_name: Option<String>,
    /// Profile picture URL, when shared.
    pub picture: Option<String>,
}

/// Narrow OIDC capability consumed by the auth routes.
#[async_trait]
pub trait OidcClient: Send + Sync {
    /// Builds the authorization redirect URL carrying `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchanges a callback code for a verified profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] when the exchange fails.
    async fn exchange_code(&self, code: &str) -> Result<OidcProfile, ApiError>;
}

// ============================================================================
// SECTION: Google Implementation
// ============================================================================

/// Google OIDC over the fixed endpoints.
pub struct GoogleOidc {
    /// Policed outbound client.
    http: OutboundHttp,
    /// OAuth client id.
    client_id: String,
    /// OAuth client secret.
    client_secret: String,
    /// Registered redirect URL.
    redirect_url: String,
}

impl GoogleOidc {
    /// Creates the client when the configuration enables Google login.
    #[must_use]
    pub fn from_config(config: &OauthConfig, http: OutboundHttp) -> Option<Self> {
        let client_id = config.google_client_id.clone()?;
        let client_secret = config.google_client_secret.clone()?;
        Some(Self {
            http,
            client_id,
            client_secret,
            redirect_url: config.redirect_url.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl OidcClient for GoogleOidc {
    fn authorization_url(&self, state: &str) -> String {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", state)
            .finish();
        format!("{AUTH_ENDPOINT}?{query}")
    }

    async fn exchange_code(&self, code: &str) -> Result<OidcProfile, ApiError> {
        let mut token_form = BTreeMap::new();
        token_form.insert("client_id".to_string(), self.client_id.clone());
        token_form.insert("client_secret".to_string(), self.client_secret.clone());
        token_form.insert("code".to_string(), code.to_string());
        token_form.insert("grant_type".to_string(), "authorization_code".to_string());
        token_form.insert("redirect_uri".to_string(), self.redirect_url.clone());
        let token_response = self
            .http
            .post_form(TOKEN_ENDPOINT, &token_form, EXCHANGE_TIMEOUT)
            .await
            .map_err(|err| ApiError::Unauthenticated(format!("token exchange failed: {err}")))?;
        if !token_response.is_success() {
            return Err(ApiError::Unauthenticated("token exchange rejected".to_string()));
        }
        let Some(access_token) =
            token_response.body.get("access_token").and_then(Value::as_str)
        else {
            return Err(ApiError::Unauthenticated("token exchange returned no token".to_string()));
        };

        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {access_token}"));
        let profile = self
            .http
            .get(USERINFO_ENDPOINT, &headers, EXCHANGE_TIMEOUT)
            .await
            .map_err(|err| ApiError::Unauthenticated(format!("userinfo failed: {err}")))?;
        if !profile.is_success() {
            return Err(ApiError::Unauthenticated("userinfo rejected".to_string()));
        }
        let email = profile
            .body
            .get("email")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Unauthenticated("userinfo returned no email".to_string()))?;
        Ok(OidcProfile {
            email: email.to_string(),
            first_name: profile
                .body
                .get("given_name")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            last_name: profile
                .body
                .get("family_name")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            picture: profile.body.get("picture").and_then(Value::as_str).map(ToString::to_string),
        })
    }
}
