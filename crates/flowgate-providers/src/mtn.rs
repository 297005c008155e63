// crates/flowgate-providers/src/mtn.rs
// ============================================================================
// Module: MTN MoMo Client
// Description: Collection-API adapter for MTN Mobile Money.
// Purpose: Token exchange, request-to-pay, status, balance, account lookup.
// Dependencies: crate::http, base64, serde, serde_json, uuid
// ============================================================================

//! ## Overview
//! Thin adapter over the MTN MoMo collection API. Every operation takes the
//! decrypted credential struct, builds the documented header set
//! (`Ocp-Apim-Subscription-Key`, `X-Target-Environment`, bearer or basic
//! auth), and returns the protocol response untouched. Token exchange uses
//! basic auth over the API user/key pair; all other operations expect an
//! access token obtained from it. Responses are data: a 4xx from MTN is a
//! branchable payload, not an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::http::HttpResponseData;
use crate::http::OutboundError;
use crate::http::OutboundHttp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default MoMo API origin (sandbox).
const DEFAULT_BASE_URL: &str = "https://sandbox.momodeveloper.mtn.com";

/// Per-call deadline for provider endpoints.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(6);

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Decrypted MTN MoMo credentials.
///
/// # Invariants
/// - Held in memory only for the duration of a call; the stored form is a
///   vault ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtnCredentials {
    /// Subscription key for the collection product.
    pub subscription_key: String,
    /// API user identifier.
    pub api_user: String,
    /// API key paired with the user.
    pub api_key: String,
    /// Target environment header value (`sandbox` when omitted).
    #[serde(default = "default_target_environment")]
    pub target_environment: String,
}

/// Default MoMo target environment.
fn default_target_environment() -> String {
    "sandbox".to_string()
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// MTN MoMo collection-API client bound to one credential set.
///
/// # Invariants
/// - `base_url` carries no trailing slash.
pub struct MtnClient<'a> {
    /// Shared outbound HTTP client.
    http: &'a OutboundHttp,
    /// API origin.
    base_url: String,
    /// Decrypted credentials for this call sequence.
    credentials: MtnCredentials,
}

impl<'a> MtnClient<'a> {
    /// Creates a client, honoring an optional base URL override.
    #[must_use]
    pub fn new(
        http: &'a OutboundHttp,
        credentials: MtnCredentials,
        base_url: Option<&str>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Exchanges the API user/key pair for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on transport failure only.
    pub async fn token(&self) -> Result<HttpResponseData, OutboundError> {
        let basic = BASE64
            .encode(format!("{}:{}", self.credentials.api_user, self.credentials.api_key));
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), format!("Basic {basic}"));
        headers.insert(
            "Ocp-Apim-Subscription-Key".to_string(),
            self.credentials.subscription_key.clone(),
        );
        self.http
            .execute(
                "POST",
                &format!("{}/collection/token/", self.base_url),
                &headers,
                None,
                PROVIDER_TIMEOUT,
            )
            .await
    }

    /// Submits a request-to-pay and returns the generated reference id with
    /// the protocol response.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on transport failure only.
    pub async fn request_to_pay(
        &self,
        access_token: &str,
        payload: &Value,
    ) -> Result<(String, HttpResponseData), OutboundError> {
        let reference_id = Uuid::new_v4().to_string();
        let mut headers = self.bearer_headers(access_token);
        headers.insert("X-Reference-Id".to_string(), reference_id.clone());
        let response = self
            .http
            .execute(
                "POST",
                &format!("{}/collection/v1_0/requesttopay", self.base_url),
                &headers,
                Some(payload),
                PROVIDER_TIMEOUT,
            )
            .await?;
        Ok((reference_id, response))
    }

    /// Reads the status of a prior request-to-pay.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on transport failure only.
    pub async fn payment_status(
        &self,
        access_token: &str,
        reference_id: &str,
    ) -> Result<HttpResponseData, OutboundError> {
        self.http
            .get(
                &format!("{}/collection/v1_0/requesttopay/{reference_id}", self.base_url),
                &self.bearer_headers(access_token),
                PROVIDER_TIMEOUT,
            )
            .await
    }

    /// Reads the collection account balance.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on transport failure only.
    pub async fn balance(&self, access_token: &str) -> Result<HttpResponseData, OutboundError> {
        self.http
            .get(
                &format!("{}/collection/v1_0/account/balance", self.base_url),
                &self.bearer_headers(access_token),
                PROVIDER_TIMEOUT,
            )
            .await
    }

    /// Checks whether an MSISDN account holder is active.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on transport failure only.
    pub async fn account_holder_active(
        &self,
        access_token: &str,
        msisdn: &str,
    ) -> Result<HttpResponseData, OutboundError> {
        self.http
            .get(
                &format!(
                    "{}/collection/v1_0/accountholder/msisdn/{msisdn}/active",
                    self.base_url
                ),
                &self.bearer_headers(access_token),
                PROVIDER_TIMEOUT,
            )
            .await
    }

    /// Builds the bearer + subscription header set shared by authenticated
    /// operations.
    fn bearer_headers(&self, access_token: &str) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {access_token}"));
        headers.insert(
            "Ocp-Apim-Subscription-Key".to_string(),
            self.credentials.subscription_key.clone(),
        );
        headers.insert(
            "X-Target-Environment".to_string(),
            self.credentials.target_environment.clone(),
        );
        headers
    }
}
