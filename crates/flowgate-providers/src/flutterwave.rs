// crates/flowgate-providers/src/flutterwave.rs
// ============================================================================
// Module: Flutterwave Client
// Description: Hosted payment, verification, and webhook signature checks.
// Purpose: Adapter over the Flutterwave v3 API.
// Dependencies: crate::http, serde, serde_json
// ============================================================================

//! ## Overview
//! Thin adapter over the Flutterwave v3 API: hosted payment creation,
//! verify-by-reference, and the inbound webhook signature check. Outbound
//! calls authenticate with the secret key as a bearer token; webhook checks
//! compare the `verif-hash` header against the configured secret in constant
//! time. Protocol responses are data, never errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::http::HttpResponseData;
use crate::http::OutboundError;
use crate::http::OutboundHttp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Flutterwave v3 API origin.
const DEFAULT_BASE_URL: &str = "https://api.flutterwave.com/v3";

/// Per-call deadline for provider endpoints.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(6);

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Decrypted Flutterwave credentials.
///
/// # Invariants
/// - Held in memory only for the duration of a call; the stored form is a
///   vault ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlutterwaveCredentials {
    /// Secret key used as the bearer token.
    pub secret_key: String,
    /// Public key surfaced to hosted pages.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Webhook verification secret (`verif-hash` expectation).
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Flutterwave v3 client bound to one credential set.
///
/// # Invariants
/// - `base_url` carries no trailing slash.
pub struct FlutterwaveClient<'a> {
    /// Shared outbound HTTP client.
    http: &'a OutboundHttp,
    /// API origin.
    base_url: String,
    /// Decrypted credentials for this call sequence.
    credentials: FlutterwaveCredentials,
}

impl<'a> FlutterwaveClient<'a> {
    /// Creates a client, honoring an optional base URL override.
    #[must_use]
    pub fn new(
        http: &'a OutboundHttp,
        credentials: FlutterwaveCredentials,
        base_url: Option<&str>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Creates a hosted payment and returns the protocol response (the
    /// payment link lives in `data.link` on success).
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on transport failure only.
    pub async fn hosted_payment(
        &self,
        payload: &Value,
    ) -> Result<HttpResponseData, OutboundError> {
        self.http
            .execute(
                "POST",
                &format!("{}/payments", self.base_url),
                &self.bearer_headers(),
                Some(payload),
                PROVIDER_TIMEOUT,
            )
            .await
    }

    /// Verifies a transaction by merchant reference.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on transport failure only.
    pub async fn verify_by_reference(
        &self,
        tx_ref: &str,
    ) -> Result<HttpResponseData, OutboundError> {
        let encoded: String = url::form_urlencoded::byte_serialize(tx_ref.as_bytes()).collect();
        self.http
            .get(
                &format!("{}/transactions/verify_by_reference?tx_ref={encoded}", self.base_url),
                &self.bearer_headers(),
                PROVIDER_TIMEOUT,
            )
            .await
    }

    /// Checks an inbound webhook's `verif-hash` header against the
    /// configured secret. Returns false when no secret is configured.
    #[must_use]
    pub fn verify_webhook_signature(&self, provided: &str) -> bool {
        self.credentials
            .webhook_secret
            .as_deref()
            .is_some_and(|secret| constant_time_eq(provided.as_bytes(), secret.as_bytes()))
    }

    /// Builds the bearer header set.
    fn bearer_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers
            .insert("Authorization".to_string(), format!("Bearer {}", self.credentials.secret_key));
        headers
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Constant-time byte comparison for webhook secrets.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut diff = 0_u8;
    for (a, b) in left.iter().zip(right.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}
