// crates/flowgate-providers/src/registry.rs
// ============================================================================
// Module: Provider Registry
// Description: Routes dotted provider operations to the matching client.
// Purpose: One dispatch seam with tx-event accounting per endpoint call.
// Dependencies: crate::{flutterwave, http, mtn}, flowgate-core, serde_json
// ============================================================================

//! ## Overview
//! The registry resolves `provider.operation` node types (`mtn.requestToPay`,
//! `fW.fWVerifyPayment`, …) to client calls. Credentials arrive as the
//! decrypted vault payload and live only for the duration of the dispatch.
//! Every provider-endpoint call appends one tx event `{success, latency_ms}`
//! scoped to the initiating org through the injected [`TxRecorder`].
//!
//! Protocol responses flow back as data under a uniform `{status, body}`
//! shape so downstream nodes can branch on provider rejections; only
//! transport failures surface as errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use flowgate_core::Notification;
use flowgate_core::NotificationId;
use flowgate_core::NotificationKind;
use flowgate_core::OrgId;
use flowgate_core::Store;
use flowgate_core::Timestamp;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::flutterwave::FlutterwaveClient;
use crate::flutterwave::FlutterwaveCredentials;
use crate::http::HttpResponseData;
use crate::http::OutboundError;
use crate::http::OutboundHttp;
use crate::mtn::MtnClient;
use crate::mtn::MtnCredentials;

// ============================================================================
// SECTION: Tx Recorder
// ============================================================================

/// Sink receiving one record per provider-endpoint call.
pub trait TxRecorder: Send + Sync {
    /// Records the outcome of one outbound provider call.
    fn record(&self, org_id: OrgId, success: bool, latency_ms: Option<i64>);
}

/// Recorder that drops every record; used by tests and tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTxRecorder;

impl TxRecorder for NoopTxRecorder {
    fn record(&self, _org_id: OrgId, _success: bool, _latency_ms: Option<i64>) {}
}

/// Recorder appending tx events to the store; failed calls additionally
/// queue an error notification, which publishes the org's bus announcement.
pub struct StoreTxRecorder {
    /// Durable store capability.
    store: Arc<dyn Store>,
}

impl StoreTxRecorder {
    /// Creates a store-backed recorder.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
        }
    }
}

impl TxRecorder for StoreTxRecorder {
    fn record(&self, org_id: OrgId, success: bool, latency_ms: Option<i64>) {
        let now = Timestamp::now();
        if let Err(err) = self.store.record_tx_event(org_id, success, latency_ms, now) {
            tracing::warn!(%org_id, error = %err, "tx event lost");
        }
        if !success {
            let notification = Notification {
                id: NotificationId::generate(),
                org_id,
                kind: NotificationKind::Error,
                title: "Provider call failed".to_string(),
                message: "An outbound provider call did not succeed".to_string(),
                related_id: None,
                is_read: false,
                created_at: now,
            };
            if let Err(err) = self.store.insert_notification(&notification) {
                tracing::warn!(%org_id, error = %err, "provider-failure notification lost");
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dispatch failures. Provider protocol rejections are data, not errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider prefix is not known to the registry.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// The operation is not offered by the provider.
    #[error("unknown operation {operation} for provider {provider}")]
    UnknownOperation {
        /// Provider prefix.
        provider: String,
        /// Operation suffix.
        operation: String,
    },
    /// The decrypted credential payload did not match the provider's shape.
    #[error("provider credentials invalid: {0}")]
    BadCredentials(String),
    /// The node configuration is missing a required field.
    #[error("provider config invalid: {0}")]
    BadConfig(String),
    /// The outbound call failed at the transport level.
    #[error(transparent)]
    Transport(#[from] OutboundError),
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Provider dispatch registry shared by the engine and workers.
///
/// # Invariants
/// - Decrypted credentials are scoped to one dispatch and never stored.
pub struct ProviderRegistry {
    /// Shared outbound HTTP client.
    http: OutboundHttp,
    /// Tx event sink.
    recorder: Arc<dyn TxRecorder>,
    /// Optional MTN base URL override (sandbox relocation).
    mtn_base_url: Option<String>,
}

impl ProviderRegistry {
    /// Creates a registry.
    #[must_use]
    pub fn new(
        http: OutboundHttp,
        recorder: Arc<dyn TxRecorder>,
        mtn_base_url: Option<String>,
    ) -> Self {
        Self {
            http,
            recorder,
            mtn_base_url,
        }
    }

    /// Returns the outbound client the registry dispatches through.
    #[must_use]
    pub const fn http(&self) -> &OutboundHttp {
        &self.http
    }

    /// Dispatches one dotted provider operation.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] for unknown routes, malformed credentials
    /// or config, and transport failures. Provider rejections (non-2xx)
    /// return as data.
    pub async fn dispatch(
        &self,
        org_id: OrgId,
        provider: &str,
        operation: &str,
        credentials: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        match provider.to_ascii_lowercase().as_str() {
            "mtn" => self.dispatch_mtn(org_id, operation, credentials, config).await,
            "fw" | "flutterwave" => {
                self.dispatch_flutterwave(org_id, operation, credentials, config).await
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    /// Dispatches MTN MoMo operations.
    async fn dispatch_mtn(
        &self,
        org_id: OrgId,
        operation: &str,
        credentials: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        let credentials: MtnCredentials = serde_json::from_value(credentials.clone())
            .map_err(|err| ProviderError::BadCredentials(err.to_string()))?;
        let client = MtnClient::new(&self.http, credentials, self.mtn_base_url.as_deref());

        let token_response = self.recorded(org_id, client.token()).await?;
        if !token_response.is_success() {
            return Ok(staged_output("token", &token_response));
        }
        let Some(access_token) =
            token_response.body.get("access_token").and_then(Value::as_str)
        else {
            return Err(ProviderError::BadCredentials(
                "token exchange returned no access_token".to_string(),
            ));
        };

        match normalize_operation(operation).as_str() {
            "requesttopay" => {
                let (reference_id, response) =
                    self.recorded_pair(org_id, client.request_to_pay(access_token, config)).await?;
                let mut output = provider_output(&response);
                if let Value::Object(map) = &mut output {
                    map.insert("referenceId".to_string(), Value::String(reference_id));
                }
                Ok(output)
            }
            "requesttopaystatus" | "paymentstatus" => {
                let reference_id = require_config_str(config, "referenceId")?;
                let response = self
                    .recorded(org_id, client.payment_status(access_token, &reference_id))
                    .await?;
                Ok(provider_output(&response))
            }
            "balance" | "getbalance" => {
                let response = self.recorded(org_id, client.balance(access_token)).await?;
                Ok(provider_output(&response))
            }
            "accountholder" | "accountholderactive" | "validateaccountholder" => {
                let msisdn = require_config_str(config, "msisdn")?;
                let response = self
                    .recorded(org_id, client.account_holder_active(access_token, &msisdn))
                    .await?;
                Ok(provider_output(&response))
            }
            _ => Err(ProviderError::UnknownOperation {
                provider: "mtn".to_string(),
                operation: operation.to_string(),
            }),
        }
    }

    /// Dispatches Flutterwave operations.
    async fn dispatch_flutterwave(
        &self,
        org_id: OrgId,
        operation: &str,
        credentials: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        let credentials: FlutterwaveCredentials = serde_json::from_value(credentials.clone())
            .map_err(|err| ProviderError::BadCredentials(err.to_string()))?;
        let client = FlutterwaveClient::new(&self.http, credentials, None);

        match normalize_operation(operation).as_str() {
            "fwpay" | "hostedpayment" | "pay" => {
                let response = self.recorded(org_id, client.hosted_payment(config)).await?;
                Ok(provider_output(&response))
            }
            "fwverifypayment" | "verifypayment" | "verify" => {
                let tx_ref = require_config_str(config, "txRef")
                    .or_else(|_| require_config_str(config, "tx_ref"))?;
                let response =
                    self.recorded(org_id, client.verify_by_reference(&tx_ref)).await?;
                Ok(provider_output(&response))
            }
            _ => Err(ProviderError::UnknownOperation {
                provider: "flutterwave".to_string(),
                operation: operation.to_string(),
            }),
        }
    }

    /// Awaits one provider call, recording a tx event with its latency.
    async fn recorded(
        &self,
        org_id: OrgId,
        call: impl Future<Output = Result<HttpResponseData, OutboundError>>,
    ) -> Result<HttpResponseData, OutboundError> {
        let started = Instant::now();
        let result = call.await;
        let latency = latency_millis(started);
        match &result {
            Ok(response) => self.recorder.record(org_id, response.is_success(), Some(latency)),
            Err(_) => self.recorder.record(org_id, false, Some(latency)),
        }
        result
    }

    /// Awaits a provider call that also yields a reference id.
    async fn recorded_pair(
        &self,
        org_id: OrgId,
        call: impl Future<Output = Result<(String, HttpResponseData), OutboundError>>,
    ) -> Result<(String, HttpResponseData), OutboundError> {
        let started = Instant::now();
        let result = call.await;
        let latency = latency_millis(started);
        match &result {
            Ok((_, response)) => {
                self.recorder.record(org_id, response.is_success(), Some(latency));
            }
            Err(_) => self.recorder.record(org_id, false, Some(latency)),
        }
        result
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Lowercases an operation name for routing.
fn normalize_operation(operation: &str) -> String {
    operation.to_ascii_lowercase()
}

/// Reads a required string from node config.
fn require_config_str(config: &Value, key: &str) -> Result<String, ProviderError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ProviderError::BadConfig(format!("missing {key}")))
}

/// Uniform `{status, body}` output for provider responses.
fn provider_output(response: &HttpResponseData) -> Value {
    json!({
        "status": response.status,
        "body": response.body,
    })
}

/// `{stage, status, error}` output for a failed intermediate call.
fn staged_output(stage: &str, response: &HttpResponseData) -> Value {
    json!({
        "stage": stage,
        "status": response.status,
        "error": response.body,
    })
}

/// Milliseconds elapsed since `started`, saturating.
fn latency_millis(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
