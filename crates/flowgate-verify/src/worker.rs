// crates/flowgate-verify/src/worker.rs
// ============================================================================
// Module: Verification Worker
// Description: Probe scheduling, header heuristics, and state settlement.
// Purpose: Turn an integration's credentials into a verified health status.
// Dependencies: flowgate-core, flowgate-providers, tokio, tracing
// ============================================================================

//! ## Overview
//! One short-lived task per verification: mark `pending`, wait the deferral,
//! choose a probe URL (explicit test URL, then a provider default inferred
//! from the integration name), issue a bounded GET with the credential
//! header heuristic, and settle to `active` or `error` with a notification.
//! Probes are keyed by integration id; concurrent re-verification is allowed
//! and the last write wins on `last_checked`.
//!
//! Header heuristic: keys shaped like `sk_…`/`pk_…` ride in
//! `Authorization: Bearer` alone; anything else is sent as both
//! `Authorization: Bearer` and `X-Api-Key`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use flowgate_core::IntegrationId;
use flowgate_core::IntegrationStatus;
use flowgate_core::Notification;
use flowgate_core::NotificationId;
use flowgate_core::NotificationKind;
use flowgate_core::OrgId;
use flowgate_core::Store;
use flowgate_core::Timestamp;
use flowgate_providers::OutboundHttp;

// ============================================================================
// SECTION: Settings & Request
// ============================================================================

/// Verification timing knobs.
///
/// # Invariants
/// - `probe_timeout` is positive; `defer` may be zero in tests only.
#[derive(Debug, Clone, Copy)]
pub struct VerifySettings {
    /// Deferral before the probe so subscribers observe `pending`.
    pub defer: Duration,
    /// Probe deadline.
    pub probe_timeout: Duration,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            defer: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(6),
        }
    }
}

/// One verification job.
///
/// # Invariants
/// - `api_key` is transient probe material; it is never persisted.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Integration to verify.
    pub integration_id: IntegrationId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Integration name (drives the provider-default URL inference).
    pub name: String,
    /// Credential to probe with.
    pub api_key: String,
    /// Explicit probe URL override.
    pub test_url: Option<String>,
}

/// Environment-backed credentials consumed by the startup self-check.
///
/// # Invariants
/// - `None` means the credential is absent from the environment.
#[derive(Debug, Clone, Default)]
pub struct StartupCredentials {
    /// Flutterwave secret key.
    pub flutterwave_key: Option<String>,
    /// MTN MoMo subscription key.
    pub mtn_subscription_key: Option<String>,
}

// ============================================================================
// SECTION: Provider Defaults
// ============================================================================

/// Infers a provider default probe URL from an integration name.
fn default_probe_url(name: &str) -> Option<&'static str> {
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("stripe") {
        Some("https://api.stripe.com/v1/charges?limit=1")
    } else if lowered.contains("flutterwave") || lowered.contains("flw") {
        Some("https://api.flutterwave.com/v3/transactions?page=1")
    } else if lowered.contains("mtn") || lowered.contains("momo") {
        Some("https://sandbox.momodeveloper.mtn.com/collection/v1_0/account/balance")
    } else if lowered.contains("paystack") {
        Some("https://api.paystack.co/transaction?perPage=1")
    } else if lowered.contains("sendgrid") {
        Some("https://api.sendgrid.com/v3/user/profile")
    } else {
        None
    }
}

/// Builds the credential header set for a probe.
fn probe_headers(api_key: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Authorization".to_string(), format!("Bearer {api_key}"));
    let bearer_only =
        api_key.starts_with("sk_") || api_key.starts_with("pk_");
    if !bearer_only {
        headers.insert("X-Api-Key".to_string(), api_key.to_string());
    }
    headers
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// The verification worker.
///
/// # Invariants
/// - Every status write goes through the store (which broadcasts
///   `integrations:update`); the worker never touches rooms directly.
/// - Provider failures are absorbed into `status = error` plus a
///   notification; nothing propagates to the API caller.
pub struct VerificationWorker {
    /// Durable store capability.
    store: Arc<dyn Store>,
    /// Policed outbound HTTP client.
    http: OutboundHttp,
    /// Timing knobs.
    settings: VerifySettings,
}

impl VerificationWorker {
    /// Creates a worker.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, http: OutboundHttp, settings: VerifySettings) -> Self {
        Self {
            store,
            http,
            settings,
        }
    }

    /// Marks the integration `pending` and spawns the deferred probe task.
    /// Returns once the pending state is committed.
    pub fn spawn_probe(self: &Arc<Self>, request: VerificationRequest) {
        if let Err(err) = self.store.set_integration_status(
            request.integration_id,
            IntegrationStatus::Pending,
            Timestamp::now(),
        ) {
            tracing::warn!(integration = %request.integration_id, error = %err,
                "pending mark failed; probe skipped");
            return;
        }
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(worker.settings.defer).await;
            worker.run_probe(&request).await;
        });
    }

    /// Runs one probe to settlement.
    async fn run_probe(&self, request: &VerificationRequest) {
        let Some(url) = request
            .test_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| default_probe_url(&request.name).map(ToString::to_string))
        else {
            self.settle(
                request,
                IntegrationStatus::Error,
                NotificationKind::Error,
                format!("Integration {}: no valid Test URL", request.name),
            );
            return;
        };

        let headers = probe_headers(&request.api_key);
        match self.http.get(&url, &headers, self.settings.probe_timeout).await {
            Ok(response) if response.is_success() => {
                self.settle(
                    request,
                    IntegrationStatus::Active,
                    NotificationKind::Info,
                    format!("Integration active: {}", request.name),
                );
            }
            Ok(response) => {
                self.settle(
                    request,
                    IntegrationStatus::Error,
                    NotificationKind::Error,
                    format!(
                        "Integration {} verification failed: HTTP {}",
                        request.name, response.status
                    ),
                );
            }
            Err(err) => {
                self.settle(
                    request,
                    IntegrationStatus::Error,
                    NotificationKind::Error,
                    format!("Integration {} verification failed: {err}", request.name),
                );
            }
        }
    }

    /// Writes the final status (broadcasting `integrations:update`) and the
    /// user-visible notification.
    fn settle(
        &self,
        request: &VerificationRequest,
        status: IntegrationStatus,
        kind: NotificationKind,
        message: String,
    ) {
        if let Err(err) = self.store.set_integration_status(
            request.integration_id,
            status,
            Timestamp::now(),
        ) {
            tracing::warn!(integration = %request.integration_id, error = %err,
                "status settlement failed");
        }
        let notification = Notification {
            id: NotificationId::generate(),
            org_id: request.org_id,
            kind,
            title: match status {
                IntegrationStatus::Active => "Integration active".to_string(),
                _ => "Integration verification failed".to_string(),
            },
            message,
            related_id: Some(request.integration_id.to_string()),
            is_read: false,
            created_at: Timestamp::now(),
        };
        if let Err(err) = self.store.insert_notification(&notification) {
            tracing::warn!(integration = %request.integration_id, error = %err,
                "verification notification lost");
        }
    }

    // ------------------------------------------------------------------
    // Startup self-check
    // ------------------------------------------------------------------

    /// Re-verifies integrations whose providers are credentialed through the
    /// environment. Missing credentials flip matching integrations straight
    /// to `error`; present credentials trigger a normal deferred probe.
    pub async fn startup_self_check(self: &Arc<Self>, credentials: &StartupCredentials) {
        self.self_check_provider("flutterwave", credentials.flutterwave_key.as_deref()).await;
        self.self_check_provider("mtn", credentials.mtn_subscription_key.as_deref()).await;
    }

    /// Runs the self-check for one provider name fragment.
    async fn self_check_provider(self: &Arc<Self>, fragment: &str, api_key: Option<&str>) {
        let matching = match self.store.integrations_matching_name(fragment) {
            Ok(matching) => matching,
            Err(err) => {
                tracing::warn!(provider = fragment, error = %err, "self-check listing failed");
                return;
            }
        };
        for integration in matching {
            match api_key {
                Some(api_key) => {
                    self.spawn_probe(VerificationRequest {
                        integration_id: integration.id,
                        org_id: integration.org_id,
                        name: integration.name.clone(),
                        api_key: api_key.to_string(),
                        test_url: integration.test_url.clone(),
                    });
                }
                None => {
                    self.settle(
                        &VerificationRequest {
                            integration_id: integration.id,
                            org_id: integration.org_id,
                            name: integration.name.clone(),
                            api_key: String::new(),
                            test_url: None,
                        },
                        IntegrationStatus::Error,
                        NotificationKind::Error,
                        format!(
                            "Integration {}: provider credentials missing from environment",
                            integration.name
                        ),
                    );
                }
            }
        }
    }
}
