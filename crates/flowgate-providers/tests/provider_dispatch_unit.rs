// crates/flowgate-providers/tests/provider_dispatch_unit.rs
// ============================================================================
// Module: Provider Dispatch Unit Tests
// Description: Registry routing, tx accounting, and protocol-as-data shape.
// Purpose: Pin dispatch behavior against a local HTTP fixture.
// ============================================================================

//! ## Overview
//! Runs the MTN dispatch path against a local fixture standing in for the
//! MoMo sandbox: token exchange then operation, one tx event per endpoint
//! call, and non-2xx responses surfacing as branchable data. Also covers the
//! Flutterwave webhook signature check and unknown-route errors.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use flowgate_core::OrgId;
use flowgate_providers::FlutterwaveClient;
use flowgate_providers::FlutterwaveCredentials;
use flowgate_providers::OutboundHttp;
use flowgate_providers::ProviderError;
use flowgate_providers::ProviderRegistry;
use flowgate_providers::TxRecorder;
use flowgate_providers::UrlPolicy;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Recorder capturing `(success, latency_present)` pairs.
#[derive(Default)]
struct RecordingTx {
    /// Captured records in call order.
    records: Mutex<Vec<(bool, bool)>>,
}

impl RecordingTx {
    fn captured(&self) -> Vec<(bool, bool)> {
        self.records.lock().expect("records lock").clone()
    }
}

impl TxRecorder for RecordingTx {
    fn record(&self, _org_id: OrgId, success: bool, latency_ms: Option<i64>) {
        self.records.lock().expect("records lock").push((success, latency_ms.is_some()));
    }
}

/// Starts a fixture that answers the token endpoint then one operation call.
/// `operation_status` controls the second response's status code.
fn momo_fixture(operation_status: u16) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let base = format!("http://{addr}");
    let handle = thread::spawn(move || {
        // Token exchange.
        if let Ok(request) = server.recv() {
            let body = json!({ "access_token": "token-abc", "expires_in": 3600 }).to_string();
            let response = Response::from_string(body).with_status_code(200);
            let response = match "Content-Type: application/json".parse::<Header>() {
                Ok(header) => response.with_header(header),
                Err(()) => response,
            };
            let _ = request.respond(response);
        }
        // Operation call.
        if let Ok(request) = server.recv() {
            let body = json!({ "status": "PENDING" }).to_string();
            let _ = request
                .respond(Response::from_string(body).with_status_code(operation_status));
        }
    });
    (base, handle)
}

/// Builds a registry against the fixture origin.
fn registry_for(base: &str) -> (ProviderRegistry, Arc<RecordingTx>) {
    let recorder = Arc::new(RecordingTx::default());
    let http = OutboundHttp::new(UrlPolicy::permit_private_hosts()).unwrap();
    let registry = ProviderRegistry::new(http, recorder.clone(), Some(base.to_string()));
    (registry, recorder)
}

/// MTN credential payload as it comes out of the vault.
fn mtn_credentials() -> serde_json::Value {
    json!({
        "subscriptionKey": "ocp-123",
        "apiUser": "user-1",
        "apiKey": "key-1",
    })
}

// ============================================================================
// SECTION: MTN Dispatch
// ============================================================================

#[tokio::test]
async fn request_to_pay_records_two_tx_events_and_returns_reference() {
    let (base, handle) = momo_fixture(202);
    let (registry, recorder) = registry_for(&base);
    let output = registry
        .dispatch(
            OrgId::generate(),
            "mtn",
            "requestToPay",
            &mtn_credentials(),
            &json!({ "amount": "100", "currency": "EUR" }),
        )
        .await
        .unwrap();
    handle.join().unwrap();

    assert_eq!(output["status"], 202);
    assert!(output["referenceId"].as_str().is_some_and(|r| !r.is_empty()));
    // Token exchange plus the operation: two records, both successful.
    assert_eq!(recorder.captured(), vec![(true, true), (true, true)]);
}

#[tokio::test]
async fn provider_rejection_comes_back_as_data() {
    let (base, handle) = momo_fixture(401);
    let (registry, recorder) = registry_for(&base);
    let output = registry
        .dispatch(
            OrgId::generate(),
            "mtn",
            "balance",
            &mtn_credentials(),
            &json!({}),
        )
        .await
        .unwrap();
    handle.join().unwrap();

    assert_eq!(output["status"], 401);
    // The rejected call is still accounted, as a failure.
    assert_eq!(recorder.captured(), vec![(true, true), (false, true)]);
}

#[tokio::test]
async fn unknown_provider_and_operation_are_errors() {
    let (registry, _) = registry_for("http://127.0.0.1:9");
    let unknown_provider = registry
        .dispatch(OrgId::generate(), "carrier-pigeon", "fly", &json!({}), &json!({}))
        .await;
    assert!(matches!(unknown_provider, Err(ProviderError::UnknownProvider(_))));

    let (base, handle) = momo_fixture(200);
    let (registry, _) = registry_for(&base);
    let unknown_operation = registry
        .dispatch(OrgId::generate(), "mtn", "teleport", &mtn_credentials(), &json!({}))
        .await;
    assert!(matches!(unknown_operation, Err(ProviderError::UnknownOperation { .. })));
    drop(handle);
}

#[tokio::test]
async fn malformed_credentials_fail_before_any_call() {
    let (registry, recorder) = registry_for("http://127.0.0.1:9");
    let result = registry
        .dispatch(
            OrgId::generate(),
            "mtn",
            "requestToPay",
            &json!({ "wrong": "shape" }),
            &json!({}),
        )
        .await;
    assert!(matches!(result, Err(ProviderError::BadCredentials(_))));
    assert!(recorder.captured().is_empty());
}

// ============================================================================
// SECTION: Flutterwave Webhook
// ============================================================================

#[test]
fn webhook_signature_requires_exact_secret() {
    let http = OutboundHttp::new(UrlPolicy::strict()).unwrap();
    let client = FlutterwaveClient::new(
        &http,
        FlutterwaveCredentials {
            secret_key: "FLWSECK-x".to_string(),
            public_key: None,
            webhook_secret: Some("hook-secret".to_string()),
        },
        None,
    );
    assert!(client.verify_webhook_signature("hook-secret"));
    assert!(!client.verify_webhook_signature("hook-secret "));
    assert!(!client.verify_webhook_signature("other"));
    assert!(!client.verify_webhook_signature(""));
}

#[test]
fn webhook_signature_fails_closed_without_secret() {
    let http = OutboundHttp::new(UrlPolicy::strict()).unwrap();
    let client = FlutterwaveClient::new(
        &http,
        FlutterwaveCredentials {
            secret_key: "FLWSECK-x".to_string(),
            public_key: None,
            webhook_secret: None,
        },
        None,
    );
    assert!(!client.verify_webhook_signature("anything"));
}
