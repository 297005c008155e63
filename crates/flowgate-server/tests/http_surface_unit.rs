// crates/flowgate-server/tests/http_surface_unit.rs
// ============================================================================
// Module: HTTP Surface Unit Tests
// Description: Gate policy and route behavior over the assembled router.
// Purpose: Pin auth flows, rate quotas, IP denial, and flow endpoints.
// ============================================================================

//! ## Overview
//! Drives the real router with `tower::ServiceExt::oneshot` over a SQLite
//! store: session issuance and verification, indistinguishable login
//! failures, the rate quota with its headers, IP allowlist denial with the
//! current-IP echo, flow CRUD with insert-time graph validation, and the
//! deploy-on-activate execution.

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
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::COOKIE;
use flowgate_bus::RoomRegistry;
use flowgate_core::ExecutionStatus;
use flowgate_core::ExecutionStore;
use flowgate_core::IdentityStore;
use flowgate_core::NoopMailer;
use flowgate_core::NoopStoreEventSink;
use flowgate_core::OrgId;
use flowgate_core::Organization;
use flowgate_core::PolicyStore;
use flowgate_core::Principal;
use flowgate_core::Store;
use flowgate_core::TenantStore;
use flowgate_core::Timestamp;
use flowgate_core::User;
use flowgate_core::UserId;
use flowgate_engine::EngineSettings;
use flowgate_engine::ExecutionRunner;
use flowgate_providers::NoopTxRecorder;
use flowgate_providers::OutboundHttp;
use flowgate_providers::ProviderRegistry;
use flowgate_providers::UrlPolicy;
use flowgate_server::AppState;
use flowgate_server::SessionSigner;
use flowgate_server::audit::Auditor;
use flowgate_server::build_router;
use flowgate_server::reports::ReportWriter;
use flowgate_server::session::SessionVariant;
use flowgate_store_sqlite::SqliteStore;
use http_body_util::BodyExt;
use serde_json::Value;
use serde_json::json;
use tower::util::ServiceExt;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Test world: router plus direct store access.
struct World {
    router: Router,
    store: Arc<SqliteStore>,
    sessions: Arc<SessionSigner>,
}

/// Builds the world over an in-memory store.
fn world() -> World {
    let store = Arc::new(SqliteStore::open_in_memory(Arc::new(NoopStoreEventSink)).unwrap());
    let http = OutboundHttp::new(UrlPolicy::permit_private_hosts()).unwrap();
    let registry = Arc::new(ProviderRegistry::new(http.clone(), Arc::new(NoopTxRecorder), None));
    let runner = Arc::new(ExecutionRunner::new(
        store.clone() as Arc<dyn Store>,
        registry,
        None,
        Arc::new(NoopMailer),
        EngineSettings {
            http_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(1),
        },
    ));
    let verifier = Arc::new(flowgate_verify::VerificationWorker::new(
        store.clone() as Arc<dyn Store>,
        http,
        flowgate_verify::VerifySettings {
            defer: Duration::from_millis(10),
            probe_timeout: Duration::from_secs(2),
        },
    ));
    let session_config = flowgate_config::SessionConfig {
        jwt_secret: "test-secret-0123456789".to_string(),
        ..flowgate_config::SessionConfig::default()
    };
    let sessions = Arc::new(SessionSigner::new(&session_config, false));
    let reports_dir = tempfile_dir();
    let state = AppState {
        store: store.clone() as Arc<dyn Store>,
        runner,
        verifier,
        rooms: Arc::new(RoomRegistry::new(16)),
        vault: None,
        mailer: Arc::new(NoopMailer),
        sessions: sessions.clone(),
        auditor: Arc::new(Auditor::new(store.clone() as Arc<dyn Store>)),
        oidc: None,
        reports: Arc::new(ReportWriter::new(reports_dir)),
        frontend_origin: None,
        outbound: OutboundHttp::new(UrlPolicy::permit_private_hosts()).unwrap(),
        sandbox_fetch_timeout: Duration::from_secs(10),
    };
    World {
        router: build_router(state),
        store,
        sessions,
    }
}

/// A per-test scratch directory that leaks intentionally (process-lived).
fn tempfile_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("flowgate-test-{}", UserId::generate()))
}

/// Seeds an org and user; returns the principal and its session cookie.
fn seed_principal(world: &World, rate_limit: u32, allow_ip: bool) -> (Principal, String) {
    let org = Organization {
        id: OrgId::generate(),
        name: format!("org-{}", OrgId::generate()),
        created_at: Timestamp::now(),
    };
    world.store.create_organization(&org).unwrap();
    let user = User {
        id: UserId::generate(),
        org_id: org.id,
        email: format!("{}@example.test", user_tag(org.id)),
        password_hash: None,
        first_name: None,
        last_name: None,
        deactivated_at: None,
        rate_limit,
        allow_ip_whitelist: allow_ip,
        send_error_alerts: false,
        profile_picture: None,
    };
    world.store.create_user(&user).unwrap();
    let principal = Principal {
        user_id: user.id,
        org_id: org.id,
        email: user.email,
    };
    let token = world.sessions.issue(&principal, SessionVariant::Default).unwrap();
    (principal, format!("fg_session={token}"))
}

/// Short unique tag for seeded emails.
fn user_tag(org_id: OrgId) -> String {
    org_id.to_string().chars().take(8).collect()
}

/// Sends one request through the router.
async fn send(world: &World, request: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
    let response = world.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body, headers)
}

/// Builds a JSON request with an optional session cookie.
fn json_request(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let world = world();
    let (status, body, _) = send(&world, json_request("GET", "/flows", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthenticated");
}

#[tokio::test]
async fn fallback_cookie_is_accepted() {
    let world = world();
    let (principal, cookie) = seed_principal(&world, 100, false);
    let fallback = cookie.replace("fg_session=", "fg_session_dev=");
    let (status, body, _) =
        send(&world, json_request("GET", "/auth/me", Some(&fallback), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], Value::String(principal.email));
}

#[tokio::test]
async fn garbage_tokens_are_unauthenticated() {
    let world = world();
    let (status, _, _) = send(
        &world,
        json_request("GET", "/auth/me", Some("fg_session=not-a-jwt"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// SECTION: Signup & Login
// ============================================================================

#[tokio::test]
async fn signup_verify_login_round_trip() {
    let world = world();
    let email = "new.user@example.test";
    let (status, _, _) = send(
        &world,
        json_request(
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "email": email, "password": "correct-horse" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // The pending row holds the mailed code; read it directly.
    let pending = world.store.pending_user_by_email(email).unwrap().unwrap();
    let (status, body, headers) = send(
        &world,
        json_request(
            "POST",
            "/auth/verify",
            None,
            Some(json!({ "email": email, "code": pending.verification_code })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], email);
    assert!(headers.get_all("set-cookie").iter().count() >= 1);
    assert!(world.store.pending_user_by_email(email).unwrap().is_none());
    assert!(world.store.user_by_email(email).unwrap().is_some());

    let (status, _, headers) = send(
        &world,
        json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": "correct-horse" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get_all("set-cookie").iter().count() >= 1);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let world = world();
    let (unknown_status, unknown_body, _) = send(
        &world,
        json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "ghost@example.test", "password": "whatever1" })),
        ),
    )
    .await;

    // Seed a real account through signup + verify, then use a wrong password.
    let email = "real.user@example.test";
    send(
        &world,
        json_request(
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "email": email, "password": "correct-horse" })),
        ),
    )
    .await;
    let pending = world.store.pending_user_by_email(email).unwrap().unwrap();
    send(
        &world,
        json_request(
            "POST",
            "/auth/verify",
            None,
            Some(json!({ "email": email, "code": pending.verification_code })),
        ),
    )
    .await;
    let (wrong_status, wrong_body, _) = send(
        &world,
        json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": "wrong-password" })),
        ),
    )
    .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body, wrong_body);
}

#[tokio::test]
async fn forgot_password_always_answers_ok() {
    let world = world();
    let (status, _, _) = send(
        &world,
        json_request(
            "POST",
            "/auth/forgot-password",
            None,
            Some(json!({ "email": "ghost@example.test" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// SECTION: Rate Quota
// ============================================================================

#[tokio::test]
async fn sixth_request_in_the_hour_is_rate_limited() {
    let world = world();
    let (principal, cookie) = seed_principal(&world, 5, false);

    for expected_remaining in (0..5_u64).rev() {
        let (status, _, headers) =
            send(&world, json_request("GET", "/flows", Some(&cookie), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get("X-RateLimit-Limit").and_then(|v| v.to_str().ok()),
            Some("5")
        );
        assert_eq!(
            headers.get("X-RateLimit-Remaining").and_then(|v| v.to_str().ok()),
            Some(expected_remaining.to_string().as_str())
        );
    }

    let (status, _, headers) =
        send(&world, json_request("GET", "/flows", Some(&cookie), None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers.get("Retry-After").and_then(|v| v.to_str().ok()), Some("3600"));
    assert_eq!(
        headers.get("X-RateLimit-Remaining").and_then(|v| v.to_str().ok()),
        Some("0")
    );

    // Exactly five samples were accounted; the rejected call inserted none.
    let since = Timestamp::now().saturating_sub_millis(60 * 60 * 1_000);
    assert_eq!(world.store.count_rate_samples_since(principal.user_id, since).unwrap(), 5);
}

// ============================================================================
// SECTION: IP Allowlist
// ============================================================================

#[tokio::test]
async fn allowlist_denies_foreign_addresses_and_echoes_current_ip() {
    let world = world();
    let (principal, cookie) = seed_principal(&world, 100, true);
    world
        .store
        .add_ip_allowlist_entry(principal.user_id, "10.0.0.5", None, Timestamp::now())
        .unwrap();

    let denied = Request::builder()
        .method("GET")
        .uri("/flows")
        .header(COOKIE, &cookie)
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(&world, denied).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["currentIp"], "198.51.100.7");

    let allowed = Request::builder()
        .method("GET")
        .uri("/flows")
        .header(COOKIE, &cookie)
        .header("x-forwarded-for", "10.0.0.5")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&world, allowed).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ipv6_mapped_forwarded_addresses_normalize() {
    let world = world();
    let (principal, cookie) = seed_principal(&world, 100, true);
    world
        .store
        .add_ip_allowlist_entry(principal.user_id, "10.0.0.5", None, Timestamp::now())
        .unwrap();
    let request = Request::builder()
        .method("GET")
        .uri("/flows")
        .header(COOKIE, &cookie)
        .header("x-forwarded-for", "::ffff:10.0.0.5")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&world, request).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// SECTION: Flows & Versions
// ============================================================================

#[tokio::test]
async fn flow_lifecycle_with_validation_and_deploy() {
    let world = world();
    let (principal, cookie) = seed_principal(&world, 1_000, false);

    let (status, flow, _) = send(
        &world,
        json_request("POST", "/flows", Some(&cookie), Some(json!({ "name": "Pay" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let flow_id = flow["id"].as_str().unwrap().to_string();

    // A cyclic graph is rejected at insert time.
    let cyclic = json!({
        "graph": {
            "nodes": [
                { "id": "a", "type": "start" },
                { "id": "b", "type": "end" },
            ],
            "edges": [
                { "from": "a", "to": "b" },
                { "from": "b", "to": "a" },
            ],
        }
    });
    let (status, body, _) = send(
        &world,
        json_request("POST", &format!("/flows/{flow_id}/versions"), Some(&cookie), Some(cyclic)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_graph");

    // A valid graph stores as version 1.
    let valid = json!({
        "graph": {
            "nodes": [
                { "id": "start", "type": "start" },
                { "id": "end", "type": "end" },
            ],
            "edges": [ { "from": "start", "to": "end" } ],
        }
    });
    let (status, version, _) = send(
        &world,
        json_request("POST", &format!("/flows/{flow_id}/versions"), Some(&cookie), Some(valid)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(version["version"], 1);

    // Activation starts a deploy-triggered execution.
    let (status, body, _) = send(
        &world,
        json_request(
            "PATCH",
            &format!("/flows/{flow_id}/status"),
            Some(&cookie),
            Some(json!({ "status": "active" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let execution_id = body["execution"]["execution_id"].as_str().unwrap().to_string();

    // Poll the execution to completion through the API.
    let mut terminal = None;
    for _ in 0..100 {
        let (status, execution, _) = send(
            &world,
            json_request("GET", &format!("/executions/{execution_id}"), Some(&cookie), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        if execution["status"] != "running" {
            terminal = Some(execution);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let terminal = terminal.expect("execution never settled");
    assert_eq!(terminal["status"], "completed");
    assert_eq!(terminal["trigger_type"], "deploy");

    // Soft delete hides the flow from listings.
    let (status, _, _) = send(
        &world,
        json_request("DELETE", &format!("/flows/{flow_id}"), Some(&cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, flows, _) = send(&world, json_request("GET", "/flows", Some(&cookie), None)).await;
    assert_eq!(flows.as_array().map(Vec::len), Some(0));

    // Audit rows exist for the mutations; verify one directly.
    let executions = world
        .store
        .recent_executions_for_org(principal.org_id, 10)
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn starting_an_execution_answers_accepted() {
    let world = world();
    let (_, cookie) = seed_principal(&world, 1_000, false);
    let (_, flow, _) = send(
        &world,
        json_request("POST", "/flows", Some(&cookie), Some(json!({ "name": "Ship" }))),
    )
    .await;
    let flow_id = flow["id"].as_str().unwrap().to_string();
    let version = json!({
        "graph": {
            "nodes": [ { "id": "s", "type": "start" } ],
            "edges": [],
        }
    });
    send(
        &world,
        json_request("POST", &format!("/flows/{flow_id}/versions"), Some(&cookie), Some(version)),
    )
    .await;

    let (status, body, _) = send(
        &world,
        json_request(
            "POST",
            "/executions/start",
            Some(&cookie),
            Some(json!({ "flow_id": flow_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "running");
    assert_eq!(body["flow_name"], "Ship");
}

// ============================================================================
// SECTION: Connections & Vault
// ============================================================================

#[tokio::test]
async fn connection_creation_fails_closed_without_a_vault_key() {
    let world = world();
    let (_, cookie) = seed_principal(&world, 1_000, false);
    let (status, _, _) = send(
        &world,
        json_request(
            "POST",
            "/connections",
            Some(&cookie),
            Some(json!({
                "provider": "mtn",
                "label": "sandbox collection",
                "config": { "subscriptionKey": "ocp-1", "apiUser": "u", "apiKey": "k" },
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn connections_store_ciphertext_and_list_metadata_only() {
    let mut world = world();
    // Rebuild the router with a vault key installed.
    let vault = Arc::new(flowgate_core::SecretVault::from_key_bytes(&[3_u8; 32]).unwrap());
    let http = OutboundHttp::new(UrlPolicy::permit_private_hosts()).unwrap();
    let registry = Arc::new(ProviderRegistry::new(http.clone(), Arc::new(NoopTxRecorder), None));
    let state = AppState {
        store: world.store.clone() as Arc<dyn Store>,
        runner: Arc::new(ExecutionRunner::new(
            world.store.clone() as Arc<dyn Store>,
            registry,
            Some(vault.clone()),
            Arc::new(NoopMailer),
            EngineSettings {
                http_timeout: Duration::from_secs(5),
                shutdown_grace: Duration::from_secs(1),
            },
        )),
        verifier: Arc::new(flowgate_verify::VerificationWorker::new(
            world.store.clone() as Arc<dyn Store>,
            http,
            flowgate_verify::VerifySettings {
                defer: Duration::from_millis(10),
                probe_timeout: Duration::from_secs(2),
            },
        )),
        rooms: Arc::new(RoomRegistry::new(16)),
        vault: Some(vault.clone()),
        mailer: Arc::new(NoopMailer),
        sessions: world.sessions.clone(),
        auditor: Arc::new(Auditor::new(world.store.clone() as Arc<dyn Store>)),
        oidc: None,
        reports: Arc::new(ReportWriter::new(tempfile_dir())),
        frontend_origin: None,
        outbound: OutboundHttp::new(UrlPolicy::permit_private_hosts()).unwrap(),
        sandbox_fetch_timeout: Duration::from_secs(10),
    };
    world.router = build_router(state);

    let (principal, cookie) = seed_principal(&world, 1_000, false);
    let (status, body, _) = send(
        &world,
        json_request(
            "POST",
            "/connections",
            Some(&cookie),
            Some(json!({
                "provider": "MTN",
                "env": "sandbox",
                "label": "sandbox collection",
                "config": { "subscriptionKey": "ocp-1", "apiUser": "u", "apiKey": "k" },
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["provider"], "mtn");
    assert!(body.get("config").is_none());
    assert!(body.get("config_enc").is_none());

    // The stored blob is opaque ciphertext that the vault can open again.
    let stored = world
        .store
        .connection_for_provider(principal.user_id, "mtn")
        .unwrap()
        .unwrap();
    let opened: Value = vault.decrypt_value(&stored.config_enc).unwrap();
    assert_eq!(opened["subscriptionKey"], "ocp-1");

    let (status, listed, _) =
        send(&world, json_request("GET", "/connections", Some(&cookie), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert!(listed[0].get("config_enc").is_none());
}

// ============================================================================
// SECTION: Compliance Reports
// ============================================================================

#[tokio::test]
async fn compliance_reports_land_on_disk_under_the_canonical_name() {
    let world = world();
    let (principal, cookie) = seed_principal(&world, 1_000, false);
    let (status, body, _) = send(
        &world,
        json_request("POST", "/reports/compliance", Some(&cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let path = body["path"].as_str().unwrap().to_string();
    let file_name = std::path::Path::new(&path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap()
        .to_string();
    assert!(file_name.starts_with(&principal.org_id.to_string()));
    assert!(file_name.ends_with(".json"));

    let raw = std::fs::read(&path).unwrap();
    let report: Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(report["organization"]["id"], json!(principal.org_id));
    assert!(report["integrations"].is_array());
    assert_eq!(report["executions"]["counts"]["running"], 0);
}

// ============================================================================
// SECTION: Read-Only Accounts
// ============================================================================

#[tokio::test]
async fn deactivated_accounts_are_read_only() {
    let world = world();
    let (principal, cookie) = seed_principal(&world, 1_000, false);
    let mut user = world.store.user_by_id(principal.user_id).unwrap().unwrap();
    user.deactivated_at = Some(Timestamp::now());
    world.store.update_user(&user).unwrap();

    let (status, _, _) = send(&world, json_request("GET", "/flows", Some(&cookie), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(
        &world,
        json_request("POST", "/flows", Some(&cookie), Some(json!({ "name": "Nope" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
