// crates/flowgate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Persistence invariants over a temporary database file.
// Purpose: Pin version sequencing, org scoping, sticky terminals, and events.
// ============================================================================

//! ## Overview
//! Exercises the store against a real file-backed database: gap-free version
//! assignment, soft-delete invisibility, sticky terminal executions, ordered
//! execution deletion, case-insensitive uniqueness, rate accounting, and the
//! store event hook.

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

use flowgate_core::ApiRateSample;
use flowgate_core::ExecutionId;
use flowgate_core::ExecutionStatus;
use flowgate_core::ExecutionStore;
use flowgate_core::Flow;
use flowgate_core::FlowExecution;
use flowgate_core::FlowGraph;
use flowgate_core::FlowId;
use flowgate_core::FlowStatus;
use flowgate_core::FlowStore;
use flowgate_core::IdentityStore;
use flowgate_core::Integration;
use flowgate_core::IntegrationId;
use flowgate_core::IntegrationStatus;
use flowgate_core::Notification;
use flowgate_core::NotificationId;
use flowgate_core::NotificationKind;
use flowgate_core::OrgId;
use flowgate_core::Organization;
use flowgate_core::PolicyStore;
use flowgate_core::StoreError;
use flowgate_core::StoreEvent;
use flowgate_core::StoreEventKind;
use flowgate_core::StoreEventSink;
use flowgate_core::TenantStore;
use flowgate_core::Timestamp;
use flowgate_core::TriggerType;
use flowgate_core::User;
use flowgate_core::UserId;
use flowgate_store_sqlite::SqliteStore;
use flowgate_store_sqlite::SqliteStoreConfig;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Event sink that records every published event.
#[derive(Default)]
struct RecordingSink {
    /// Captured events in publish order.
    events: Mutex<Vec<StoreEvent>>,
}

impl RecordingSink {
    fn captured(&self) -> Vec<StoreEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl StoreEventSink for RecordingSink {
    fn publish(&self, event: StoreEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

/// Opens a file-backed store in a temp dir with a recording sink.
fn open_store() -> (SqliteStore, Arc<RecordingSink>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let config = SqliteStoreConfig::new(dir.path().join("flowgate.db"));
    let store = SqliteStore::open(&config, sink.clone()).unwrap();
    (store, sink, dir)
}

/// Seeds an org plus one user and returns their ids.
fn seed_org(store: &SqliteStore, name: &str) -> (OrgId, UserId) {
    let org = Organization {
        id: OrgId::generate(),
        name: name.to_string(),
        created_at: Timestamp::from_unix_millis(1_000),
    };
    store.create_organization(&org).unwrap();
    let user = User {
        id: UserId::generate(),
        org_id: org.id,
        email: format!("{name}@example.test"),
        password_hash: Some("$argon2id$stub".to_string()),
        first_name: None,
        last_name: None,
        deactivated_at: None,
        rate_limit: 100,
        allow_ip_whitelist: false,
        send_error_alerts: false,
        profile_picture: None,
    };
    store.create_user(&user).unwrap();
    (org.id, user.id)
}

/// Seeds a flow for the org and returns its id.
fn seed_flow(store: &SqliteStore, org_id: OrgId, user_id: UserId, name: &str) -> FlowId {
    let now = Timestamp::from_unix_millis(2_000);
    let flow = Flow {
        id: FlowId::generate(),
        org_id,
        name: name.to_string(),
        status: FlowStatus::Draft,
        is_deleted: false,
        created_by: user_id,
        created_at: now,
        updated_at: now,
    };
    store.create_flow(&flow).unwrap();
    flow.id
}

/// Inserts a running execution for the flow and returns its id.
fn seed_execution(store: &SqliteStore, flow_id: FlowId) -> ExecutionId {
    let execution = FlowExecution {
        id: ExecutionId::generate(),
        flow_id,
        flow_version: 1,
        status: ExecutionStatus::Running,
        trigger_type: TriggerType::Manual,
        trigger_data: json!({}),
        started_at: Timestamp::from_unix_millis(5_000),
        completed_at: None,
        error_message: None,
        execution_time_ms: None,
    };
    store.insert_execution(&execution).unwrap();
    execution.id
}

// ============================================================================
// SECTION: Flow Versions
// ============================================================================

#[test]
fn versions_are_assigned_gap_free_from_one() {
    let (store, _, _dir) = open_store();
    let (org_id, user_id) = seed_org(&store, "acme");
    let flow_id = seed_flow(&store, org_id, user_id, "pay");
    let graph = FlowGraph::default();
    for expected in 1..=4_u32 {
        let version = store
            .create_flow_version(flow_id, &graph, &json!({}), Timestamp::from_unix_millis(3_000))
            .unwrap();
        assert_eq!(version.version, expected);
    }
    let listed = store.list_flow_versions(flow_id).unwrap();
    let versions: Vec<u32> = listed.iter().map(|v| v.version).collect();
    assert_eq!(versions, [4, 3, 2, 1]);
    assert_eq!(store.latest_flow_version(flow_id).unwrap().unwrap().version, 4);
}

#[test]
fn version_insert_for_unknown_flow_is_not_found() {
    let (store, _, _dir) = open_store();
    let result = store.create_flow_version(
        FlowId::generate(),
        &FlowGraph::default(),
        &json!({}),
        Timestamp::from_unix_millis(0),
    );
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

// ============================================================================
// SECTION: Flows
// ============================================================================

#[test]
fn flow_names_are_unique_case_insensitively_per_org() {
    let (store, _, _dir) = open_store();
    let (org_id, user_id) = seed_org(&store, "acme");
    seed_flow(&store, org_id, user_id, "Pay");
    let now = Timestamp::from_unix_millis(2_500);
    let dup = Flow {
        id: FlowId::generate(),
        org_id,
        name: "pay".to_string(),
        status: FlowStatus::Draft,
        is_deleted: false,
        created_by: user_id,
        created_at: now,
        updated_at: now,
    };
    assert!(matches!(store.create_flow(&dup), Err(StoreError::Conflict(_))));
}

#[test]
fn soft_deleted_flows_disappear_from_listings_but_stay_resolvable() {
    let (store, _, _dir) = open_store();
    let (org_id, user_id) = seed_org(&store, "acme");
    let flow_id = seed_flow(&store, org_id, user_id, "pay");
    store.soft_delete_flow(org_id, flow_id, Timestamp::from_unix_millis(9_000)).unwrap();
    assert!(store.list_flows(org_id).unwrap().is_empty());
    let resolved = store.flow_by_id(org_id, flow_id).unwrap().unwrap();
    assert!(resolved.is_deleted);
    // The name frees up for reuse after the soft delete.
    seed_flow(&store, org_id, user_id, "pay");
}

#[test]
fn flow_lookups_are_org_scoped() {
    let (store, _, _dir) = open_store();
    let (org_a, user_a) = seed_org(&store, "acme");
    let (org_b, _) = seed_org(&store, "globex");
    let flow_id = seed_flow(&store, org_a, user_a, "pay");
    assert!(store.flow_by_id(org_b, flow_id).unwrap().is_none());
    assert!(store.flow_by_id(org_a, flow_id).unwrap().is_some());
}

// ============================================================================
// SECTION: Executions
// ============================================================================

#[test]
fn finish_execution_is_sticky_on_terminal_states() {
    let (store, _, _dir) = open_store();
    let (org_id, user_id) = seed_org(&store, "acme");
    let flow_id = seed_flow(&store, org_id, user_id, "pay");
    let execution_id = seed_execution(&store, flow_id);

    let finished = store
        .finish_execution(
            execution_id,
            ExecutionStatus::Cancelled,
            None,
            Timestamp::from_unix_millis(6_000),
        )
        .unwrap();
    assert!(finished);

    // A later completion attempt must not overwrite the cancellation.
    let second = store
        .finish_execution(
            execution_id,
            ExecutionStatus::Completed,
            None,
            Timestamp::from_unix_millis(7_000),
        )
        .unwrap();
    assert!(!second);

    let row = store.execution_by_id(execution_id).unwrap().unwrap();
    assert_eq!(row.status, ExecutionStatus::Cancelled);
    assert_eq!(row.completed_at, Some(Timestamp::from_unix_millis(6_000)));
    assert_eq!(row.execution_time_ms, Some(1_000));
}

#[test]
fn delete_execution_requires_owning_org() {
    let (store, _, _dir) = open_store();
    let (org_a, user_a) = seed_org(&store, "acme");
    let (org_b, _) = seed_org(&store, "globex");
    let flow_id = seed_flow(&store, org_a, user_a, "pay");
    let execution_id = seed_execution(&store, flow_id);
    assert!(matches!(
        store.delete_execution(execution_id, org_b),
        Err(StoreError::NotFound(_))
    ));
    store.delete_execution(execution_id, org_a).unwrap();
    assert!(store.execution_by_id(execution_id).unwrap().is_none());
}

#[test]
fn recent_executions_join_through_flows_for_org_scope() {
    let (store, _, _dir) = open_store();
    let (org_a, user_a) = seed_org(&store, "acme");
    let (org_b, user_b) = seed_org(&store, "globex");
    let flow_a = seed_flow(&store, org_a, user_a, "pay");
    let flow_b = seed_flow(&store, org_b, user_b, "bill");
    seed_execution(&store, flow_a);
    seed_execution(&store, flow_b);
    assert_eq!(store.recent_executions_for_org(org_a, 100).unwrap().len(), 1);
    assert_eq!(store.recent_executions_for_org(org_b, 100).unwrap().len(), 1);
}

// ============================================================================
// SECTION: Integrations & Events
// ============================================================================

#[test]
fn integration_names_are_unique_case_insensitively() {
    let (store, _, _dir) = open_store();
    let (org_id, _) = seed_org(&store, "acme");
    let base = Integration {
        id: IntegrationId::generate(),
        org_id,
        name: "Stripe Test".to_string(),
        status: IntegrationStatus::Pending,
        test_url: None,
        last_checked: None,
        created_at: Timestamp::from_unix_millis(1_000),
    };
    store.create_integration(&base).unwrap();
    let dup = Integration {
        id: IntegrationId::generate(),
        name: "stripe test".to_string(),
        ..base
    };
    assert!(matches!(store.create_integration(&dup), Err(StoreError::Conflict(_))));
}

#[test]
fn integration_status_writes_publish_bus_events() {
    let (store, sink, _dir) = open_store();
    let (org_id, _) = seed_org(&store, "acme");
    let integration = Integration {
        id: IntegrationId::generate(),
        org_id,
        name: "Stripe Test".to_string(),
        status: IntegrationStatus::Pending,
        test_url: None,
        last_checked: None,
        created_at: Timestamp::from_unix_millis(1_000),
    };
    store.create_integration(&integration).unwrap();
    store
        .set_integration_status(
            integration.id,
            IntegrationStatus::Active,
            Timestamp::from_unix_millis(2_000),
        )
        .unwrap();
    let events = sink.captured();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].org_id, org_id);
    assert_eq!(events[0].kind, StoreEventKind::IntegrationsUpdate);

    let row = store.integration_by_id(org_id, integration.id).unwrap().unwrap();
    assert_eq!(row.status, IntegrationStatus::Active);
    assert_eq!(row.last_checked, Some(Timestamp::from_unix_millis(2_000)));
}

#[test]
fn notification_inserts_publish_bus_events() {
    let (store, sink, _dir) = open_store();
    let (org_id, _) = seed_org(&store, "acme");
    let notification = Notification {
        id: NotificationId::generate(),
        org_id,
        kind: NotificationKind::Info,
        title: "Integration active".to_string(),
        message: "Stripe Test is responding".to_string(),
        related_id: None,
        is_read: false,
        created_at: Timestamp::from_unix_millis(1_500),
    };
    store.insert_notification(&notification).unwrap();
    let events = sink.captured();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, StoreEventKind::NotificationsUpdate);

    assert_eq!(store.mark_all_notifications_read(org_id).unwrap(), 1);
    let listed = store.list_notifications(org_id, 10).unwrap();
    assert!(listed[0].is_read);
}

// ============================================================================
// SECTION: Identity
// ============================================================================

#[test]
fn user_emails_are_unique_case_insensitively() {
    let (store, _, _dir) = open_store();
    let (org_id, _) = seed_org(&store, "acme");
    let clash = User {
        id: UserId::generate(),
        org_id,
        email: "ACME@example.test".to_string(),
        password_hash: None,
        first_name: None,
        last_name: None,
        deactivated_at: None,
        rate_limit: 10,
        allow_ip_whitelist: false,
        send_error_alerts: false,
        profile_picture: None,
    };
    assert!(matches!(store.create_user(&clash), Err(StoreError::Conflict(_))));
    assert!(store.user_by_email("acme@EXAMPLE.test").unwrap().is_some());
}

// ============================================================================
// SECTION: Policy Rows
// ============================================================================

#[test]
fn rate_samples_count_within_window_and_sweep() {
    let (store, _, _dir) = open_store();
    let (_, user_id) = seed_org(&store, "acme");
    for offset in [0_i64, 10, 20, 100_000] {
        store
            .insert_rate_sample(&ApiRateSample {
                user_id,
                endpoint: "POST /executions/start".to_string(),
                ip_address: Some("203.0.113.9".to_string()),
                timestamp: Timestamp::from_unix_millis(offset),
            })
            .unwrap();
    }
    let since = Timestamp::from_unix_millis(10);
    assert_eq!(store.count_rate_samples_since(user_id, since).unwrap(), 3);
    assert_eq!(
        store.sweep_rate_samples_before(Timestamp::from_unix_millis(50)).unwrap(),
        3
    );
    assert_eq!(
        store.count_rate_samples_since(user_id, Timestamp::from_unix_millis(0)).unwrap(),
        1
    );
}

#[test]
fn allowlist_membership_is_exact_per_user() {
    let (store, _, _dir) = open_store();
    let (_, user_id) = seed_org(&store, "acme");
    store
        .add_ip_allowlist_entry(user_id, "10.0.0.5", Some("office"), Timestamp::from_unix_millis(0))
        .unwrap();
    assert!(store.ip_allowed(user_id, "10.0.0.5").unwrap());
    assert!(!store.ip_allowed(user_id, "198.51.100.7").unwrap());
    let listed = store.list_ip_allowlist(user_id).unwrap();
    assert_eq!(listed.len(), 1);
    store.remove_ip_allowlist_entry(user_id, listed[0].id).unwrap();
    assert!(!store.ip_allowed(user_id, "10.0.0.5").unwrap());
}
