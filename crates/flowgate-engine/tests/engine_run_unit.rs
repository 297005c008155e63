// crates/flowgate-engine/tests/engine_run_unit.rs
// ============================================================================
// Module: Engine Run Unit Tests
// Description: End-to-end engine behavior over an in-memory store.
// Purpose: Pin the per-node lifecycle, fail-fast halting, and cancellation.
// ============================================================================

//! ## Overview
//! Drives the runner against a SQLite store and local HTTP fixtures: the
//! happy-path deploy shape, cycle rejection before any node, protocol
//! errors as data, transport errors as step failures with skip records,
//! cooperative cancellation, and the data-shaping nodes.

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
use std::thread;
use std::time::Duration;

use flowgate_core::ExecutionStatus;
use flowgate_core::Flow;
use flowgate_core::FlowEdge;
use flowgate_core::FlowGraph;
use flowgate_core::FlowId;
use flowgate_core::FlowNode;
use flowgate_core::FlowStatus;
use flowgate_core::FlowStore;
use flowgate_core::IdentityStore;
use flowgate_core::LogLevel;
use flowgate_core::NodeId;
use flowgate_core::NoopMailer;
use flowgate_core::NoopStoreEventSink;
use flowgate_core::OrgId;
use flowgate_core::Organization;
use flowgate_core::NotificationKind;
use flowgate_core::StepStatus;
use flowgate_core::Store;
use flowgate_core::TenantStore;
use flowgate_core::Timestamp;
use flowgate_core::TriggerType;
use flowgate_core::User;
use flowgate_core::UserId;
use flowgate_engine::EngineSettings;
use flowgate_engine::ExecutionRunner;
use flowgate_providers::NoopTxRecorder;
use flowgate_providers::OutboundHttp;
use flowgate_providers::ProviderRegistry;
use flowgate_providers::UrlPolicy;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Shared test world: store, runner, seeded org/user/flow.
struct World {
    store: Arc<flowgate_store_sqlite::SqliteStore>,
    runner: Arc<ExecutionRunner>,
    org_id: OrgId,
    flow_id: FlowId,
}

/// Builds the world with a seeded flow.
fn world() -> World {
    let store = Arc::new(
        flowgate_store_sqlite::SqliteStore::open_in_memory(Arc::new(NoopStoreEventSink)).unwrap(),
    );
    let org = Organization {
        id: OrgId::generate(),
        name: "acme".to_string(),
        created_at: Timestamp::now(),
    };
    store.create_organization(&org).unwrap();
    let user = User {
        id: UserId::generate(),
        org_id: org.id,
        email: "dev@acme.test".to_string(),
        password_hash: None,
        first_name: None,
        last_name: None,
        deactivated_at: None,
        rate_limit: 1_000,
        allow_ip_whitelist: false,
        send_error_alerts: false,
        profile_picture: None,
    };
    store.create_user(&user).unwrap();
    let now = Timestamp::now();
    let flow = Flow {
        id: FlowId::generate(),
        org_id: org.id,
        name: "pay".to_string(),
        status: FlowStatus::Draft,
        is_deleted: false,
        created_by: user.id,
        created_at: now,
        updated_at: now,
    };
    store.create_flow(&flow).unwrap();

    let http = OutboundHttp::new(UrlPolicy::permit_private_hosts()).unwrap();
    let registry = Arc::new(ProviderRegistry::new(http, Arc::new(NoopTxRecorder), None));
    let runner = Arc::new(ExecutionRunner::new(
        store.clone() as Arc<dyn Store>,
        registry,
        None,
        Arc::new(NoopMailer),
        EngineSettings {
            http_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        },
    ));
    World {
        store,
        runner,
        org_id: org.id,
        flow_id: flow.id,
    }
}

/// Node helper.
fn node(id: &str, node_type: &str) -> FlowNode {
    FlowNode {
        id: NodeId::from(id),
        node_type: node_type.to_string(),
        kind: None,
        label: None,
        x: 0.0,
        y: 0.0,
        config: None,
    }
}

/// HTTP action node helper.
fn http_node(id: &str, url: &str) -> FlowNode {
    let mut node = node(id, "action");
    node.kind = Some("http".to_string());
    node.config = Some(json!({ "url": url }));
    node
}

/// Edge helper.
fn edge(from: &str, to: &str) -> FlowEdge {
    FlowEdge {
        from: NodeId::from(from),
        to: NodeId::from(to),
    }
}

/// Saves a version of the world's flow.
fn save_version(world: &World, graph: FlowGraph) {
    world.store.create_flow_version(world.flow_id, &graph, &json!({}), Timestamp::now()).unwrap();
}

/// Starts a one-request fixture returning `status` with a JSON body.
fn one_shot_server(status: u16) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}/probe");
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let body = json!({ "ok": status < 400 }).to_string();
            let _ = request.respond(Response::from_string(body).with_status_code(status));
        }
    });
    (url, handle)
}

/// Polls until the execution reaches a terminal status.
async fn await_terminal(
    world: &World,
    execution_id: flowgate_core::ExecutionId,
) -> flowgate_core::FlowExecution {
    for _ in 0..200 {
        let execution = world.runner.get_execution(world.org_id, execution_id).unwrap();
        if execution.status.is_terminal() {
            return execution;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("execution never reached a terminal status");
}

// ============================================================================
// SECTION: Happy Path
// ============================================================================

#[tokio::test]
async fn deploy_shape_completes_with_steps_and_logs() {
    let world = world();
    let (url, server) = one_shot_server(200);
    save_version(
        &world,
        FlowGraph {
            nodes: vec![node("start", "start"), http_node("fetch", &url), node("end", "end")],
            edges: vec![edge("start", "fetch"), edge("fetch", "end")],
        },
    );

    let started = world
        .runner
        .start_execution(
            world.org_id,
            world.flow_id,
            TriggerType::Deploy,
            json!({ "reason": "deploy" }),
        )
        .unwrap();
    assert_eq!(started.status, ExecutionStatus::Running);
    assert_eq!(started.version, 1);
    assert_eq!(started.flow_name, "pay");

    let execution = await_terminal(&world, started.execution_id).await;
    server.join().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.trigger_type, TriggerType::Deploy);
    assert!(execution.completed_at.is_some());
    assert!(execution.execution_time_ms.is_some());

    let steps = world.runner.get_steps(world.org_id, started.execution_id).unwrap();
    assert_eq!(steps.len(), 3);
    assert!(steps.iter().all(|step| step.status == StepStatus::Completed));
    // The start node forwards the trigger payload downstream.
    assert_eq!(steps[0].output_data, Some(json!({ "reason": "deploy" })));
    // The http node observed a 2xx and recorded the response as data.
    let fetch_output = steps[1].output_data.clone().unwrap();
    assert_eq!(fetch_output["status"], 200);
    assert_eq!(fetch_output["data"]["ok"], true);

    let logs = world.runner.get_logs(world.org_id, started.execution_id, 100).unwrap();
    let info_lines = logs.iter().filter(|line| line.level == LogLevel::Info).count();
    assert!(info_lines >= 3, "expected at least three info logs, got {info_lines}");

    // The outcome notification is queued for the org (and announces
    // notifications:update through the store hook).
    let notifications = world.store.list_notifications(world.org_id, 10).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Info);
    assert!(notifications[0].message.contains("pay"));
}

// ============================================================================
// SECTION: Graph Rejection
// ============================================================================

#[tokio::test]
async fn cycle_fails_before_any_node_runs() {
    let world = world();
    save_version(
        &world,
        FlowGraph {
            nodes: vec![node("a", "start"), node("b", "transform"), node("c", "end")],
            edges: vec![edge("a", "b"), edge("b", "a"), edge("b", "c")],
        },
    );
    let started = world
        .runner
        .start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({}))
        .unwrap();
    let execution = await_terminal(&world, started.execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error_message.as_deref().is_some_and(|m| m.contains("cycle")));
    let steps = world.runner.get_steps(world.org_id, started.execution_id).unwrap();
    assert!(steps.is_empty(), "no steps may exist for a rejected graph");
}

#[tokio::test]
async fn starting_a_flow_without_versions_is_not_found() {
    let world = world();
    let result =
        world.runner.start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({}));
    assert!(matches!(result, Err(flowgate_core::ApiError::NotFound(_))));
}

// ============================================================================
// SECTION: HTTP Action Semantics
// ============================================================================

#[tokio::test]
async fn protocol_errors_are_successful_steps_with_error_payloads() {
    let world = world();
    let (url, server) = one_shot_server(503);
    save_version(
        &world,
        FlowGraph {
            nodes: vec![node("start", "start"), http_node("fetch", &url), node("end", "end")],
            edges: vec![edge("start", "fetch"), edge("fetch", "end")],
        },
    );
    let started = world
        .runner
        .start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({}))
        .unwrap();
    let execution = await_terminal(&world, started.execution_id).await;
    server.join().unwrap();
    // The execution completes; the 503 is branchable data, not a failure.
    assert_eq!(execution.status, ExecutionStatus::Completed);
    let steps = world.runner.get_steps(world.org_id, started.execution_id).unwrap();
    assert_eq!(steps[1].status, StepStatus::Completed);
    let output = steps[1].output_data.clone().unwrap();
    assert_eq!(output["status"], 503);
    assert!(output.get("error").is_some());
}

#[tokio::test]
async fn transport_errors_fail_the_step_and_halt_the_plan() {
    let world = world();
    // Nothing listens here; the connection is refused.
    save_version(
        &world,
        FlowGraph {
            nodes: vec![
                node("start", "start"),
                http_node("fetch", "http://127.0.0.1:1/unreachable"),
                node("end", "end"),
            ],
            edges: vec![edge("start", "fetch"), edge("fetch", "end")],
        },
    );
    let started = world
        .runner
        .start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({}))
        .unwrap();
    let execution = await_terminal(&world, started.execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error_message.is_some());

    let steps = world.runner.get_steps(world.org_id, started.execution_id).unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[1].status, StepStatus::Failed);
    // The end node never started.
    assert_eq!(steps[2].status, StepStatus::Skipped);
    assert!(steps[2].started_at.is_none());
}

// ============================================================================
// SECTION: Data Shaping Nodes
// ============================================================================

#[tokio::test]
async fn condition_and_transform_shape_outputs() {
    let world = world();
    let mut condition = node("check", "condition");
    condition.config = Some(json!({ "condition": "true" }));
    let mut transform = node("shape", "transform");
    transform.config = Some(json!({ "transformation": "merge" }));
    save_version(
        &world,
        FlowGraph {
            nodes: vec![node("start", "start"), condition, transform, node("end", "end")],
            edges: vec![edge("start", "check"), edge("check", "shape"), edge("shape", "end")],
        },
    );
    let started = world
        .runner
        .start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({ "x": 1 }))
        .unwrap();
    let execution = await_terminal(&world, started.execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Completed);
    let steps = world.runner.get_steps(world.org_id, started.execution_id).unwrap();
    let check_output = steps[1].output_data.clone().unwrap();
    assert_eq!(check_output["passed"], true);
    // Merge folds the condition output fields into one object.
    let shape_output = steps[2].output_data.clone().unwrap();
    assert_eq!(shape_output["passed"], true);
}

#[tokio::test]
async fn unrecognized_actions_fail_with_a_clear_error() {
    let world = world();
    let mut rogue = node("rogue", "action");
    rogue.kind = Some("carrier-pigeon".to_string());
    save_version(
        &world,
        FlowGraph {
            nodes: vec![node("start", "start"), rogue],
            edges: vec![edge("start", "rogue")],
        },
    );
    let started = world
        .runner
        .start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({}))
        .unwrap();
    let execution = await_terminal(&world, started.execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error_message.as_deref().is_some_and(|m| m.contains("unrecognized")));
    let logs = world.runner.get_logs(world.org_id, started.execution_id, 100).unwrap();
    assert!(logs.iter().any(|line| line.level == LogLevel::Warn));
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

#[tokio::test]
async fn cancellation_is_observed_between_nodes() {
    let world = world();
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let slow_url = format!("http://{addr}/slow");
    let slow = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            thread::sleep(Duration::from_millis(600));
            let _ = request.respond(Response::from_string("{}").with_status_code(200));
        }
    });
    save_version(
        &world,
        FlowGraph {
            nodes: vec![
                node("start", "start"),
                http_node("slow", &slow_url),
                node("after", "transform"),
                node("end", "end"),
            ],
            edges: vec![edge("start", "slow"), edge("slow", "after"), edge("after", "end")],
        },
    );
    let started = world
        .runner
        .start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({}))
        .unwrap();

    // Wait until the slow node is in flight, then request cancellation.
    for _ in 0..100 {
        let steps = world.runner.get_steps(world.org_id, started.execution_id).unwrap();
        if steps.iter().any(|s| s.node_id.as_str() == "slow" && s.status == StepStatus::Running) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let cancelled = world.runner.cancel_execution(world.org_id, started.execution_id).unwrap();
    assert_eq!(cancelled.status, ExecutionStatus::Cancelled);

    let execution = await_terminal(&world, started.execution_id).await;
    slow.join().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Cancelled);

    // Give the driving task a moment to observe the flag and write skips.
    tokio::time::sleep(Duration::from_millis(900)).await;
    let steps = world.runner.get_steps(world.org_id, started.execution_id).unwrap();
    for step in &steps {
        if step.node_id.as_str() == "after" || step.node_id.as_str() == "end" {
            assert_eq!(step.status, StepStatus::Skipped, "{} must not run", step.node_id);
        }
    }
    // Cancel on a terminal execution stays a no-op.
    let again = world.runner.cancel_execution(world.org_id, started.execution_id).unwrap();
    assert_eq!(again.status, ExecutionStatus::Cancelled);
}

// ============================================================================
// SECTION: Org Scoping
// ============================================================================

#[tokio::test]
async fn reads_are_org_scoped() {
    let world = world();
    save_version(
        &world,
        FlowGraph {
            nodes: vec![node("start", "start")],
            edges: vec![],
        },
    );
    let started = world
        .runner
        .start_execution(world.org_id, world.flow_id, TriggerType::Manual, json!({}))
        .unwrap();
    await_terminal(&world, started.execution_id).await;

    let stranger = OrgId::generate();
    assert!(world.runner.get_execution(stranger, started.execution_id).is_err());
    assert!(world.runner.get_steps(stranger, started.execution_id).is_err());
    assert!(world.runner.delete_execution(stranger, started.execution_id).is_err());
    world.runner.delete_execution(world.org_id, started.execution_id).unwrap();
}
