// crates/flowgate-core/tests/graph_plan_unit.rs
// ============================================================================
// Module: Graph Plan Unit Tests
// Description: Validation and planning behavior of the flow graph model.
// Purpose: Pin insertion-order ties, cycle rejection, and action decoding.
// ============================================================================

//! ## Overview
//! Covers the graph planner (Kahn traversal with insertion-order ties), the
//! insert-time validation entry point, and the total node action decoder.

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

use flowgate_core::FlowEdge;
use flowgate_core::FlowGraph;
use flowgate_core::FlowNode;
use flowgate_core::GraphError;
use flowgate_core::NodeAction;
use flowgate_core::NodeId;
use flowgate_core::TransformKind;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a plain node with no kind or config.
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

/// Builds an edge between two node ids.
fn edge(from: &str, to: &str) -> FlowEdge {
    FlowEdge {
        from: NodeId::from(from),
        to: NodeId::from(to),
    }
}

/// Renders a plan as plain strings for assertion readability.
fn plan_labels(graph: &FlowGraph) -> Vec<String> {
    graph.execution_plan().unwrap().iter().map(ToString::to_string).collect()
}

// ============================================================================
// SECTION: Planning
// ============================================================================

#[test]
fn plan_covers_linear_chain_in_order() {
    let graph = FlowGraph {
        nodes: vec![node("a", "start"), node("b", "transform"), node("c", "end")],
        edges: vec![edge("a", "b"), edge("b", "c")],
    };
    assert_eq!(plan_labels(&graph), ["a", "b", "c"]);
}

#[test]
fn plan_breaks_ties_by_insertion_order() {
    // Two roots; "late" is authored after "early" and must follow it.
    let graph = FlowGraph {
        nodes: vec![node("early", "start"), node("late", "trigger"), node("join", "end")],
        edges: vec![edge("early", "join"), edge("late", "join")],
    };
    assert_eq!(plan_labels(&graph), ["early", "late", "join"]);
}

#[test]
fn plan_length_equals_node_count_for_diamond() {
    let graph = FlowGraph {
        nodes: vec![
            node("s", "start"),
            node("left", "transform"),
            node("right", "transform"),
            node("e", "end"),
        ],
        edges: vec![edge("s", "left"), edge("s", "right"), edge("left", "e"), edge("right", "e")],
    };
    let plan = graph.execution_plan().unwrap();
    assert_eq!(plan.len(), graph.nodes.len());
    assert_eq!(plan.first().map(ToString::to_string).as_deref(), Some("s"));
    assert_eq!(plan.last().map(ToString::to_string).as_deref(), Some("e"));
}

#[test]
fn plan_rejects_two_node_cycle() {
    let graph = FlowGraph {
        nodes: vec![node("a", "start"), node("b", "transform")],
        edges: vec![edge("a", "b"), edge("b", "a")],
    };
    assert_eq!(graph.execution_plan(), Err(GraphError::CycleOrDisconnected));
}

#[test]
fn plan_rejects_self_loop() {
    let graph = FlowGraph {
        nodes: vec![node("a", "start")],
        edges: vec![edge("a", "a")],
    };
    assert_eq!(graph.execution_plan(), Err(GraphError::CycleOrDisconnected));
}

#[test]
fn plan_of_empty_graph_is_empty() {
    let graph = FlowGraph::default();
    assert!(graph.execution_plan().unwrap().is_empty());
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn validate_rejects_duplicate_node_ids() {
    let graph = FlowGraph {
        nodes: vec![node("a", "start"), node("a", "end")],
        edges: vec![],
    };
    assert_eq!(graph.validate(), Err(GraphError::DuplicateNode("a".to_string())));
}

#[test]
fn validate_rejects_dangling_edge_endpoint() {
    let graph = FlowGraph {
        nodes: vec![node("a", "start")],
        edges: vec![edge("a", "ghost")],
    };
    assert_eq!(graph.validate(), Err(GraphError::UnknownEdgeEndpoint("ghost".to_string())));
}

#[test]
fn validate_accepts_happy_path_deploy_shape() {
    let mut http = node("fetch", "action");
    http.kind = Some("http".to_string());
    http.config = Some(json!({ "url": "https://example.test/200" }));
    let graph = FlowGraph {
        nodes: vec![node("start", "start"), http, node("end", "end")],
        edges: vec![edge("start", "fetch"), edge("fetch", "end")],
    };
    assert!(graph.validate().is_ok());
}

// ============================================================================
// SECTION: Action Decoding
// ============================================================================

#[test]
fn resolve_maps_builtin_types() {
    assert_eq!(NodeAction::resolve(&node("n", "start")), NodeAction::Start);
    assert_eq!(NodeAction::resolve(&node("n", "trigger")), NodeAction::Trigger);
    assert_eq!(NodeAction::resolve(&node("n", "end")), NodeAction::End);
}

#[test]
fn resolve_reads_condition_expression() {
    let mut condition = node("n", "condition");
    condition.config = Some(json!({ "condition": "true" }));
    assert_eq!(
        NodeAction::resolve(&condition),
        NodeAction::Condition {
            condition: Some("true".to_string()),
        }
    );
}

#[test]
fn resolve_defaults_transform_to_passthrough() {
    let transform = node("n", "transform");
    assert_eq!(
        NodeAction::resolve(&transform),
        NodeAction::Transform {
            transformation: TransformKind::Passthrough,
            fields: None,
        }
    );
}

#[test]
fn resolve_reads_extract_fields() {
    let mut transform = node("n", "transform");
    transform.config = Some(json!({ "transformation": "extract", "fields": ["id", "amount"] }));
    assert_eq!(
        NodeAction::resolve(&transform),
        NodeAction::Transform {
            transformation: TransformKind::Extract,
            fields: Some(vec!["id".to_string(), "amount".to_string()]),
        }
    );
}

#[test]
fn resolve_splits_dotted_provider_types() {
    let mut provider = node("n", "mtn.requestToPay");
    provider.config = Some(json!({ "amount": "100" }));
    let NodeAction::ProviderOp {
        provider,
        operation,
        ..
    } = NodeAction::resolve(&provider)
    else {
        panic!("expected provider op");
    };
    assert_eq!(provider, "mtn");
    assert_eq!(operation, "requestToPay");
}

#[test]
fn resolve_flags_http_without_url_as_malformed() {
    let mut http = node("n", "action");
    http.kind = Some("http".to_string());
    http.config = Some(json!({ "method": "GET" }));
    let NodeAction::Malformed {
        reason,
    } = NodeAction::resolve(&http)
    else {
        panic!("expected malformed action");
    };
    assert!(reason.contains("url"));
}

#[test]
fn resolve_maps_unknown_kind_to_unrecognized() {
    let mut unknown = node("n", "action");
    unknown.kind = Some("carrier-pigeon".to_string());
    assert_eq!(
        NodeAction::resolve(&unknown),
        NodeAction::Unrecognized {
            node_type: "action".to_string(),
            kind: Some("carrier-pigeon".to_string()),
        }
    );
}
