// crates/flowgate-core/src/core/graph.rs
// ============================================================================
// Module: Flowgate Graph Model
// Description: Flow graphs, node action decoding, and execution planning.
// Purpose: Validate author-supplied graphs and derive the sequential node plan.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`FlowGraph`] is the `{nodes, edges}` payload stored inside a flow
//! version. Graphs are untrusted author input: [`FlowGraph::validate`] runs at
//! insert time and rejects duplicate node ids, dangling edge endpoints, and
//! cycles, so every stored graph yields a plan. [`FlowGraph::execution_plan`]
//! is the same Kahn traversal the engine replays at run time.
//!
//! Node configuration is duck-typed JSON on the wire; [`NodeAction::resolve`]
//! decodes it into a tagged variant keyed on `(type, kind)`. Decoding is
//! total: unknown or malformed configurations map to sentinel variants that
//! fail the step with a clear message instead of executing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Graph Shape
// ============================================================================

/// A directed edge between two nodes.
///
/// # Invariants
/// - Both endpoints name nodes present in the owning graph (checked by
///   [`FlowGraph::validate`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Source node.
    pub from: NodeId,
    /// Destination node.
    pub to: NodeId,
}

/// One node of a flow graph.
///
/// # Invariants
/// - `id` is unique within the graph.
/// - `config` is opaque JSON until decoded by [`NodeAction::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    /// Node identifier, unique within the graph.
    pub id: NodeId,
    /// Node type label (`start`, `end`, `condition`, dotted provider op, …).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Action kind for generic action nodes (`http`, `email`, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Editor display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Editor canvas x coordinate.
    #[serde(default)]
    pub x: f64,
    /// Editor canvas y coordinate.
    #[serde(default)]
    pub y: f64,
    /// Node configuration payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// The `{nodes, edges}` graph stored inside a flow version.
///
/// # Invariants
/// - After [`FlowGraph::validate`] succeeds the node set plus edges form a
///   DAG with unique node ids and resolvable endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    /// Graph nodes in author insertion order.
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    /// Directed edges in author insertion order.
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

// ============================================================================
// SECTION: Graph Errors
// ============================================================================

/// Validation and planning errors for flow graphs.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two nodes share the same identifier.
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    /// An edge endpoint names a node that does not exist.
    #[error("edge endpoint refers to unknown node: {0}")]
    UnknownEdgeEndpoint(String),
    /// The traversal could not cover every node.
    #[error("invalid graph: cycle or disconnected node")]
    CycleOrDisconnected,
}

// ============================================================================
// SECTION: Validation & Planning
// ============================================================================

impl FlowGraph {
    /// Validates node id uniqueness, edge endpoints, and acyclicity.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] naming the first violation found.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut seen: HashSet<&NodeId> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                return Err(GraphError::DuplicateNode(node.id.to_string()));
            }
        }
        for edge in &self.edges {
            if !seen.contains(&edge.from) {
                return Err(GraphError::UnknownEdgeEndpoint(edge.from.to_string()));
            }
            if !seen.contains(&edge.to) {
                return Err(GraphError::UnknownEdgeEndpoint(edge.to.to_string()));
            }
        }
        self.execution_plan().map(|_| ())
    }

    /// Computes the sequential execution plan via Kahn's algorithm.
    ///
    /// Zero-in-degree ties break by node insertion order; the plan covers
    /// every node exactly once or the graph is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CycleOrDisconnected`] when the traversal cannot
    /// cover every node, and [`GraphError::UnknownEdgeEndpoint`] when an edge
    /// names a missing node.
    pub fn execution_plan(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut in_degree: HashMap<&NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        let mut successors: HashMap<&NodeId, Vec<&NodeId>> =
            HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            in_degree.insert(&node.id, 0);
            successors.insert(&node.id, Vec::new());
        }
        for edge in &self.edges {
            if !in_degree.contains_key(&edge.from) {
                return Err(GraphError::UnknownEdgeEndpoint(edge.from.to_string()));
            }
            let Some(degree) = in_degree.get_mut(&edge.to) else {
                return Err(GraphError::UnknownEdgeEndpoint(edge.to.to_string()));
            };
            *degree += 1;
            if let Some(list) = successors.get_mut(&edge.from) {
                list.push(&edge.to);
            }
        }

        let mut queue: VecDeque<&NodeId> = self
            .nodes
            .iter()
            .filter(|node| in_degree.get(&node.id).copied() == Some(0))
            .map(|node| &node.id)
            .collect();
        let mut plan: Vec<NodeId> = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            plan.push(current.clone());
            if let Some(next) = successors.get(current) {
                for successor in next {
                    if let Some(degree) = in_degree.get_mut(*successor) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(*successor);
                        }
                    }
                }
            }
        }

        if plan.len() == self.nodes.len() {
            Ok(plan)
        } else {
            Err(GraphError::CycleOrDisconnected)
        }
    }

    /// Returns the node with the given id, when present.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    /// Returns the ids of nodes with an edge into `id`, in edge order.
    #[must_use]
    pub fn predecessors(&self, id: &NodeId) -> Vec<&NodeId> {
        self.edges.iter().filter(|edge| &edge.to == id).map(|edge| &edge.from).collect()
    }
}

// ============================================================================
// SECTION: Transform Kinds
// ============================================================================

/// Transformations supported by `transform` nodes.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Forward inputs unchanged.
    #[default]
    Passthrough,
    /// Merge all input objects into one object.
    Merge,
    /// Keep only the configured fields from the merged inputs.
    Extract,
}

impl TransformKind {
    /// Parses a stable wire label, defaulting to passthrough when unknown.
    #[must_use]
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            Some("merge") => Self::Merge,
            Some("extract") => Self::Extract,
            _ => Self::Passthrough,
        }
    }
}

// ============================================================================
// SECTION: Node Actions
// ============================================================================

/// Configuration of an HTTP action node.
///
/// # Invariants
/// - `method` defaults to GET; header names pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpActionConfig {
    /// Target URL.
    pub url: String,
    /// HTTP method (GET when omitted).
    #[serde(default = "default_http_method")]
    pub method: String,
    /// Optional request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Optional JSON request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Default HTTP method for action nodes.
fn default_http_method() -> String {
    "GET".to_string()
}

/// Configuration of an email action node.
///
/// # Invariants
/// - All fields are optional; the mail capability validates at send time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailActionConfig {
    /// Recipient address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Message subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Decoded node behavior, keyed on `(type, kind)`.
///
/// # Invariants
/// - [`NodeAction::resolve`] is total: every node maps to exactly one
///   variant, with sentinel variants for unknown or malformed input.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    /// Entry node; outputs the trigger data.
    Start,
    /// Trigger node; outputs the trigger data.
    Trigger,
    /// Terminal node; summarizes inputs.
    End,
    /// Condition node with its optional expression.
    Condition {
        /// Raw condition expression when configured.
        condition: Option<String>,
    },
    /// Transform node.
    Transform {
        /// Selected transformation.
        transformation: TransformKind,
        /// Fields kept by the extract transformation.
        fields: Option<Vec<String>>,
    },
    /// Generic HTTP action.
    HttpRequest(HttpActionConfig),
    /// Email action routed through the mail capability.
    Email(EmailActionConfig),
    /// Dotted provider operation (`mtn.requestToPay`, `fW.fWVerifyPayment`, …).
    ProviderOp {
        /// Provider prefix before the dot.
        provider: String,
        /// Operation name after the dot.
        operation: String,
        /// Raw operation configuration.
        config: Value,
    },
    /// Known action kind with no runtime connector wired (database, salesforce).
    Unconnected {
        /// The action kind.
        kind: String,
    },
    /// Unknown `(type, kind)` pair; fails the step with a clear error.
    Unrecognized {
        /// Node type label as authored.
        node_type: String,
        /// Node kind as authored.
        kind: Option<String>,
    },
    /// Known node whose configuration failed to decode.
    Malformed {
        /// Human-readable decode failure.
        reason: String,
    },
}

impl NodeAction {
    /// Decodes a node into its action variant. Total over all inputs.
    #[must_use]
    pub fn resolve(node: &FlowNode) -> Self {
        match node.node_type.as_str() {
            "start" => Self::Start,
            "trigger" => Self::Trigger,
            "end" => Self::End,
            "condition" => Self::Condition {
                condition: config_str(node, "condition"),
            },
            "transform" => Self::Transform {
                transformation: TransformKind::parse_or_default(
                    config_str(node, "transformation").as_deref(),
                ),
                fields: config_string_list(node, "fields"),
            },
            dotted if dotted.contains('.') => {
                let (provider, operation) = split_dotted(dotted);
                Self::ProviderOp {
                    provider,
                    operation,
                    config: node.config.clone().unwrap_or(Value::Null),
                }
            }
            _ => Self::resolve_action_kind(node),
        }
    }

    /// Decodes the action-kind arm of [`NodeAction::resolve`].
    fn resolve_action_kind(node: &FlowNode) -> Self {
        match node.kind.as_deref() {
            Some("http") => {
                let config = node.config.clone().unwrap_or(Value::Null);
                match serde_json::from_value::<HttpActionConfig>(config) {
                    Ok(http) if !http.url.is_empty() => Self::HttpRequest(http),
                    Ok(_) => Self::Malformed {
                        reason: "http action requires a url".to_string(),
                    },
                    Err(err) => Self::Malformed {
                        reason: format!("http action config: {err}"),
                    },
                }
            }
            Some("email") => {
                let config = node.config.clone().unwrap_or(Value::Null);
                match serde_json::from_value::<EmailActionConfig>(config) {
                    Ok(email) => Self::Email(email),
                    Err(err) => Self::Malformed {
                        reason: format!("email action config: {err}"),
                    },
                }
            }
            Some(kind @ ("database" | "salesforce")) => Self::Unconnected {
                kind: kind.to_string(),
            },
            kind => Self::Unrecognized {
                node_type: node.node_type.clone(),
                kind: kind.map(ToString::to_string),
            },
        }
    }
}

/// Splits a dotted node type into `(provider, operation)`.
fn split_dotted(dotted: &str) -> (String, String) {
    match dotted.split_once('.') {
        Some((provider, operation)) => (provider.to_string(), operation.to_string()),
        None => (dotted.to_string(), String::new()),
    }
}

/// Reads a string field from a node's configuration object.
fn config_str(node: &FlowNode, key: &str) -> Option<String> {
    node.config
        .as_ref()
        .and_then(|config| config.get(key))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Reads a string-array field from a node's configuration object.
fn config_string_list(node: &FlowNode, key: &str) -> Option<Vec<String>> {
    let items = node.config.as_ref()?.get(key)?.as_array()?;
    Some(items.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
}
