// crates/flowgate-core/src/core/execution.rs
// ============================================================================
// Module: Flowgate Execution Records
// Description: Flow executions, per-node steps, and execution logs.
// Purpose: Capture the runtime side of the platform with stable status forms.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`FlowExecution`] is one runtime instance of a flow version. The engine
//! materializes one [`ExecutionStep`] per node in plan order and appends
//! [`ExecutionLog`] lines as it goes. Terminal execution states are sticky;
//! `completed_at` is set exactly when the status leaves `running`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::FlowId;
use crate::core::identifiers::LogId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::StepId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Execution Status
// ============================================================================

/// Flow execution lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - `Completed`, `Failed`, and `Cancelled` are terminal and sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The engine is interpreting the plan.
    Running,
    /// Every node completed.
    Completed,
    /// A node failed or the graph was rejected.
    Failed,
    /// A cancel request was observed between nodes.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

// ============================================================================
// SECTION: Trigger Type
// ============================================================================

/// How an execution was started.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Started explicitly through the API.
    Manual,
    /// Started by an inbound webhook.
    Webhook,
    /// Started by a schedule.
    Schedule,
    /// Started by activating the flow.
    Deploy,
}

impl TriggerType {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Webhook => "webhook",
            Self::Schedule => "schedule",
            Self::Deploy => "deploy",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(Self::Manual),
            "webhook" => Some(Self::Webhook),
            "schedule" => Some(Self::Schedule),
            "deploy" => Some(Self::Deploy),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Flow Execution
// ============================================================================

/// One runtime instance of a flow version.
///
/// # Invariants
/// - `(flow_id, flow_version)` references an existing flow version.
/// - `completed_at` is non-null iff `status` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowExecution {
    /// Execution identifier.
    pub id: ExecutionId,
    /// Flow being executed.
    pub flow_id: FlowId,
    /// Version number being executed.
    pub flow_version: u32,
    /// Lifecycle status.
    pub status: ExecutionStatus,
    /// How the execution was started.
    pub trigger_type: TriggerType,
    /// Payload supplied by the trigger.
    pub trigger_data: Value,
    /// Start instant.
    pub started_at: Timestamp,
    /// Completion instant; set exactly when status leaves `running`.
    pub completed_at: Option<Timestamp>,
    /// Failure message when status is `failed`.
    pub error_message: Option<String>,
    /// Wall-clock duration once terminal.
    pub execution_time_ms: Option<i64>,
}

// ============================================================================
// SECTION: Execution Step
// ============================================================================

/// Execution step lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Materialized but not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error; halts the plan.
    Failed,
    /// Never started because the plan halted earlier.
    Skipped,
}

impl StepStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// The per-node runtime record within an execution.
///
/// # Invariants
/// - `(execution_id, node_id)` is unique.
/// - `execution_time_ms` is set exactly when the step reaches a terminal
///   status with a recorded start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Step identifier.
    pub id: StepId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Graph node this step ran.
    pub node_id: NodeId,
    /// Node type label as authored.
    pub node_type: String,
    /// Node kind as authored.
    pub node_kind: Option<String>,
    /// Lifecycle status.
    pub status: StepStatus,
    /// Start instant.
    pub started_at: Option<Timestamp>,
    /// Completion instant.
    pub completed_at: Option<Timestamp>,
    /// Inputs gathered from predecessor outputs.
    pub input_data: Option<Value>,
    /// Output produced by the node.
    pub output_data: Option<Value>,
    /// Failure message when status is `failed`.
    pub error_message: Option<String>,
    /// Wall-clock node duration.
    pub execution_time_ms: Option<i64>,
    /// Node-internal retry count (the engine itself never retries).
    pub retry_count: u32,
}

// ============================================================================
// SECTION: Execution Log
// ============================================================================

/// Execution log severity.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Recoverable oddity.
    Warn,
    /// Failure detail.
    Error,
}

impl LogLevel {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One log line attached to an execution (and optionally a step).
///
/// # Invariants
/// - `step_id`, when set, names a step of the same execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Log line identifier.
    pub id: LogId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Step the line refers to, when any.
    pub step_id: Option<StepId>,
    /// Severity.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Structured context.
    pub metadata: Option<Value>,
    /// Creation instant.
    pub created_at: Timestamp,
}
