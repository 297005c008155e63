// crates/flowgate-engine/src/runner.rs
// ============================================================================
// Module: Execution Runner
// Description: The engine's public contract and the per-execution task.
// Purpose: Start, interpret, query, cancel, and delete flow executions.
// Dependencies: flowgate-core, flowgate-providers, tokio, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`ExecutionRunner`] owns the engine's whole contract. `start_execution`
//! commits a `running` row and returns; one spawned task interprets the plan
//! sequentially, persisting a step per node and logs as it goes. Failure is
//! fail-fast: the failing step and execution both record the error, and
//! remaining plan nodes are written as `skipped`. Cancellation is observed
//! between nodes; an in-flight node runs to its own timeout. Shutdown waits
//! for in-flight tasks up to the grace window, then fails survivors with
//! `error_message = "shutdown"`.
//!
//! The per-execution output map lives on the driving task's stack and is
//! never shared.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flowgate_core::ApiError;
use flowgate_core::ExecutionId;
use flowgate_core::ExecutionLog;
use flowgate_core::ExecutionStatus;
use flowgate_core::ExecutionStep;
use flowgate_core::Flow;
use flowgate_core::FlowExecution;
use flowgate_core::FlowId;
use flowgate_core::FlowNode;
use flowgate_core::FlowVersion;
use flowgate_core::HttpActionConfig;
use flowgate_core::LogId;
use flowgate_core::LogLevel;
use flowgate_core::MailMessage;
use flowgate_core::Mailer;
use flowgate_core::NodeAction;
use flowgate_core::NodeId;
use flowgate_core::Notification;
use flowgate_core::NotificationId;
use flowgate_core::NotificationKind;
use flowgate_core::OrgId;
use flowgate_core::SecretVault;
use flowgate_core::StepId;
use flowgate_core::StepStatus;
use flowgate_core::Store;
use flowgate_core::Timestamp;
use flowgate_core::TriggerType;
use flowgate_providers::OutboundError;
use flowgate_providers::ProviderRegistry;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Notify;

use crate::eval::apply_transform;
use crate::eval::evaluate_condition;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard cap on the org-wide recent-executions listing.
const RECENT_LIMIT_CAP: usize = 100;

// ============================================================================
// SECTION: Settings & Results
// ============================================================================

/// Engine timing knobs.
///
/// # Invariants
/// - Both durations are positive.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Timeout applied to HTTP action nodes.
    pub http_timeout: Duration,
    /// Drain window granted to in-flight executions at shutdown.
    pub shutdown_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Acknowledgement returned by `start_execution` once the row is committed.
///
/// # Invariants
/// - `status` is always `running`; the caller never waits for completion.
#[derive(Debug, Clone, Serialize)]
pub struct StartedExecution {
    /// The new execution's identifier.
    pub execution_id: ExecutionId,
    /// Name of the executed flow.
    pub flow_name: String,
    /// Version number being executed.
    pub version: u32,
    /// Initial status (`running`).
    pub status: ExecutionStatus,
}

// ============================================================================
// SECTION: In-Flight Tracking
// ============================================================================

/// Count of executions currently being driven, with an idle signal.
struct InFlight {
    /// Number of live execution tasks.
    count: AtomicUsize,
    /// Notified whenever the count reaches zero.
    idle: Notify,
}

/// Guard holding one in-flight slot for the duration of a task.
struct InFlightGuard {
    /// Shared counter.
    tracker: Arc<InFlight>,
}

impl InFlightGuard {
    /// Claims a slot.
    fn claim(tracker: Arc<InFlight>) -> Self {
        tracker.count.fetch_add(1, Ordering::AcqRel);
        Self {
            tracker,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.tracker.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// The flow execution engine.
///
/// # Invariants
/// - One spawned task drives each execution; nodes within it run
///   sequentially.
/// - Store writes for one execution are issued in order: steps, logs, then
///   the final execution update.
pub struct ExecutionRunner {
    /// Durable store capability.
    store: Arc<dyn Store>,
    /// Provider dispatch registry.
    registry: Arc<ProviderRegistry>,
    /// Vault for decrypting provider connections; absent means provider
    /// nodes fail closed.
    vault: Option<Arc<SecretVault>>,
    /// Mail capability for email action nodes.
    mailer: Arc<dyn Mailer>,
    /// Timing knobs.
    settings: EngineSettings,
    /// In-flight execution tracking for shutdown drain.
    in_flight: Arc<InFlight>,
}

impl ExecutionRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<ProviderRegistry>,
        vault: Option<Arc<SecretVault>>,
        mailer: Arc<dyn Mailer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            registry,
            vault,
            mailer,
            settings,
            in_flight: Arc::new(InFlight {
                count: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Public contract: start
    // ------------------------------------------------------------------

    /// Starts an execution of the flow's latest version. Returns as soon as
    /// the `running` row is committed; interpretation happens on a spawned
    /// task.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the flow is deleted, missing, or
    /// has no versions; store failures map through.
    pub fn start_execution(
        self: &Arc<Self>,
        org_id: OrgId,
        flow_id: FlowId,
        trigger_type: TriggerType,
        trigger_data: Value,
    ) -> Result<StartedExecution, ApiError> {
        let flow = self
            .store
            .flow_by_id(org_id, flow_id)?
            .filter(|flow| !flow.is_deleted)
            .ok_or_else(|| ApiError::NotFound(format!("flow {flow_id}")))?;
        let version = self
            .store
            .latest_flow_version(flow_id)?
            .ok_or_else(|| ApiError::NotFound(format!("flow {flow_id} has no versions")))?;

        let execution = FlowExecution {
            id: ExecutionId::generate(),
            flow_id,
            flow_version: version.version,
            status: ExecutionStatus::Running,
            trigger_type,
            trigger_data: trigger_data.clone(),
            started_at: Timestamp::now(),
            completed_at: None,
            error_message: None,
            execution_time_ms: None,
        };
        self.store.insert_execution(&execution)?;

        let started = StartedExecution {
            execution_id: execution.id,
            flow_name: flow.name.clone(),
            version: version.version,
            status: ExecutionStatus::Running,
        };

        let runner = Arc::clone(self);
        let guard = InFlightGuard::claim(Arc::clone(&self.in_flight));
        tokio::spawn(async move {
            let _guard = guard;
            runner.run_execution(org_id, &flow, &version, execution.id, trigger_data).await;
        });
        Ok(started)
    }

    // ------------------------------------------------------------------
    // Public contract: reads
    // ------------------------------------------------------------------

    /// Fetches one execution within the caller's org.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the execution is missing or owned
    /// by another org.
    pub fn get_execution(
        &self,
        org_id: OrgId,
        execution_id: ExecutionId,
    ) -> Result<FlowExecution, ApiError> {
        self.owned_execution(org_id, execution_id)
    }

    /// Lists an execution's steps within the caller's org.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the execution is out of scope.
    pub fn get_steps(
        &self,
        org_id: OrgId,
        execution_id: ExecutionId,
    ) -> Result<Vec<ExecutionStep>, ApiError> {
        self.owned_execution(org_id, execution_id)?;
        Ok(self.store.steps_for_execution(execution_id)?)
    }

    /// Lists an execution's logs within the caller's org, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the execution is out of scope.
    pub fn get_logs(
        &self,
        org_id: OrgId,
        execution_id: ExecutionId,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, ApiError> {
        self.owned_execution(org_id, execution_id)?;
        Ok(self.store.logs_for_execution(execution_id, limit)?)
    }

    /// Lists executions of one flow, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the flow is out of scope.
    pub fn list_flow_executions(
        &self,
        org_id: OrgId,
        flow_id: FlowId,
        limit: usize,
    ) -> Result<Vec<FlowExecution>, ApiError> {
        self.store
            .flow_by_id(org_id, flow_id)?
            .ok_or_else(|| ApiError::NotFound(format!("flow {flow_id}")))?;
        Ok(self.store.executions_for_flow(flow_id, limit)?)
    }

    /// Lists the org's most recent executions across flows; `limit` is
    /// capped at 100.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on store failure.
    pub fn list_recent_for_org(
        &self,
        org_id: OrgId,
        limit: usize,
    ) -> Result<Vec<FlowExecution>, ApiError> {
        Ok(self.store.recent_executions_for_org(org_id, limit.min(RECENT_LIMIT_CAP))?)
    }

    // ------------------------------------------------------------------
    // Public contract: cancel & delete
    // ------------------------------------------------------------------

    /// Requests cooperative cancellation. Moves `running → cancelled` and
    /// sets `completed_at`; a no-op on terminal states. The driving task
    /// observes the flag between nodes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the execution is out of scope.
    pub fn cancel_execution(
        &self,
        org_id: OrgId,
        execution_id: ExecutionId,
    ) -> Result<FlowExecution, ApiError> {
        self.owned_execution(org_id, execution_id)?;
        self.store.finish_execution(
            execution_id,
            ExecutionStatus::Cancelled,
            None,
            Timestamp::now(),
        )?;
        self.owned_execution(org_id, execution_id)
    }

    /// Deletes an execution with its steps and logs, permitted only within
    /// the owning org.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the execution is out of scope.
    pub fn delete_execution(
        &self,
        org_id: OrgId,
        execution_id: ExecutionId,
    ) -> Result<(), ApiError> {
        Ok(self.store.delete_execution(execution_id, org_id)?)
    }

    // ------------------------------------------------------------------
    // Public contract: shutdown
    // ------------------------------------------------------------------

    /// Drains in-flight executions for the grace window, then fails
    /// survivors with `error_message = "shutdown"`.
    pub async fn shutdown(&self) {
        let deadline = tokio::time::Instant::now() + self.settings.shutdown_grace;
        while self.in_flight.count.load(Ordering::Acquire) > 0 {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            let waited =
                tokio::time::timeout_at(deadline, self.in_flight.idle.notified()).await;
            if waited.is_err() {
                break;
            }
        }
        match self.store.running_executions() {
            Ok(survivors) => {
                for execution_id in survivors {
                    if let Err(err) = self.store.finish_execution(
                        execution_id,
                        ExecutionStatus::Failed,
                        Some("shutdown"),
                        Timestamp::now(),
                    ) {
                        tracing::warn!(%execution_id, error = %err, "shutdown sweep failed");
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "shutdown sweep could not list runners"),
        }
    }

    // ------------------------------------------------------------------
    // Interpretation
    // ------------------------------------------------------------------

    /// Drives one execution to a terminal state.
    async fn run_execution(
        &self,
        org_id: OrgId,
        flow: &Flow,
        version: &FlowVersion,
        execution_id: ExecutionId,
        trigger_data: Value,
    ) {
        let plan = match version.graph.execution_plan() {
            Ok(plan) => plan,
            Err(err) => {
                self.log(
                    execution_id,
                    None,
                    LogLevel::Error,
                    format!("Graph rejected: {err}"),
                    None,
                );
                self.finish(execution_id, ExecutionStatus::Failed, Some(&err.to_string()));
                self.notify_outcome(org_id, flow, execution_id, ExecutionStatus::Failed);
                return;
            }
        };

        let mut outputs: HashMap<String, Value> = HashMap::with_capacity(plan.len());
        for (position, node_id) in plan.iter().enumerate() {
            if self.cancellation_requested(execution_id) {
                self.log(execution_id, None, LogLevel::Info, "Execution cancelled", None);
                self.skip_remaining(execution_id, version, &plan[position..]);
                return;
            }
            let Some(node) = version.graph.node(node_id) else {
                self.finish(
                    execution_id,
                    ExecutionStatus::Failed,
                    Some(&format!("plan references unknown node {node_id}")),
                );
                return;
            };

            let inputs = gather_inputs(version, node_id, &outputs);
            let step_id = StepId::generate();
            let started_at = Timestamp::now();
            let mut step = ExecutionStep {
                id: step_id,
                execution_id,
                node_id: node_id.clone(),
                node_type: node.node_type.clone(),
                node_kind: node.kind.clone(),
                status: StepStatus::Running,
                started_at: Some(started_at),
                completed_at: None,
                input_data: Some(Value::Object(inputs.clone())),
                output_data: None,
                error_message: None,
                execution_time_ms: None,
                retry_count: 0,
            };
            if let Err(err) = self.store.insert_step(&step) {
                self.finish(execution_id, ExecutionStatus::Failed, Some(&err.to_string()));
                return;
            }
            self.log(
                execution_id,
                Some(step_id),
                LogLevel::Info,
                format!("Executing node: {node_id}"),
                None,
            );

            let outcome = self
                .execute_node(org_id, flow, execution_id, step_id, node, &trigger_data, &inputs)
                .await;
            let completed_at = Timestamp::now();
            step.completed_at = Some(completed_at);
            step.execution_time_ms = Some(completed_at.millis_since(started_at));
            match outcome {
                Ok(output) => {
                    outputs.insert(node_id.to_string(), output.clone());
                    step.status = StepStatus::Completed;
                    step.output_data = Some(output);
                    if let Err(err) = self.store.update_step(&step) {
                        self.finish(execution_id, ExecutionStatus::Failed, Some(&err.to_string()));
                        return;
                    }
                }
                Err(message) => {
                    step.status = StepStatus::Failed;
                    step.error_message = Some(message.clone());
                    if let Err(err) = self.store.update_step(&step) {
                        tracing::warn!(%execution_id, error = %err, "failed-step update lost");
                    }
                    self.log(
                        execution_id,
                        Some(step_id),
                        LogLevel::Error,
                        format!("Node {node_id} failed: {message}"),
                        Some(json!({ "node": node_id.to_string(), "error": message })),
                    );
                    self.skip_remaining(
                        execution_id,
                        version,
                        plan.get(position + 1..).unwrap_or_default(),
                    );
                    self.finish(execution_id, ExecutionStatus::Failed, Some(&message));
                    self.notify_outcome(org_id, flow, execution_id, ExecutionStatus::Failed);
                    return;
                }
            }
        }

        self.log(execution_id, None, LogLevel::Info, "Execution completed", None);
        self.finish(execution_id, ExecutionStatus::Completed, None);
        self.notify_outcome(org_id, flow, execution_id, ExecutionStatus::Completed);
    }

    /// Queues the user-visible outcome notification (which publishes the
    /// org's `notifications:update` through the store hook).
    fn notify_outcome(
        &self,
        org_id: OrgId,
        flow: &Flow,
        execution_id: ExecutionId,
        status: ExecutionStatus,
    ) {
        let (kind, title) = match status {
            ExecutionStatus::Failed => (NotificationKind::Error, "Flow execution failed"),
            _ => (NotificationKind::Info, "Flow execution completed"),
        };
        let notification = Notification {
            id: NotificationId::generate(),
            org_id,
            kind,
            title: title.to_string(),
            message: format!("Flow '{}' finished with status {}", flow.name, status.as_str()),
            related_id: Some(execution_id.to_string()),
            is_read: false,
            created_at: Timestamp::now(),
        };
        if let Err(err) = self.store.insert_notification(&notification) {
            tracing::warn!(%execution_id, error = %err, "outcome notification lost");
        }
    }

    /// Executes one node and returns its output or a failure message.
    #[allow(
        clippy::too_many_arguments,
        reason = "Node execution needs the full execution context."
    )]
    async fn execute_node(
        &self,
        org_id: OrgId,
        flow: &Flow,
        execution_id: ExecutionId,
        step_id: StepId,
        node: &FlowNode,
        trigger_data: &Value,
        inputs: &Map<String, Value>,
    ) -> Result<Value, String> {
        match NodeAction::resolve(node) {
            NodeAction::Start | NodeAction::Trigger => Ok(trigger_data.clone()),
            NodeAction::End => Ok(json!({
                "completed": true,
                "inputs": Value::Object(inputs.clone()),
                "timestamp": Timestamp::now().as_unix_millis(),
            })),
            NodeAction::Condition {
                condition,
            } => Ok(evaluate_condition(condition.as_deref(), inputs)),
            NodeAction::Transform {
                transformation,
                fields,
            } => Ok(apply_transform(transformation, fields.as_deref(), inputs)),
            NodeAction::HttpRequest(config) => self.execute_http(&config).await,
            NodeAction::Email(config) => {
                let to = config
                    .to
                    .filter(|to| !to.is_empty())
                    .ok_or_else(|| "email action requires a recipient".to_string())?;
                let message = MailMessage {
                    to: to.clone(),
                    subject: config.subject.unwrap_or_else(|| "Flowgate notification".to_string()),
                    body: config.body.unwrap_or_default(),
                };
                self.mailer.send(&message).await.map_err(|err| err.to_string())?;
                Ok(json!({ "sent": true, "to": to }))
            }
            NodeAction::ProviderOp {
                provider,
                operation,
                config,
            } => self.execute_provider_op(org_id, flow, &provider, &operation, &config).await,
            NodeAction::Unconnected {
                kind,
            } => Err(format!("no connector configured for action kind '{kind}'")),
            NodeAction::Unrecognized {
                node_type,
                kind,
            } => {
                self.log(
                    execution_id,
                    Some(step_id),
                    LogLevel::Warn,
                    format!("Unrecognized action: type={node_type} kind={kind:?}"),
                    None,
                );
                Err(format!("unrecognized action: type={node_type} kind={kind:?}"))
            }
            NodeAction::Malformed {
                reason,
            } => Err(reason),
        }
    }

    /// Executes an HTTP action node. Non-2xx responses are successful step
    /// outputs shaped `{status, error, headers}`.
    async fn execute_http(&self, config: &HttpActionConfig) -> Result<Value, String> {
        let headers = config.headers.clone().unwrap_or_default();
        let result = self
            .registry
            .http()
            .execute(
                &config.method,
                &config.url,
                &headers,
                config.body.as_ref(),
                self.settings.http_timeout,
            )
            .await;
        match result {
            Ok(response) if response.is_success() => Ok(json!({
                "status": response.status,
                "data": response.body,
                "headers": response.headers,
            })),
            Ok(response) => Ok(json!({
                "status": response.status,
                "error": response.body,
                "headers": response.headers,
            })),
            Err(OutboundError::Timeout(detail)) => {
                Err(format!("http request timed out: {detail}"))
            }
            Err(err) => Err(format!("http request failed: {err}")),
        }
    }

    /// Executes a dotted provider operation using the flow owner's stored
    /// connection.
    async fn execute_provider_op(
        &self,
        org_id: OrgId,
        flow: &Flow,
        provider: &str,
        operation: &str,
        config: &Value,
    ) -> Result<Value, String> {
        let Some(vault) = &self.vault else {
            return Err("secret vault unavailable; provider credentials locked".to_string());
        };
        let connection = self
            .store
            .connection_for_provider(flow.created_by, provider)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("no {provider} connection configured for the flow owner"))?;
        let credentials: Value = vault
            .decrypt_value(&connection.config_enc)
            .map_err(|_| "provider credential decryption failed".to_string())?;
        self.registry
            .dispatch(org_id, provider, operation, &credentials, config)
            .await
            .map_err(|err| err.to_string())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Returns true when the execution row left `running` behind our back
    /// (cancel request between nodes).
    fn cancellation_requested(&self, execution_id: ExecutionId) -> bool {
        matches!(
            self.store.execution_by_id(execution_id),
            Ok(Some(execution)) if execution.status == ExecutionStatus::Cancelled
        )
    }

    /// Writes `skipped` step rows for plan nodes that never started.
    fn skip_remaining(
        &self,
        execution_id: ExecutionId,
        version: &FlowVersion,
        remaining: &[NodeId],
    ) {
        for node_id in remaining {
            let Some(node) = version.graph.node(node_id) else {
                continue;
            };
            let step = ExecutionStep {
                id: StepId::generate(),
                execution_id,
                node_id: node_id.clone(),
                node_type: node.node_type.clone(),
                node_kind: node.kind.clone(),
                status: StepStatus::Skipped,
                started_at: None,
                completed_at: None,
                input_data: None,
                output_data: None,
                error_message: None,
                execution_time_ms: None,
                retry_count: 0,
            };
            if let Err(err) = self.store.insert_step(&step) {
                tracing::warn!(%execution_id, node = %node_id, error = %err, "skip row lost");
            }
        }
    }

    /// Moves the execution to a terminal state; sticky on races.
    fn finish(&self, execution_id: ExecutionId, status: ExecutionStatus, error: Option<&str>) {
        if let Err(err) =
            self.store.finish_execution(execution_id, status, error, Timestamp::now())
        {
            tracing::warn!(%execution_id, error = %err, "finish update lost");
        }
    }

    /// Appends an execution log line; failures are logged, never raised.
    fn log(
        &self,
        execution_id: ExecutionId,
        step_id: Option<StepId>,
        level: LogLevel,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) {
        let entry = ExecutionLog {
            id: LogId::generate(),
            execution_id,
            step_id,
            level,
            message: message.into(),
            metadata,
            created_at: Timestamp::now(),
        };
        if let Err(err) = self.store.insert_log(&entry) {
            tracing::warn!(%execution_id, error = %err, "execution log lost");
        }
    }

    /// Resolves an execution row scoped to the caller's org.
    fn owned_execution(
        &self,
        org_id: OrgId,
        execution_id: ExecutionId,
    ) -> Result<FlowExecution, ApiError> {
        let owner = self.store.execution_org(execution_id)?;
        if owner != Some(org_id) {
            return Err(ApiError::NotFound(format!("execution {execution_id}")));
        }
        self.store
            .execution_by_id(execution_id)?
            .ok_or_else(|| ApiError::NotFound(format!("execution {execution_id}")))
    }
}

// ============================================================================
// SECTION: Input Gathering
// ============================================================================

/// Collects predecessor outputs for a node, keyed by predecessor id.
fn gather_inputs(
    version: &FlowVersion,
    node_id: &NodeId,
    outputs: &HashMap<String, Value>,
) -> Map<String, Value> {
    let mut inputs = Map::new();
    for predecessor in version.graph.predecessors(node_id) {
        if let Some(output) = outputs.get(predecessor.as_str()) {
            inputs.insert(predecessor.to_string(), output.clone());
        }
    }
    inputs
}
