// crates/flowgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Flowgate Store Interfaces
// Description: Backend-agnostic store traits and the store event hook.
// Purpose: Define the persistence contract consumed by the engine, workers,
//          gate, and HTTP surface.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The store interfaces split the §3 data model along ownership lines:
//! identity (orgs, users, pending signups), flows and versions, execution
//! records, tenant surface (integrations, connections, notifications, tx
//! events), and policy rows (rate samples, allowlist, audit). A durable
//! backend implements all five; [`Store`] is the blanket umbrella trait.
//!
//! Implementations must be org-scoped exactly as the method signatures state:
//! a method taking [`OrgId`] must never return rows of another org.
//! Notification and integration writes publish a [`StoreEvent`] through the
//! injected [`StoreEventSink`] so the event bus can fan out without polling.
//!
//! Security posture: stored rows are untrusted on read; implementations fail
//! closed on corrupt payloads with [`StoreError::Serialization`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::execution::ExecutionLog;
use crate::core::execution::ExecutionStatus;
use crate::core::execution::ExecutionStep;
use crate::core::execution::FlowExecution;
use crate::core::flow::Flow;
use crate::core::flow::FlowStatus;
use crate::core::flow::FlowVersion;
use crate::core::graph::FlowGraph;
use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::FlowId;
use crate::core::identifiers::IntegrationId;
use crate::core::identifiers::NotificationId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::UserId;
use crate::core::integration::Connection;
use crate::core::integration::Integration;
use crate::core::integration::IntegrationStatus;
use crate::core::integration::Notification;
use crate::core::integration::TxEvent;
use crate::core::org::Organization;
use crate::core::org::PendingUser;
use crate::core::org::User;
use crate::core::policy::ApiRateSample;
use crate::core::policy::AuditRecord;
use crate::core::policy::IpAllowlistEntry;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors surfaced by store implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `NotFound`/`Conflict` describe domain outcomes; `Serialization`/
///   `Backend` describe infrastructure failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist in the caller's scope.
    #[error("not found: {0}")]
    NotFound(String),
    /// A uniqueness or state constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A stored payload could not be encoded or decoded.
    #[error("serialization failure: {0}")]
    Serialization(String),
    /// The backend reported an error.
    #[error("store backend failure: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Store Events
// ============================================================================

/// Event kinds published by the store for bus fan-out.
///
/// # Invariants
/// - Variants are stable; their labels are the wire event names subscribers
///   receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    /// The org's notification collection changed.
    NotificationsUpdate,
    /// The org's integration collection changed.
    IntegrationsUpdate,
}

impl StoreEventKind {
    /// Returns the wire event name delivered to subscribers.
    #[must_use]
    pub const fn as_event_name(self) -> &'static str {
        match self {
            Self::NotificationsUpdate => "notifications:update",
            Self::IntegrationsUpdate => "integrations:update",
        }
    }
}

/// One org-scoped store event.
///
/// # Invariants
/// - Carries no payload; subscribers re-read the relevant collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreEvent {
    /// Organization whose collection changed.
    pub org_id: OrgId,
    /// Which collection changed.
    pub kind: StoreEventKind,
}

/// Sink the store publishes events through.
///
/// Implementations must never block: publishing happens inside store write
/// paths.
pub trait StoreEventSink: Send + Sync {
    /// Publishes one event. Delivery is best-effort.
    fn publish(&self, event: StoreEvent);
}

/// Sink that discards every event; useful for tools and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStoreEventSink;

impl StoreEventSink for NoopStoreEventSink {
    fn publish(&self, _event: StoreEvent) {}
}

// ============================================================================
// SECTION: Identity Store
// ============================================================================

/// Organizations, users, and pending signups.
pub trait IdentityStore: Send + Sync {
    /// Inserts a new organization.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the name is taken.
    fn create_organization(&self, org: &Organization) -> Result<(), StoreError>;

    /// Looks up an organization by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn organization_by_id(&self, id: OrgId) -> Result<Option<Organization>, StoreError>;

    /// Looks up an organization by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn organization_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError>;

    /// Inserts a new user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the email is taken
    /// (case-insensitively).
    fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Looks up a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Looks up a user by email, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Rewrites a user row in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the user does not exist.
    fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Inserts or replaces the pending signup for an email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn upsert_pending_user(&self, pending: &PendingUser) -> Result<(), StoreError>;

    /// Looks up a pending signup by email, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn pending_user_by_email(&self, email: &str) -> Result<Option<PendingUser>, StoreError>;

    /// Deletes the pending signup for an email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn delete_pending_user(&self, email: &str) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Flow Store
// ============================================================================

/// Flows and their immutable versions.
pub trait FlowStore: Send + Sync {
    /// Inserts a new flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `(org, lowercase(name))` is
    /// taken by a non-deleted flow.
    fn create_flow(&self, flow: &Flow) -> Result<(), StoreError>;

    /// Looks up a flow by id within an org. Soft-deleted rows are returned
    /// so execution history stays resolvable; callers filter `is_deleted`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn flow_by_id(&self, org_id: OrgId, id: FlowId) -> Result<Option<Flow>, StoreError>;

    /// Lists the org's non-deleted flows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_flows(&self, org_id: OrgId) -> Result<Vec<Flow>, StoreError>;

    /// Sets a flow's status and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the flow does not exist in the
    /// org or is deleted.
    fn set_flow_status(
        &self,
        org_id: OrgId,
        id: FlowId,
        status: FlowStatus,
        updated_at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Soft-deletes a flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the flow does not exist in the
    /// org.
    fn soft_delete_flow(
        &self,
        org_id: OrgId,
        id: FlowId,
        updated_at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Inserts the next version for a flow, assigning `max(version) + 1`
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the flow does not exist.
    fn create_flow_version(
        &self,
        flow_id: FlowId,
        graph: &FlowGraph,
        variables: &Value,
        created_at: Timestamp,
    ) -> Result<FlowVersion, StoreError>;

    /// Returns the highest-numbered version of a flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn latest_flow_version(&self, flow_id: FlowId) -> Result<Option<FlowVersion>, StoreError>;

    /// Returns one specific version of a flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn flow_version(&self, flow_id: FlowId, version: u32)
    -> Result<Option<FlowVersion>, StoreError>;

    /// Lists a flow's versions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_flow_versions(&self, flow_id: FlowId) -> Result<Vec<FlowVersion>, StoreError>;
}

// ============================================================================
// SECTION: Execution Store
// ============================================================================

/// Flow executions, steps, and logs.
pub trait ExecutionStore: Send + Sync {
    /// Inserts a new execution row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn insert_execution(&self, execution: &FlowExecution) -> Result<(), StoreError>;

    /// Looks up an execution by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn execution_by_id(&self, id: ExecutionId) -> Result<Option<FlowExecution>, StoreError>;

    /// Resolves the org owning an execution, joining through its flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn execution_org(&self, id: ExecutionId) -> Result<Option<OrgId>, StoreError>;

    /// Lists executions of one flow, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn executions_for_flow(
        &self,
        flow_id: FlowId,
        limit: usize,
    ) -> Result<Vec<FlowExecution>, StoreError>;

    /// Lists the org's most recent executions across flows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn recent_executions_for_org(
        &self,
        org_id: OrgId,
        limit: usize,
    ) -> Result<Vec<FlowExecution>, StoreError>;

    /// Moves a `running` execution to a terminal status, setting
    /// `completed_at` and the elapsed duration. Returns `false` when the
    /// execution was already terminal (terminal states are sticky).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the execution does not exist.
    fn finish_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        error_message: Option<&str>,
        completed_at: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Inserts a new step row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `(execution, node)` already has
    /// a step.
    fn insert_step(&self, step: &ExecutionStep) -> Result<(), StoreError>;

    /// Rewrites a step row in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the step does not exist.
    fn update_step(&self, step: &ExecutionStep) -> Result<(), StoreError>;

    /// Lists an execution's steps in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn steps_for_execution(&self, id: ExecutionId) -> Result<Vec<ExecutionStep>, StoreError>;

    /// Appends a log line.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn insert_log(&self, log: &ExecutionLog) -> Result<(), StoreError>;

    /// Lists an execution's log lines in insertion order, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn logs_for_execution(
        &self,
        id: ExecutionId,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError>;

    /// Deletes an execution with its steps and logs, permitted only when the
    /// execution's flow belongs to `org_id`. Deletion order is logs, steps,
    /// then the execution row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the execution does not exist in
    /// the org's scope.
    fn delete_execution(&self, id: ExecutionId, org_id: OrgId) -> Result<(), StoreError>;

    /// Lists every execution still in the `running` state, across orgs.
    /// Consumed by the shutdown drain and by stale-run inspection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn running_executions(&self) -> Result<Vec<ExecutionId>, StoreError>;
}

// ============================================================================
// SECTION: Tenant Store
// ============================================================================

/// Integrations, connections, notifications, and tx events.
pub trait TenantStore: Send + Sync {
    /// Inserts a new integration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `(org, lowercase(name))` is
    /// taken.
    fn create_integration(&self, integration: &Integration) -> Result<(), StoreError>;

    /// Looks up an integration by id within an org.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn integration_by_id(
        &self,
        org_id: OrgId,
        id: IntegrationId,
    ) -> Result<Option<Integration>, StoreError>;

    /// Lists the org's integrations, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_integrations(&self, org_id: OrgId) -> Result<Vec<Integration>, StoreError>;

    /// Lists integrations across all orgs whose lowercase name contains
    /// `fragment` (used by the startup self-check).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn integrations_matching_name(&self, fragment: &str) -> Result<Vec<Integration>, StoreError>;

    /// Rewrites an integration's name and probe URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the integration does not exist
    /// in the org, [`StoreError::Conflict`] when the new name is taken.
    fn update_integration_settings(
        &self,
        org_id: OrgId,
        id: IntegrationId,
        name: &str,
        test_url: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Sets an integration's status and `last_checked`, publishing an
    /// integrations store event for the owning org. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the integration does not exist.
    fn set_integration_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
        last_checked: Timestamp,
    ) -> Result<(), StoreError>;

    /// Deletes an integration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the integration does not exist
    /// in the org.
    fn delete_integration(&self, org_id: OrgId, id: IntegrationId) -> Result<(), StoreError>;

    /// Inserts a new provider connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn create_connection(&self, connection: &Connection) -> Result<(), StoreError>;

    /// Returns the newest connection a user holds for a provider.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn connection_for_provider(
        &self,
        owner_user_id: UserId,
        provider: &str,
    ) -> Result<Option<Connection>, StoreError>;

    /// Lists a user's connections, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_connections(&self, owner_user_id: UserId) -> Result<Vec<Connection>, StoreError>;

    /// Inserts a notification and publishes a notifications store event for
    /// the owning org.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError>;

    /// Lists the org's notifications, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_notifications(
        &self,
        org_id: OrgId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Marks one notification read.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the notification does not exist
    /// in the org.
    fn mark_notification_read(&self, org_id: OrgId, id: NotificationId)
    -> Result<(), StoreError>;

    /// Marks all of the org's notifications read, returning the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn mark_all_notifications_read(&self, org_id: OrgId) -> Result<u64, StoreError>;

    /// Appends a tx event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn record_tx_event(
        &self,
        org_id: OrgId,
        success: bool,
        latency_ms: Option<i64>,
        created_at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Lists the org's most recent tx events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn recent_tx_events(&self, org_id: OrgId, limit: usize) -> Result<Vec<TxEvent>, StoreError>;
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

/// Rate samples, IP allowlist entries, and the audit trail.
pub trait PolicyStore: Send + Sync {
    /// Counts a user's rate samples at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn count_rate_samples_since(
        &self,
        user_id: UserId,
        since: Timestamp,
    ) -> Result<u64, StoreError>;

    /// Appends a rate sample.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn insert_rate_sample(&self, sample: &ApiRateSample) -> Result<(), StoreError>;

    /// Deletes rate samples older than `cutoff`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn sweep_rate_samples_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    /// Lists a user's allowlist entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_ip_allowlist(&self, user_id: UserId) -> Result<Vec<IpAllowlistEntry>, StoreError>;

    /// Adds an allowlist entry and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the address is already listed
    /// for the user.
    fn add_ip_allowlist_entry(
        &self,
        user_id: UserId,
        ip_address: &str,
        description: Option<&str>,
        created_at: Timestamp,
    ) -> Result<IpAllowlistEntry, StoreError>;

    /// Removes one allowlist entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the entry does not exist for
    /// the user.
    fn remove_ip_allowlist_entry(&self, user_id: UserId, entry_id: i64)
    -> Result<(), StoreError>;

    /// Returns true when the address matches one of the user's entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn ip_allowed(&self, user_id: UserId, ip_address: &str) -> Result<bool, StoreError>;

    /// Appends an audit record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Mail Capability
// ============================================================================

/// One outbound mail message.
///
/// # Invariants
/// - Bodies are plain text; templating happens before this type is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Mail delivery failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum MailError {
    /// No relay is configured.
    #[error("mail capability not configured")]
    NotConfigured,
    /// The relay rejected or dropped the message.
    #[error("mail send failure: {0}")]
    Send(String),
    /// The send exceeded its deadline.
    #[error("mail send timed out: {0}")]
    Timeout(String),
}

/// Narrow mail capability consumed by the engine's email action and the
/// signup flow.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one message within the configured send timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when no relay is configured or delivery fails.
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Mailer that accepts every message without delivering it; development and
/// test wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Umbrella Store
// ============================================================================

/// The full persistence contract a durable backend provides.
pub trait Store:
    IdentityStore + FlowStore + ExecutionStore + TenantStore + PolicyStore
{
}

impl<T> Store for T where
    T: IdentityStore + FlowStore + ExecutionStore + TenantStore + PolicyStore
{
}
