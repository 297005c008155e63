// crates/flowgate-core/src/lib.rs
// ============================================================================
// Module: Flowgate Core
// Description: Domain types, graph model, vault, and store interfaces.
// Purpose: Provide the backend-agnostic foundation shared by all Flowgate crates.
// Dependencies: serde, serde_json, thiserror, uuid, time, aes-gcm
// ============================================================================

//! ## Overview
//! This crate defines the canonical Flowgate domain: identifiers, tenancy
//! entities, versioned flow graphs with execution planning, execution records,
//! the secret vault, and the store interfaces implemented by durable backends.
//! Everything here is deterministic and I/O-free except [`vault`] (random
//! nonces) and [`core::time::Timestamp::now`] (wall clock).
//!
//! Invariants:
//! - Graphs admitted through [`core::graph::FlowGraph::validate`] are DAGs
//!   with resolvable edge endpoints.
//! - Status enums serialize with stable snake_case wire forms.
//!
//! Security posture: stored rows and decoded graphs are untrusted input; see
//! the store and graph modules for their validation boundaries.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod error;
pub mod interfaces;
pub mod vault;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::execution::ExecutionLog;
pub use crate::core::execution::ExecutionStatus;
pub use crate::core::execution::ExecutionStep;
pub use crate::core::execution::FlowExecution;
pub use crate::core::execution::LogLevel;
pub use crate::core::execution::StepStatus;
pub use crate::core::execution::TriggerType;
pub use crate::core::flow::Flow;
pub use crate::core::flow::FlowStatus;
pub use crate::core::flow::FlowVersion;
pub use crate::core::graph::EmailActionConfig;
pub use crate::core::graph::FlowEdge;
pub use crate::core::graph::FlowGraph;
pub use crate::core::graph::FlowNode;
pub use crate::core::graph::GraphError;
pub use crate::core::graph::HttpActionConfig;
pub use crate::core::graph::NodeAction;
pub use crate::core::graph::TransformKind;
pub use crate::core::identifiers::ConnectionId;
pub use crate::core::identifiers::ExecutionId;
pub use crate::core::identifiers::FlowId;
pub use crate::core::identifiers::FlowVersionId;
pub use crate::core::identifiers::IntegrationId;
pub use crate::core::identifiers::LogId;
pub use crate::core::identifiers::NodeId;
pub use crate::core::identifiers::NotificationId;
pub use crate::core::identifiers::OrgId;
pub use crate::core::identifiers::RequestId;
pub use crate::core::identifiers::StepId;
pub use crate::core::identifiers::UserId;
pub use crate::core::integration::Connection;
pub use crate::core::integration::ConnectionEnv;
pub use crate::core::integration::Integration;
pub use crate::core::integration::IntegrationStatus;
pub use crate::core::integration::Notification;
pub use crate::core::integration::NotificationKind;
pub use crate::core::integration::TxEvent;
pub use crate::core::org::Organization;
pub use crate::core::org::PendingUser;
pub use crate::core::org::Principal;
pub use crate::core::org::User;
pub use crate::core::policy::ApiRateSample;
pub use crate::core::policy::AuditRecord;
pub use crate::core::policy::IpAllowlistEntry;
pub use crate::core::time::Timestamp;
pub use crate::error::ApiError;
pub use crate::interfaces::ExecutionStore;
pub use crate::interfaces::FlowStore;
pub use crate::interfaces::IdentityStore;
pub use crate::interfaces::MailError;
pub use crate::interfaces::MailMessage;
pub use crate::interfaces::Mailer;
pub use crate::interfaces::NoopMailer;
pub use crate::interfaces::NoopStoreEventSink;
pub use crate::interfaces::PolicyStore;
pub use crate::interfaces::Store;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::StoreEvent;
pub use crate::interfaces::StoreEventKind;
pub use crate::interfaces::StoreEventSink;
pub use crate::interfaces::TenantStore;
pub use crate::vault::SecretVault;
pub use crate::vault::VaultError;
