// crates/flowgate-core/src/core/integration.rs
// ============================================================================
// Module: Flowgate Integration Model
// Description: Integrations, provider connections, notifications, tx events.
// Purpose: Capture external-dependency health and its user-visible trail.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! An [`Integration`] is an org's declared dependency on an external system
//! plus its last known health, maintained by the verification worker. A
//! [`Connection`] is the encrypted credential blob backing provider calls.
//! [`Notification`] rows queue user-visible events; [`TxEvent`] rows are the
//! per-call success/latency rollup dashboards read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ConnectionId;
use crate::core::identifiers::IntegrationId;
use crate::core::identifiers::NotificationId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Integration
// ============================================================================

/// Integration health status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - `Active` is only written after a successful probe (or startup
///   self-check with credentials present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Awaiting the outcome of a verification probe.
    Pending,
    /// Last probe succeeded.
    Active,
    /// Last probe failed or no probe target exists.
    Error,
}

impl IntegrationStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Error => "error",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// An org's declared external dependency and its last known health.
///
/// # Invariants
/// - `(org_id, lowercase(name))` is unique.
/// - `last_checked` is rewritten by every probe; last write wins under
///   concurrent re-verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    /// Integration identifier.
    pub id: IntegrationId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Display name, unique per org case-insensitively.
    pub name: String,
    /// Last known health.
    pub status: IntegrationStatus,
    /// Probe URL override; when absent a provider default is inferred.
    pub test_url: Option<String>,
    /// Instant of the last probe write.
    pub last_checked: Option<Timestamp>,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Target environment of a provider connection.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEnv {
    /// Provider sandbox environment.
    Sandbox,
    /// Provider production environment.
    Production,
}

impl ConnectionEnv {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sandbox" => Some(Self::Sandbox),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Provider credentials encrypted with the secret vault.
///
/// # Invariants
/// - `config_enc` is an opaque vault envelope; plaintext never reaches the
///   store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection identifier.
    pub id: ConnectionId,
    /// User who created the credentials.
    pub owner_user_id: UserId,
    /// Provider label (`mtn`, `flutterwave`, …).
    pub provider: String,
    /// Target environment.
    pub env: ConnectionEnv,
    /// Display label.
    pub label: String,
    /// Encrypted configuration blob.
    pub config_enc: String,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Notification
// ============================================================================

/// User-visible notification severity.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Informational event.
    Info,
    /// Something needs attention.
    Warn,
    /// A failure happened.
    Error,
}

impl NotificationKind {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One queued user-visible event.
///
/// # Invariants
/// - Inserting a notification publishes a store event for the org's bus room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier.
    pub id: NotificationId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Severity.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Full message.
    pub message: String,
    /// Related row identifier rendered as a string, when any.
    pub related_id: Option<String>,
    /// Read marker.
    pub is_read: bool,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Tx Event
// ============================================================================

/// Aggregated rollup row for one outbound provider call.
///
/// # Invariants
/// - Appended for every provider-endpoint call, scoped to the initiating org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    /// Row identifier (store-assigned).
    pub id: i64,
    /// Initiating organization.
    pub org_id: OrgId,
    /// Whether the call succeeded at the transport and protocol level.
    pub success: bool,
    /// Observed latency when measured.
    pub latency_ms: Option<i64>,
    /// Creation instant.
    pub created_at: Timestamp,
}
