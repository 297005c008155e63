// crates/flowgate-core/src/core/policy.rs
// ============================================================================
// Module: Flowgate Policy Records
// Description: Rate samples, IP allowlist entries, and audit records.
// Purpose: Capture the rows the principal & policy gate reads and appends.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! The policy gate accounts each admitted request with an [`ApiRateSample`],
//! checks [`IpAllowlistEntry`] rows for opted-in users, and appends an
//! [`AuditRecord`] for every authenticated state-changing call. All three
//! tables are append-heavy; rate samples are swept after 24 hours.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RequestId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Window over which rate samples are counted, in milliseconds.
pub const RATE_WINDOW_MILLIS: i64 = 60 * 60 * 1_000;

/// Age beyond which rate samples are swept, in milliseconds.
pub const RATE_SWEEP_AGE_MILLIS: i64 = 24 * 60 * 60 * 1_000;

// ============================================================================
// SECTION: Rate Sample
// ============================================================================

/// Append-only record of one admitted authenticated request.
///
/// # Invariants
/// - A sample is appended only after the quota check admits the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRateSample {
    /// User the request was attributed to.
    pub user_id: UserId,
    /// Endpoint label (method plus route template).
    pub endpoint: String,
    /// Client IP when resolvable.
    pub ip_address: Option<String>,
    /// Admission instant.
    pub timestamp: Timestamp,
}

// ============================================================================
// SECTION: IP Allowlist
// ============================================================================

/// One allowed source address for a user with the allowlist enabled.
///
/// # Invariants
/// - `ip_address` is stored in canonical textual form (IPv6-mapped IPv4
///   normalized to dotted-quad).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllowlistEntry {
    /// Row identifier (store-assigned).
    pub id: i64,
    /// User the entry belongs to.
    pub user_id: UserId,
    /// Allowed source address.
    pub ip_address: String,
    /// Operator note.
    pub description: Option<String>,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// Append-only audit trail row for an authenticated state-changing call.
///
/// # Invariants
/// - Insert failures are logged by the caller and never surfaced to the
///   client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Acting user when authenticated.
    pub user_id: Option<UserId>,
    /// Action label (`flow.create`, `integration.verify`, …).
    pub action: String,
    /// Target entity type.
    pub target_type: Option<String>,
    /// Target entity identifier rendered as a string.
    pub target_id: Option<String>,
    /// Route template that served the request.
    pub route: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Client IP.
    pub ip: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Response status code.
    pub status_code: Option<u16>,
    /// Request identifier.
    pub request_id: Option<RequestId>,
    /// Free-form structured context.
    pub metadata: Option<Value>,
    /// Creation instant.
    pub created_at: Timestamp,
}
