// crates/flowgate-core/src/core/org.rs
// ============================================================================
// Module: Flowgate Tenancy Model
// Description: Organizations, users, pending signups, and principals.
// Purpose: Capture the tenancy entities every other record is scoped to.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Every Flowgate row belongs to exactly one [`Organization`]. [`User`] rows
//! carry the per-principal policy knobs consumed by the request gate (rate
//! quota, IP allowlist opt-in). [`PendingUser`] rows exist only between
//! signup and email verification. [`Principal`] is the `(user, org)` pair a
//! verified session token resolves to; it is the sole identity input the
//! engine and policy gate consume.
//!
//! Security posture: `password_hash` fields hold Argon2 output, never
//! plaintext; emails are compared case-insensitively at the store boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::OrgId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Days after deactivation during which a user may be reactivated.
pub const REACTIVATION_WINDOW_DAYS: i64 = 30;

/// Millisecond form of [`REACTIVATION_WINDOW_DAYS`].
pub const REACTIVATION_WINDOW_MILLIS: i64 = REACTIVATION_WINDOW_DAYS * 24 * 60 * 60 * 1_000;

/// Hours a pending signup code stays valid.
pub const PENDING_USER_TTL_HOURS: i64 = 24;

/// Millisecond form of [`PENDING_USER_TTL_HOURS`].
pub const PENDING_USER_TTL_MILLIS: i64 = PENDING_USER_TTL_HOURS * 60 * 60 * 1_000;

/// Default per-user hourly request quota for new accounts.
pub const DEFAULT_RATE_LIMIT: u32 = 1_000;

// ============================================================================
// SECTION: Organization
// ============================================================================

/// Tenancy container; every other row references exactly one organization.
///
/// # Invariants
/// - `name` is unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier.
    pub id: OrgId,
    /// Unique organization name.
    pub name: String,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: User
// ============================================================================

/// A member of one organization, carrying per-principal policy settings.
///
/// # Invariants
/// - `email` is unique case-insensitively across the store.
/// - `rate_limit` is at least 1.
/// - A user whose `deactivated_at` is older than
///   [`REACTIVATION_WINDOW_DAYS`] days is ineligible for reactivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Login email (stored as given, compared case-insensitively).
    pub email: String,
    /// Argon2 password hash; absent for OAuth-only accounts.
    pub password_hash: Option<String>,
    /// Optional first name.
    pub first_name: Option<String>,
    /// Optional last name.
    pub last_name: Option<String>,
    /// Deactivation instant; `None` for active accounts.
    pub deactivated_at: Option<Timestamp>,
    /// Hourly request quota enforced by the policy gate.
    pub rate_limit: u32,
    /// Whether the IP allowlist applies to this user's requests.
    pub allow_ip_whitelist: bool,
    /// Whether error notifications should also be mailed to this user.
    pub send_error_alerts: bool,
    /// Optional profile picture reference.
    pub profile_picture: Option<String>,
}

impl User {
    /// Returns true when the account is deactivated.
    #[must_use]
    pub const fn is_deactivated(&self) -> bool {
        self.deactivated_at.is_some()
    }

    /// Returns true when a deactivated account may still be reactivated at
    /// instant `now`.
    #[must_use]
    pub fn reactivation_allowed(&self, now: Timestamp) -> bool {
        match self.deactivated_at {
            Some(deactivated) => now.millis_since(deactivated) <= REACTIVATION_WINDOW_MILLIS,
            None => true,
        }
    }
}

// ============================================================================
// SECTION: Pending User
// ============================================================================

/// A signup awaiting email verification.
///
/// # Invariants
/// - `email` is unique among pending rows.
/// - The row is deleted when verification succeeds (atomically creating the
///   [`User`]) and is rejected once older than [`PENDING_USER_TTL_HOURS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUser {
    /// Signup email (compared case-insensitively).
    pub email: String,
    /// Argon2 hash of the chosen password.
    pub password_hash: String,
    /// Six-digit verification code mailed to the address.
    pub verification_code: String,
    /// Instant the code was last sent; doubles as the TTL anchor.
    pub last_sent_at: Timestamp,
}

impl PendingUser {
    /// Returns true when the verification code has passed its TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.millis_since(self.last_sent_at) > PENDING_USER_TTL_MILLIS
    }
}

// ============================================================================
// SECTION: Principal
// ============================================================================

/// The identity a verified session token resolves to.
///
/// # Invariants
/// - `user_id` belongs to `org_id`; the session layer guarantees the pairing
///   at token issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user.
    pub user_id: UserId,
    /// Organization the user belongs to.
    pub org_id: OrgId,
    /// Email recorded in the session token.
    pub email: String,
}
