// crates/flowgate-core/src/core/identifiers.rs
// ============================================================================
// Module: Flowgate Identifiers
// Description: Canonical opaque identifiers for tenancy, flows, and executions.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Flowgate.
//! Row identifiers are UUIDs and serialize as their hyphenated string form;
//! [`NodeId`] is the author-chosen node label unique within one graph and
//! serializes as an opaque string. Construction never fails; parsing returns
//! `None` on malformed input so callers decide how to surface the error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Row Identifiers
// ============================================================================

/// Declares a UUID-backed identifier newtype with the shared constructor,
/// parser, and display discipline.
macro_rules! uuid_identifier {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// # Invariants
        /// - Wire form is the hyphenated UUID string.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a fresh random (v4) identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Parses the hyphenated string form (returns `None` when malformed).
            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                Uuid::parse_str(raw).ok().map(Self)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_identifier!(
    /// Organization identifier; the tenancy boundary for every other row.
    OrgId
);
uuid_identifier!(
    /// User identifier scoped to one organization.
    UserId
);
uuid_identifier!(
    /// Flow identifier; a named, org-scoped DAG definition.
    FlowId
);
uuid_identifier!(
    /// Flow version identifier; one immutable graph snapshot.
    FlowVersionId
);
uuid_identifier!(
    /// Flow execution identifier; one runtime instance of a version.
    ExecutionId
);
uuid_identifier!(
    /// Execution step identifier; the per-node runtime record.
    StepId
);
uuid_identifier!(
    /// Execution log line identifier.
    LogId
);
uuid_identifier!(
    /// Integration identifier; an org's declared external dependency.
    IntegrationId
);
uuid_identifier!(
    /// Connection identifier; an encrypted provider credential blob.
    ConnectionId
);
uuid_identifier!(
    /// Notification identifier; one user-visible event row.
    NotificationId
);
uuid_identifier!(
    /// Request identifier attached to audit records and logs.
    RequestId
);

// ============================================================================
// SECTION: Node Identifier
// ============================================================================

/// Graph node identifier, unique within a single graph.
///
/// # Invariants
/// - Opaque UTF-8 string chosen by the graph author; no normalization is
///   applied by this type. Uniqueness is enforced at graph validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a new node identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
