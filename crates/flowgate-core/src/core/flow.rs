// crates/flowgate-core/src/core/flow.rs
// ============================================================================
// Module: Flowgate Flow Model
// Description: Flow definitions and their immutable version snapshots.
// Purpose: Capture the template side of the platform: named DAGs and versions.
// Dependencies: crate::core::{graph, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Flow`] is an org-scoped named definition; a [`FlowVersion`] is one
//! immutable snapshot of its graph plus editor variables. Versions form a
//! gap-free sequence starting at 1; the store enforces `max(version) + 1` at
//! insert time. Deleting a flow is always a soft delete so execution history
//! stays resolvable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::graph::FlowGraph;
use crate::core::identifiers::FlowId;
use crate::core::identifiers::FlowVersionId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Flow Status
// ============================================================================

/// Flow lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Being edited; never executed automatically.
    Draft,
    /// Deployed; transitioning into this state starts a deploy execution.
    Active,
    /// Parked; kept but not executing.
    Inactive,
}

impl FlowStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parses a stable wire label (returns `None` when unknown).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Flow
// ============================================================================

/// An org-scoped named DAG definition; the template side of the platform.
///
/// # Invariants
/// - `(org_id, lowercase(name))` is unique among non-deleted flows.
/// - `is_deleted` rows never appear in org-scoped listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Flow identifier.
    pub id: FlowId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Display name, unique per org case-insensitively.
    pub name: String,
    /// Lifecycle status.
    pub status: FlowStatus,
    /// Soft-delete marker.
    pub is_deleted: bool,
    /// User who created the flow.
    pub created_by: UserId,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Last modification instant.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Flow Version
// ============================================================================

/// One immutable snapshot of a flow's graph.
///
/// # Invariants
/// - `(flow_id, version)` is unique; versions are gap-free from 1.
/// - `graph` passed [`FlowGraph::validate`](crate::core::graph::FlowGraph::validate)
///   at insert time and is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVersion {
    /// Version row identifier.
    pub id: FlowVersionId,
    /// Flow this snapshot belongs to.
    pub flow_id: FlowId,
    /// 1-based sequence number.
    pub version: u32,
    /// The validated graph snapshot.
    pub graph: FlowGraph,
    /// Editor-defined variables carried alongside the graph.
    pub variables: Value,
    /// Creation instant.
    pub created_at: Timestamp,
}
