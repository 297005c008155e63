// crates/flowgate-server/src/audit.rs
// ============================================================================
// Module: Audit Trail
// Description: Append-only audit records for state-changing calls.
// Purpose: Record who did what, from where, with what outcome.
// Dependencies: flowgate-core, tracing
// ============================================================================

//! ## Overview
//! Every authenticated state-changing handler appends one audit row naming
//! the action, target, route, client metadata, and response status. Audit
//! writes are best-effort: an insert failure is logged through `tracing`
//! and never surfaced to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use flowgate_core::AuditRecord;
use flowgate_core::Principal;
use flowgate_core::Store;
use flowgate_core::Timestamp;
use serde_json::Value;

use crate::extract::RequestContext;

// ============================================================================
// SECTION: Auditor
// ============================================================================

/// One audited action, built by the owning handler.
///
/// # Invariants
/// - `action` is a stable dotted label (`flow.create`, `integration.verify`).
#[derive(Debug)]
pub struct AuditEvent<'a> {
    /// Stable action label.
    pub action: &'a str,
    /// Target entity type, when any.
    pub target_type: Option<&'a str>,
    /// Target entity id rendered as a string, when any.
    pub target_id: Option<String>,
    /// Route template serving the request.
    pub route: &'a str,
    /// HTTP method.
    pub method: &'a str,
    /// Response status code.
    pub status_code: u16,
    /// Optional structured context.
    pub metadata: Option<Value>,
}

/// Best-effort audit trail writer.
pub struct Auditor {
    /// Durable store capability.
    store: Arc<dyn Store>,
}

impl Auditor {
    /// Creates an auditor.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
        }
    }

    /// Appends one audit row. Failures are logged, never raised.
    pub fn record(
        &self,
        principal: Option<&Principal>,
        context: &RequestContext,
        event: AuditEvent<'_>,
    ) {
        let record = AuditRecord {
            user_id: principal.map(|p| p.user_id),
            action: event.action.to_string(),
            target_type: event.target_type.map(ToString::to_string),
            target_id: event.target_id,
            route: Some(event.route.to_string()),
            method: Some(event.method.to_string()),
            ip: context.client_ip.clone(),
            user_agent: context.user_agent.clone(),
            status_code: Some(event.status_code),
            request_id: Some(context.request_id),
            metadata: event.metadata,
            created_at: Timestamp::now(),
        };
        if let Err(err) = self.store.append_audit(&record) {
            tracing::warn!(action = %record.action, error = %err, "audit append failed");
        }
    }
}
