// crates/flowgate-server/src/state.rs
// ============================================================================
// Module: Application State
// Description: The shared capability bundle handed to every handler.
// Purpose: Replace ambient globals with one explicitly threaded state value.
// Dependencies: flowgate-core, flowgate-engine, flowgate-verify, flowgate-bus
// ============================================================================

//! ## Overview
//! [`AppState`] is constructed once at startup and cloned into the router;
//! every field is an `Arc` capability. Nothing in the platform reads global
//! state: the store, engine, verifier, rooms, vault, mailer, session signer,
//! auditor, OIDC client, and report writer all arrive through here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use flowgate_bus::RoomRegistry;
use flowgate_core::Mailer;
use flowgate_core::SecretVault;
use flowgate_core::Store;
use flowgate_engine::ExecutionRunner;
use flowgate_providers::OutboundHttp;
use flowgate_verify::VerificationWorker;

use crate::audit::Auditor;
use crate::oidc::OidcClient;
use crate::reports::ReportWriter;
use crate::session::SessionSigner;

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared capability bundle for the HTTP surface.
///
/// # Invariants
/// - Cloning is cheap; all fields are reference-counted.
/// - `vault` is `None` when no encryption key is configured; secret writes
///   then fail closed.
#[derive(Clone)]
pub struct AppState {
    /// Durable store capability.
    pub store: Arc<dyn Store>,
    /// Flow execution engine.
    pub runner: Arc<ExecutionRunner>,
    /// Integration verification worker.
    pub verifier: Arc<VerificationWorker>,
    /// Event bus rooms for WebSocket subscribers.
    pub rooms: Arc<RoomRegistry>,
    /// Secret vault, when a key is configured.
    pub vault: Option<Arc<SecretVault>>,
    /// Mail capability.
    pub mailer: Arc<dyn Mailer>,
    /// Session token signer.
    pub sessions: Arc<SessionSigner>,
    /// Audit trail writer.
    pub auditor: Arc<Auditor>,
    /// Google OIDC capability, when configured.
    pub oidc: Option<Arc<dyn OidcClient>>,
    /// Compliance report writer.
    pub reports: Arc<ReportWriter>,
    /// Browser origin OAuth callbacks redirect back to.
    pub frontend_origin: Option<String>,
    /// Policed outbound client backing the sandbox fetch passthrough.
    pub outbound: OutboundHttp,
    /// Deadline for sandbox fetch passthrough calls.
    pub sandbox_fetch_timeout: Duration,
}
