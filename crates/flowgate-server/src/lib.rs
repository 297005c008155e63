// crates/flowgate-server/src/lib.rs
// ============================================================================
// Module: Flowgate Server
// Description: The HTTP/WebSocket surface and the principal & policy gate.
// Purpose: Admit, police, and route every client request.
// Dependencies: axum, flowgate-core, flowgate-engine, flowgate-verify,
//               flowgate-bus, jsonwebtoken, argon2
// ============================================================================

//! ## Overview
//! The server crate assembles the public surface: session issuance and
//! verification (JWT cookies, with a development fallback cookie for plain
//! HTTP), the policy gate that resolves the principal and enforces the IP
//! allowlist and the hourly rate quota, the JSON routes for auth, flows,
//! executions, integrations, notifications and the allowlist, the WebSocket
//! room endpoint, the audit trail, the mail capability wiring, and the
//! compliance report writer.
//!
//! Request context (request id, principal, client IP) threads through axum
//! extensions set by the gate; no ambient storage exists.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod error;
pub mod extract;
pub mod gate;
pub mod mail;
pub mod oidc;
pub mod password;
pub mod reports;
pub mod router;
pub mod routes;
pub mod session;
pub mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::HttpError;
pub use router::build_router;
pub use session::SessionSigner;
pub use session::SessionVariant;
pub use state::AppState;
