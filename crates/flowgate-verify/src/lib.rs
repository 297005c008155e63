// crates/flowgate-verify/src/lib.rs
// ============================================================================
// Module: Flowgate Verify
// Description: Asynchronous integration verification with deferred probes.
// Purpose: Flip integration health with timely, user-visible transitions.
// Dependencies: flowgate-core, flowgate-providers, tokio, tracing
// ============================================================================

//! ## Overview
//! The verification worker isolates provider flakiness from the API caller:
//! the endpoint returns as soon as the integration is marked `pending`, a
//! short deferral lets subscribers observe that state, and the probe then
//! settles the row to `active` or `error` with a notification either way.
//! Every status write broadcasts `integrations:update` through the store
//! event hook. The startup self-check re-verifies integrations whose
//! provider credentials live in the process environment, so a deploy that
//! drops credentials cannot leave stale `active` rows behind.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use worker::StartupCredentials;
pub use worker::VerificationRequest;
pub use worker::VerificationWorker;
pub use worker::VerifySettings;
