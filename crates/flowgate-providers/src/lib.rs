// crates/flowgate-providers/src/lib.rs
// ============================================================================
// Module: Flowgate Providers
// Description: Provider clients, SSRF guard, and outbound HTTP plumbing.
// Purpose: Give the engine and workers one policed path to external services.
// Dependencies: flowgate-core, reqwest, url, tokio, serde_json
// ============================================================================

//! ## Overview
//! Every outbound request the platform makes goes through this crate: the
//! engine's HTTP action, the verification worker's probes, and the MTN MoMo
//! and Flutterwave operations. The [`ssrf`] module is the single SSRF guard
//! (checked before DNS resolution and against resolved peers); [`http`]
//! wraps the shared client with per-call timeouts and splits transport
//! failures from protocol responses; [`registry`] routes dotted provider
//! operations and appends a tx event per provider call.
//!
//! Security posture: URLs and provider responses are untrusted input; the
//! guard fails closed and response bodies are bounded.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod flutterwave;
pub mod http;
pub mod mtn;
pub mod registry;
pub mod ssrf;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use flutterwave::FlutterwaveClient;
pub use flutterwave::FlutterwaveCredentials;
pub use http::HttpResponseData;
pub use http::OutboundError;
pub use http::OutboundHttp;
pub use mtn::MtnClient;
pub use mtn::MtnCredentials;
pub use registry::NoopTxRecorder;
pub use registry::ProviderError;
pub use registry::ProviderRegistry;
pub use registry::StoreTxRecorder;
pub use registry::TxRecorder;
pub use ssrf::SsrfError;
pub use ssrf::UrlPolicy;
pub use ssrf::is_blocked_ip;
