// crates/flowgate-server/src/extract.rs
// ============================================================================
// Module: Request Context Extraction
// Description: Client IP derivation and per-request context values.
// Purpose: Give the gate and audit trail consistent request metadata.
// Dependencies: axum, flowgate-core
// ============================================================================

//! ## Overview
//! The client IP derives from the first `X-Forwarded-For` hop, then
//! `X-Real-IP`, then the socket peer; IPv6-mapped IPv4 addresses normalize
//! to dotted-quad so allowlist entries written either way match. The gate
//! attaches a [`RequestContext`] (request id plus derived IP) and the
//! verified [`Principal`](flowgate_core::Principal) to request extensions;
//! handlers read them from there.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::SocketAddr;

use axum::http::HeaderMap;
use flowgate_core::RequestId;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request metadata attached by the gate.
///
/// # Invariants
/// - `request_id` is unique per admitted request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request identifier propagated into audit rows.
    pub request_id: RequestId,
    /// Derived client IP, when resolvable.
    pub client_ip: Option<String>,
    /// Client user agent, when sent.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Builds the context from request headers and the socket peer.
    #[must_use]
    pub fn derive(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self {
            request_id: RequestId::generate(),
            client_ip: client_ip(headers, peer),
            user_agent: headers
                .get("user-agent")
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string),
        }
    }
}

// ============================================================================
// SECTION: Client IP
// ============================================================================

/// Derives the client IP: first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the socket peer. IPv6-mapped IPv4 normalizes to dotted-quad.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first_hop = forwarded.split(',').next().map(str::trim).unwrap_or_default();
        if let Some(normalized) = normalize_ip(first_hop) {
            return Some(normalized);
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok())
        && let Some(normalized) = normalize_ip(real_ip.trim())
    {
        return Some(normalized);
    }
    peer.map(|addr| normalize_addr(addr.ip()))
}

/// Parses and normalizes a textual IP; `None` on malformed input.
fn normalize_ip(raw: &str) -> Option<String> {
    raw.parse::<IpAddr>().ok().map(normalize_addr)
}

/// Renders an address, unwrapping IPv6-mapped IPv4.
fn normalize_addr(addr: IpAddr) -> String {
    match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or_else(|| v6.to_string(), |mapped| mapped.to_string()),
        IpAddr::V4(v4) => v4.to_string(),
    }
}
