// crates/flowgate-providers/src/ssrf.rs
// ============================================================================
// Module: SSRF Guard
// Description: Outbound URL policy shared by every caller.
// Purpose: Keep platform-originated requests off internal networks.
// Dependencies: url, tokio
// ============================================================================

//! ## Overview
//! The single SSRF guard for the platform. [`UrlPolicy::ensure_url_allowed`]
//! runs before DNS resolution: scheme must be http/https and the host must
//! not be a literal loopback, RFC1918, link-local, or `localhost` name.
//! [`UrlPolicy::resolve_and_check`] applies the same address policy to every
//! resolved peer, covering hosts that resolve into forbidden ranges. Both
//! the engine's HTTP action and the verification worker call this guard; no
//! other URL policy exists. `allow_private_hosts` exists for test fixtures
//! bound to loopback and is never enabled in production wiring.
//!
//! Security posture: fail closed. A URL that cannot be parsed, resolved, or
//! classified is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use thiserror::Error;
use tokio::net::lookup_host;
use url::Host;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// URL policy violations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SsrfError {
    /// The URL failed to parse.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The URL scheme is not http or https.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("url host required")]
    MissingHost,
    /// The host names a reserved or private address.
    #[error("url host is reserved or private: {0}")]
    BlockedHost(String),
    /// Host resolution failed or returned no addresses.
    #[error("url host did not resolve: {0}")]
    Unresolvable(String),
}

// ============================================================================
// SECTION: Address Classification
// ============================================================================

/// Returns true when the address falls in a range the platform never calls:
/// loopback (`127.0.0.0/8`, `::1`), RFC1918 (`10/8`, `172.16/12`,
/// `192.168/16`), link-local (`169.254/16`), or unspecified. IPv6-mapped
/// IPv4 addresses are unwrapped before classification.
#[must_use]
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_loopback()
                || addr.is_private()
                || addr.is_link_local()
                || addr.is_unspecified()
        }
        IpAddr::V6(addr) => {
            if let Some(mapped) = addr.to_ipv4_mapped() {
                return is_blocked_ip(IpAddr::V4(mapped));
            }
            addr.is_loopback() || addr.is_unspecified() || addr.is_unique_local()
        }
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Outbound URL policy applied before and after DNS resolution.
///
/// # Invariants
/// - `allow_private_hosts = false` blocks every address class listed on
///   [`is_blocked_ip`] plus the `localhost` name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlPolicy {
    /// Permit loopback/private targets; test fixtures only.
    pub allow_private_hosts: bool,
}

impl UrlPolicy {
    /// The production policy: private targets blocked.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            allow_private_hosts: false,
        }
    }

    /// A policy admitting loopback targets; used by tests against local
    /// fixtures.
    #[must_use]
    pub const fn permit_private_hosts() -> Self {
        Self {
            allow_private_hosts: true,
        }
    }

    /// Validates a URL before DNS resolution.
    ///
    /// # Errors
    ///
    /// Returns [`SsrfError`] when the URL is malformed, uses a non-HTTP
    /// scheme, lacks a host, or names a blocked literal host.
    pub fn ensure_url_allowed(&self, raw: &str) -> Result<Url, SsrfError> {
        let url = Url::parse(raw.trim()).map_err(|err| SsrfError::InvalidUrl(err.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(SsrfError::UnsupportedScheme(other.to_string())),
        }
        match url.host() {
            None => return Err(SsrfError::MissingHost),
            Some(Host::Domain(domain)) => {
                let lowered = domain.trim_end_matches('.').to_ascii_lowercase();
                if !self.allow_private_hosts
                    && (lowered == "localhost" || lowered.ends_with(".localhost"))
                {
                    return Err(SsrfError::BlockedHost(lowered));
                }
            }
            Some(Host::Ipv4(addr)) => {
                if !self.allow_private_hosts && is_blocked_ip(IpAddr::V4(addr)) {
                    return Err(SsrfError::BlockedHost(addr.to_string()));
                }
            }
            Some(Host::Ipv6(addr)) => {
                if !self.allow_private_hosts && is_blocked_ip(IpAddr::V6(addr)) {
                    return Err(SsrfError::BlockedHost(addr.to_string()));
                }
            }
        }
        Ok(url)
    }

    /// Resolves the URL host and applies the address policy to every peer.
    /// Returns the peer set.
    ///
    /// # Errors
    ///
    /// Returns [`SsrfError`] when resolution fails, yields no addresses, or
    /// any resolved peer is blocked.
    pub async fn resolve_and_check(&self, url: &Url) -> Result<Vec<IpAddr>, SsrfError> {
        let host = url.host_str().ok_or(SsrfError::MissingHost)?;
        let host =
            host.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(host);
        let port = url.port_or_known_default().unwrap_or(443);
        if let Ok(literal) = host.parse::<IpAddr>() {
            if !self.allow_private_hosts && is_blocked_ip(literal) {
                return Err(SsrfError::BlockedHost(literal.to_string()));
            }
            return Ok(vec![literal]);
        }
        let peers: Vec<IpAddr> = lookup_host((host, port))
            .await
            .map_err(|err| SsrfError::Unresolvable(err.to_string()))?
            .map(|addr| addr.ip())
            .collect();
        if peers.is_empty() {
            return Err(SsrfError::Unresolvable(host.to_string()));
        }
        if !self.allow_private_hosts {
            for peer in &peers {
                if is_blocked_ip(*peer) {
                    return Err(SsrfError::BlockedHost(format!("{host} -> {peer}")));
                }
            }
        }
        Ok(peers)
    }
}
