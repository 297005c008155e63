// crates/flowgate-providers/src/http.rs
// ============================================================================
// Module: Outbound HTTP
// Description: Policed outbound HTTP with per-call timeouts and bounded bodies.
// Purpose: Split transport failures from protocol responses for all callers.
// Dependencies: reqwest, serde_json, crate::ssrf
// ============================================================================

//! ## Overview
//! One shared async client serves every outbound call. Each request passes
//! the SSRF guard (syntactic check, then resolved-peer check), carries its
//! own timeout, and reads at most [`MAX_RESPONSE_BYTES`] of body. Redirects
//! are never followed: a `3xx` comes back as data like any other status, so
//! an allowed host cannot bounce the platform onto a blocked address. For
//! domain hosts the connection is pinned to the peer the guard vetted, so
//! the address that was checked is the address that is dialed. Transport
//! failures surface as [`OutboundError::Timeout`] or
//! [`OutboundError::Network`]; any HTTP status comes back as data in
//! [`HttpResponseData`] so callers can treat protocol errors as branchable
//! payloads.
//!
//! Security posture: response bodies are untrusted and bounded; oversized
//! bodies fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Client;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::ssrf::SsrfError;
use crate::ssrf::UrlPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard upper bound on response bodies.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// User agent for platform-originated requests.
const USER_AGENT: &str = "flowgate/0.1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport-level outbound failures. Protocol responses are never errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum OutboundError {
    /// The request exceeded its deadline.
    #[error("outbound call timed out: {0}")]
    Timeout(String),
    /// The peer was unreachable or the connection failed.
    #[error("outbound call failed: {0}")]
    Network(String),
    /// The URL was rejected by the SSRF guard.
    #[error(transparent)]
    Policy(#[from] SsrfError),
    /// The request could not be constructed.
    #[error("outbound request invalid: {0}")]
    InvalidRequest(String),
    /// The response body exceeded the size bound.
    #[error("outbound response exceeds {MAX_RESPONSE_BYTES} bytes")]
    OversizedBody,
}

// ============================================================================
// SECTION: Response Data
// ============================================================================

/// A protocol response, whatever its status.
///
/// # Invariants
/// - `body` is parsed JSON when the payload is JSON, otherwise the raw text
///   as a JSON string.
/// - Redirect statuses appear here untouched; nothing was followed.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponseData {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (last value wins on duplicates).
    pub headers: BTreeMap<String, String>,
    /// Parsed response body.
    pub body: Value,
}

impl HttpResponseData {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Shared outbound HTTP client with per-call timeouts.
///
/// # Invariants
/// - Every request passes the configured [`UrlPolicy`] before leaving the
///   process.
/// - Redirects are never followed.
/// - Domain hosts connect to a peer the guard vetted (DNS pinning).
#[derive(Debug, Clone)]
pub struct OutboundHttp {
    /// Client used for IP-literal hosts (no pinning needed).
    client: Client,
    /// URL policy applied to every call.
    policy: UrlPolicy,
}

impl OutboundHttp {
    /// Creates the shared client.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::Network`] when the TLS-backed client cannot
    /// be constructed.
    pub fn new(policy: UrlPolicy) -> Result<Self, OutboundError> {
        Ok(Self {
            client: build_client(None)?,
            policy,
        })
    }

    /// Returns the policy this client enforces.
    #[must_use]
    pub const fn policy(&self) -> UrlPolicy {
        self.policy
    }

    /// Executes one request and returns the protocol response.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] on policy rejection, malformed method,
    /// timeout, connection failure, or an oversized body.
    pub async fn execute(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<HttpResponseData, OutboundError> {
        let (url, client) = self.vetted_client(url).await?;
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| OutboundError::InvalidRequest(format!("bad method: {method}")))?;
        let mut request = client.request(method, url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        read_response(request).await
    }

    /// POST with a form-encoded body (token-exchange endpoints).
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] as [`OutboundHttp::execute`] does.
    pub async fn post_form(
        &self,
        url: &str,
        form: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<HttpResponseData, OutboundError> {
        let (url, client) = self.vetted_client(url).await?;
        read_response(client.post(url).timeout(timeout).form(form)).await
    }

    /// Convenience GET with headers only.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] as [`OutboundHttp::execute`] does.
    pub async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<HttpResponseData, OutboundError> {
        self.execute("GET", url, headers, None, timeout).await
    }

    /// Runs both guard stages and returns the client to dial with: the
    /// shared client for IP-literal hosts, a client pinned to the vetted
    /// peer for domain hosts.
    async fn vetted_client(&self, url: &str) -> Result<(Url, Client), OutboundError> {
        let url = self.policy.ensure_url_allowed(url)?;
        let peers = self.policy.resolve_and_check(&url).await?;
        let host = url.host_str().ok_or(SsrfError::MissingHost)?;
        let host =
            host.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(host);
        if host.parse::<IpAddr>().is_ok() {
            return Ok((url, self.client.clone()));
        }
        let Some(peer) = peers.first().copied() else {
            return Err(SsrfError::Unresolvable(host.to_string()).into());
        };
        let port = url.port_or_known_default().unwrap_or(443);
        let pinned = build_client(Some((host, SocketAddr::new(peer, port))))?;
        Ok((url, pinned))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a client with redirects disabled and an optional DNS pin.
fn build_client(resolve: Option<(&str, SocketAddr)>) -> Result<Client, OutboundError> {
    let mut builder = Client::builder().user_agent(USER_AGENT).redirect(Policy::none());
    if let Some((host, socket_addr)) = resolve {
        builder = builder.resolve(host, socket_addr);
    }
    builder.build().map_err(|err| OutboundError::Network(err.to_string()))
}

/// Sends a prepared request and reads the bounded protocol response.
async fn read_response(request: RequestBuilder) -> Result<HttpResponseData, OutboundError> {
    let response = request.send().await.map_err(classify_transport_error)?;
    let status = response.status().as_u16();
    let mut header_map = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(text) = value.to_str() {
            header_map.insert(name.as_str().to_string(), text.to_string());
        }
    }
    let bytes = response.bytes().await.map_err(classify_transport_error)?;
    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(OutboundError::OversizedBody);
    }
    Ok(HttpResponseData {
        status,
        headers: header_map,
        body: parse_body(&bytes),
    })
}

/// Splits reqwest transport errors into timeout and network kinds.
fn classify_transport_error(err: reqwest::Error) -> OutboundError {
    if err.is_timeout() {
        OutboundError::Timeout(err.to_string())
    } else {
        OutboundError::Network(err.to_string())
    }
}

/// Parses a body as JSON, falling back to a JSON string of the raw text.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
