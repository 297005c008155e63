// crates/flowgate-providers/tests/ssrf_guard_unit.rs
// ============================================================================
// Module: SSRF Guard Unit Tests
// Description: Address classification and URL policy behavior.
// Purpose: Pin the blocked ranges and the scheme/host rejections.
// ============================================================================

//! ## Overview
//! Covers the address classifier over every range the platform refuses to
//! call, the pre-resolution URL checks, and the test-only private-host
//! escape hatch.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::IpAddr;

use flowgate_providers::SsrfError;
use flowgate_providers::UrlPolicy;
use flowgate_providers::is_blocked_ip;

// ============================================================================
// SECTION: Address Classification
// ============================================================================

#[test]
fn blocked_ranges_are_rejected() {
    for raw in [
        "127.0.0.1",
        "127.255.255.254",
        "10.0.0.5",
        "10.255.255.255",
        "192.168.1.1",
        "172.16.0.1",
        "172.31.255.255",
        "169.254.169.254",
        "0.0.0.0",
        "::1",
        "::ffff:10.0.0.5",
        "::ffff:127.0.0.1",
        "fd00::1",
    ] {
        let ip: IpAddr = raw.parse().unwrap();
        assert!(is_blocked_ip(ip), "{raw} should be blocked");
    }
}

#[test]
fn public_addresses_are_allowed() {
    for raw in ["93.184.216.34", "8.8.8.8", "172.32.0.1", "2606:2800:220:1::1"] {
        let ip: IpAddr = raw.parse().unwrap();
        assert!(!is_blocked_ip(ip), "{raw} should be allowed");
    }
}

// ============================================================================
// SECTION: URL Policy
// ============================================================================

#[test]
fn strict_policy_rejects_localhost_names() {
    let policy = UrlPolicy::strict();
    assert!(matches!(
        policy.ensure_url_allowed("http://localhost:9000/health"),
        Err(SsrfError::BlockedHost(_))
    ));
    assert!(matches!(
        policy.ensure_url_allowed("https://api.localhost/x"),
        Err(SsrfError::BlockedHost(_))
    ));
    assert!(matches!(
        policy.ensure_url_allowed("http://LOCALHOST./x"),
        Err(SsrfError::BlockedHost(_))
    ));
}

#[test]
fn strict_policy_rejects_literal_private_hosts() {
    let policy = UrlPolicy::strict();
    for url in [
        "http://127.0.0.1/x",
        "http://10.0.0.9/x",
        "http://192.168.0.20/x",
        "http://172.16.3.4/x",
        "http://169.254.1.1/x",
        "http://[::1]/x",
    ] {
        assert!(
            matches!(policy.ensure_url_allowed(url), Err(SsrfError::BlockedHost(_))),
            "{url} should be blocked"
        );
    }
}

#[test]
fn non_http_schemes_are_rejected() {
    let policy = UrlPolicy::strict();
    for url in ["ftp://example.test/x", "file:///etc/passwd", "gopher://example.test"] {
        assert!(
            matches!(policy.ensure_url_allowed(url), Err(SsrfError::UnsupportedScheme(_))),
            "{url} should be rejected"
        );
    }
}

#[test]
fn malformed_urls_are_rejected() {
    let policy = UrlPolicy::strict();
    assert!(matches!(
        policy.ensure_url_allowed("not a url"),
        Err(SsrfError::InvalidUrl(_))
    ));
}

#[test]
fn public_https_urls_pass() {
    let policy = UrlPolicy::strict();
    let url = policy.ensure_url_allowed("https://api.stripe.com/v1/charges?limit=1").unwrap();
    assert_eq!(url.host_str(), Some("api.stripe.com"));
}

#[test]
fn permissive_policy_admits_loopback_for_fixtures() {
    let policy = UrlPolicy::permit_private_hosts();
    assert!(policy.ensure_url_allowed("http://127.0.0.1:8123/ok").is_ok());
}

#[tokio::test]
async fn resolve_and_check_blocks_loopback_literals() {
    let policy = UrlPolicy::strict();
    // Literal private address is rejected before any lookup happens.
    let url = UrlPolicy::permit_private_hosts()
        .ensure_url_allowed("http://127.0.0.1:9/never")
        .unwrap();
    assert!(matches!(
        policy.resolve_and_check(&url).await,
        Err(SsrfError::BlockedHost(_))
    ));
}

#[tokio::test]
async fn resolve_and_check_accepts_loopback_under_permissive_policy() {
    let policy = UrlPolicy::permit_private_hosts();
    let url = policy.ensure_url_allowed("http://127.0.0.1:9/never").unwrap();
    let peers = policy.resolve_and_check(&url).await.unwrap();
    assert_eq!(peers, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
}
