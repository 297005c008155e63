// crates/flowgate-providers/tests/outbound_http_unit.rs
// ============================================================================
// Module: Outbound HTTP Unit Tests
// Description: Redirect handling and guard enforcement on the shared client.
// Purpose: Pin that redirects surface as data and never get followed.
// ============================================================================

//! ## Overview
//! Covers the outbound client against local fixtures: a `3xx` pointing at a
//! blocked address comes back as data with the `Location` header intact and
//! no second request leaves the process; guard rejections happen before any
//! connection; protocol statuses of every class surface as data.

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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use flowgate_providers::OutboundError;
use flowgate_providers::OutboundHttp;
use flowgate_providers::SsrfError;
use flowgate_providers::UrlPolicy;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Client admitting loopback fixtures.
fn client() -> OutboundHttp {
    OutboundHttp::new(UrlPolicy::permit_private_hosts()).unwrap()
}

/// Serves up to `max_requests` responses built by `respond`, counting what
/// actually arrived.
fn counting_server(
    max_requests: usize,
    respond: impl Fn() -> Response<std::io::Cursor<Vec<u8>>> + Send + 'static,
) -> (String, Arc<AtomicUsize>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}/start");
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let handle = thread::spawn(move || {
        for _ in 0..max_requests {
            let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(2)) else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = request.respond(respond());
        }
    });
    (url, seen, handle)
}

// ============================================================================
// SECTION: Redirects
// ============================================================================

#[tokio::test]
async fn redirects_surface_as_data_and_are_never_followed() {
    let (url, seen, handle) = counting_server(2, || {
        let response = Response::from_string("").with_status_code(302);
        match "Location: http://169.254.169.254/latest/meta-data/".parse::<Header>() {
            Ok(header) => response.with_header(header),
            Err(()) => response,
        }
    });
    let response = client()
        .get(&url, &BTreeMap::new(), Duration::from_secs(2))
        .await
        .unwrap();
    handle.join().unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(
        response.headers.get("location").map(String::as_str),
        Some("http://169.254.169.254/latest/meta-data/")
    );
    // Exactly one request left the process; the Location was not chased.
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

// ============================================================================
// SECTION: Guard Enforcement
// ============================================================================

#[tokio::test]
async fn strict_policy_rejects_before_any_connection() {
    let strict = OutboundHttp::new(UrlPolicy::strict()).unwrap();
    let result = strict
        .get(
            "http://169.254.169.254/latest/meta-data/",
            &BTreeMap::new(),
            Duration::from_secs(2),
        )
        .await;
    assert!(matches!(
        result,
        Err(OutboundError::Policy(SsrfError::BlockedHost(_)))
    ));
}

#[tokio::test]
async fn every_status_class_comes_back_as_data() {
    for status in [204_u16, 404, 503] {
        let (url, _seen, handle) = counting_server(1, move || {
            Response::from_string("{}").with_status_code(status)
        });
        let response = client()
            .get(&url, &BTreeMap::new(), Duration::from_secs(2))
            .await
            .unwrap();
        handle.join().unwrap();
        assert_eq!(response.status, status);
    }
}
