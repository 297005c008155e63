// crates/flowgate-bus/tests/bus_unit.rs
// ============================================================================
// Module: Event Bus Unit Tests
// Description: Room fan-out, lag behavior, and the bridge task.
// Purpose: Pin org isolation, drop-oldest backpressure, and bridging.
// ============================================================================

//! ## Overview
//! Covers room isolation between orgs, drop-oldest behavior for lagging
//! subscribers, and the bridge task forwarding store events into rooms.

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

use std::sync::Arc;
use std::time::Duration;

use flowgate_bus::ChannelSource;
use flowgate_bus::RoomRegistry;
use flowgate_bus::run_bridge;
use flowgate_bus::store_event_channel;
use flowgate_core::OrgId;
use flowgate_core::StoreEvent;
use flowgate_core::StoreEventKind;
use flowgate_core::StoreEventSink;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::error::TryRecvError;

// ============================================================================
// SECTION: Rooms
// ============================================================================

#[tokio::test]
async fn events_reach_only_the_matching_room() {
    let rooms = RoomRegistry::new(8);
    let org_a = OrgId::generate();
    let org_b = OrgId::generate();
    let mut sub_a = rooms.subscribe(org_a);
    let mut sub_b = rooms.subscribe(org_b);

    rooms.publish(org_a, StoreEventKind::NotificationsUpdate);
    assert_eq!(sub_a.recv().await.unwrap(), StoreEventKind::NotificationsUpdate);
    assert!(matches!(sub_b.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn every_subscriber_of_a_room_receives_the_event() {
    let rooms = RoomRegistry::new(8);
    let org = OrgId::generate();
    let mut first = rooms.subscribe(org);
    let mut second = rooms.subscribe(org);
    assert_eq!(rooms.subscriber_count(org), 2);

    rooms.publish(org, StoreEventKind::IntegrationsUpdate);
    assert_eq!(first.recv().await.unwrap(), StoreEventKind::IntegrationsUpdate);
    assert_eq!(second.recv().await.unwrap(), StoreEventKind::IntegrationsUpdate);
}

#[tokio::test]
async fn slow_subscribers_lose_oldest_events_without_blocking() {
    let rooms = RoomRegistry::new(2);
    let org = OrgId::generate();
    let mut slow = rooms.subscribe(org);

    // Three sends into a depth-2 room: the first event is dropped.
    rooms.publish(org, StoreEventKind::NotificationsUpdate);
    rooms.publish(org, StoreEventKind::IntegrationsUpdate);
    rooms.publish(org, StoreEventKind::NotificationsUpdate);

    assert!(matches!(slow.recv().await, Err(RecvError::Lagged(1))));
    assert_eq!(slow.recv().await.unwrap(), StoreEventKind::IntegrationsUpdate);
    assert_eq!(slow.recv().await.unwrap(), StoreEventKind::NotificationsUpdate);
}

#[tokio::test]
async fn publishing_without_subscribers_is_a_no_op() {
    let rooms = RoomRegistry::new(4);
    let org = OrgId::generate();
    rooms.publish(org, StoreEventKind::NotificationsUpdate);
    // A later subscriber starts fresh; earlier events are gone.
    let mut sub = rooms.subscribe(org);
    assert!(matches!(sub.try_recv(), Err(TryRecvError::Empty)));
}

// ============================================================================
// SECTION: Bridge
// ============================================================================

#[tokio::test]
async fn bridge_forwards_store_events_into_rooms() {
    let rooms = Arc::new(RoomRegistry::new(8));
    let org = OrgId::generate();
    let mut sub = rooms.subscribe(org);

    let (sink, receiver) = store_event_channel();
    let bridge = tokio::spawn(run_bridge(
        ChannelSource::new(receiver),
        rooms.clone(),
        Duration::from_secs(1),
    ));

    sink.publish(StoreEvent {
        org_id: org,
        kind: StoreEventKind::IntegrationsUpdate,
    });
    assert_eq!(sub.recv().await.unwrap(), StoreEventKind::IntegrationsUpdate);

    // Dropping the sink ends the stream; the exhausted source stops the
    // bridge after one backoff turn.
    drop(sink);
    tokio::time::timeout(Duration::from_secs(5), bridge).await.unwrap().unwrap();
}
