// crates/flowgate-bus/src/rooms.rs
// ============================================================================
// Module: Bus Rooms
// Description: Per-org broadcast rooms with drop-oldest backpressure.
// Purpose: Deliver events to every subscriber of an org without blocking.
// Dependencies: flowgate-core, tokio
// ============================================================================

//! ## Overview
//! One broadcast channel per organization, created lazily on first publish
//! or subscribe. Channel capacity is the configured queue depth: when a
//! subscriber falls behind, the broadcast channel drops its oldest buffered
//! events (surfacing as a lag notice on receive) rather than blocking the
//! publisher. Publishing takes one short registry lock and never suspends,
//! so the upstream store listener is never held up by a slow room.
//!
//! Lock discipline: the registry lock is the only lock in this crate and no
//! I/O happens while it is held.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use flowgate_core::OrgId;
use flowgate_core::StoreEventKind;
use tokio::sync::broadcast;

// ============================================================================
// SECTION: Room Registry
// ============================================================================

/// Registry of per-org broadcast rooms.
///
/// # Invariants
/// - Every room's channel capacity equals the registry queue depth.
/// - Rooms are never removed; an org's channel lives for the process.
pub struct RoomRegistry {
    /// Per-subscriber queue depth before the oldest event is dropped.
    queue_depth: usize,
    /// Lazily created rooms keyed by org.
    rooms: Mutex<HashMap<OrgId, broadcast::Sender<StoreEventKind>>>,
}

impl RoomRegistry {
    /// Creates a registry with the given per-subscriber queue depth.
    #[must_use]
    pub fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth: queue_depth.max(1),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Joins the org's room, creating it when absent.
    pub fn subscribe(&self, org_id: OrgId) -> broadcast::Receiver<StoreEventKind> {
        self.sender_for(org_id).subscribe()
    }

    /// Publishes an event to the org's room. Delivery is best-effort: with
    /// no subscribers the event is dropped.
    pub fn publish(&self, org_id: OrgId, kind: StoreEventKind) {
        // send only fails when no receiver exists, which is fine.
        let _ = self.sender_for(org_id).send(kind);
    }

    /// Returns the current subscriber count for an org's room.
    #[must_use]
    pub fn subscriber_count(&self, org_id: OrgId) -> usize {
        match self.rooms.lock() {
            Ok(rooms) => rooms.get(&org_id).map_or(0, broadcast::Sender::receiver_count),
            Err(_) => 0,
        }
    }

    /// Returns the org's sender, creating the room when absent.
    fn sender_for(&self, org_id: OrgId) -> broadcast::Sender<StoreEventKind> {
        match self.rooms.lock() {
            Ok(mut rooms) => rooms
                .entry(org_id)
                .or_insert_with(|| broadcast::channel(self.queue_depth).0)
                .clone(),
            // recover the map on poisoning
            Err(poisoned) => poisoned
                .into_inner()
                .entry(org_id)
                .or_insert_with(|| broadcast::channel(self.queue_depth).0)
                .clone(),
        }
    }
}
