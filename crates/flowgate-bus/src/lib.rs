// crates/flowgate-bus/src/lib.rs
// ============================================================================
// Module: Flowgate Event Bus
// Description: Org-scoped rooms and the store-event bridge task.
// Purpose: Fan store change events out to connected subscribers.
// Dependencies: flowgate-core, tokio, tracing
// ============================================================================

//! ## Overview
//! Subscribers join rooms keyed by organization and receive the two
//! payload-free event kinds (`notifications:update`, `integrations:update`);
//! on receipt they re-read the relevant collection. Rooms are broadcast
//! channels sized to the configured queue depth: a slow consumer lags and
//! loses the oldest events without ever blocking the publisher or other
//! rooms. The bridge module owns the dedicated task that moves store events
//! into rooms, with a bounded-backoff reconnect loop around its source.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bridge;
pub mod rooms;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bridge::BridgeSource;
pub use bridge::ChannelSource;
pub use bridge::StoreEventChannel;
pub use bridge::run_bridge;
pub use bridge::store_event_channel;
pub use rooms::RoomRegistry;
