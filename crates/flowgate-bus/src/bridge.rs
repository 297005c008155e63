// crates/flowgate-bus/src/bridge.rs
// ============================================================================
// Module: Store Event Bridge
// Description: Dedicated task moving store events into bus rooms.
// Purpose: Decouple store write paths from subscriber fan-out.
// Dependencies: flowgate-core, tokio, tracing, crate::rooms
// ============================================================================

//! ## Overview
//! The store publishes `{org_id, kind}` events through a [`StoreEventChannel`]
//! sink; the bridge task drains the paired receiver and fans each event out
//! to the matching room. [`run_bridge`] wraps its source in a reconnect loop
//! with bounded backoff: when a stream ends unexpectedly it asks the source
//! for a fresh one, doubling the wait up to the configured cap. While the
//! stream is down, events are missed by design; subscribers re-fetch on
//! reconnect.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use flowgate_core::StoreEvent;
use flowgate_core::StoreEventSink;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

use crate::rooms::RoomRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Initial reconnect backoff.
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

// ============================================================================
// SECTION: Store Event Channel
// ============================================================================

/// Store event sink backed by an unbounded channel.
///
/// # Invariants
/// - `publish` never blocks; events sent after the receiver is dropped are
///   discarded.
pub struct StoreEventChannel {
    /// Sending half handed to the store.
    sender: UnboundedSender<StoreEvent>,
}

impl StoreEventSink for StoreEventChannel {
    fn publish(&self, event: StoreEvent) {
        // send only fails when the bridge is gone; events are best-effort.
        let _ = self.sender.send(event);
    }
}

/// Creates the sink/receiver pair wiring the store to the bridge.
#[must_use]
pub fn store_event_channel() -> (Arc<StoreEventChannel>, UnboundedReceiver<StoreEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        Arc::new(StoreEventChannel {
            sender,
        }),
        receiver,
    )
}

// ============================================================================
// SECTION: Bridge Source
// ============================================================================

/// Source of store event streams for the bridge's reconnect loop.
pub trait BridgeSource: Send + 'static {
    /// Yields the next event stream, or `None` when the source is
    /// permanently exhausted and the bridge should stop.
    fn subscribe(&mut self) -> impl Future<Output = Option<UnboundedReceiver<StoreEvent>>> + Send;
}

/// Bridge source over a single in-process channel.
///
/// # Invariants
/// - Yields its receiver exactly once; a second subscribe ends the bridge.
pub struct ChannelSource {
    /// Receiver handed out on first subscribe.
    receiver: Option<UnboundedReceiver<StoreEvent>>,
}

impl ChannelSource {
    /// Wraps the receiving half created by [`store_event_channel`].
    #[must_use]
    pub const fn new(receiver: UnboundedReceiver<StoreEvent>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }
}

impl BridgeSource for ChannelSource {
    async fn subscribe(&mut self) -> Option<UnboundedReceiver<StoreEvent>> {
        self.receiver.take()
    }
}

// ============================================================================
// SECTION: Bridge Task
// ============================================================================

/// Runs the bridge until its source is exhausted.
///
/// Each drained event is published to the matching org room. When a stream
/// ends, the loop re-subscribes after a backoff that doubles up to
/// `max_backoff`.
pub async fn run_bridge<S: BridgeSource>(
    mut source: S,
    rooms: Arc<RoomRegistry>,
    max_backoff: Duration,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let Some(mut stream) = source.subscribe().await else {
            tracing::info!("store event source exhausted; bridge stopping");
            return;
        };
        backoff = INITIAL_BACKOFF;
        while let Some(event) = stream.recv().await {
            rooms.publish(event.org_id, event.kind);
        }
        let backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(backoff_ms, "store event stream closed");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}
