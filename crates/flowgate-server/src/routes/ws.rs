// crates/flowgate-server/src/routes/ws.rs
// ============================================================================
// Module: WebSocket Room Endpoint
// Description: Joins the caller's org room and streams bus events.
// Purpose: Push payload-free update events to connected clients.
// Dependencies: axum, flowgate-bus, flowgate-core, crate::state
// ============================================================================

//! ## Overview
//! One socket per subscriber: the connection joins `org:<uuid>` for the
//! authenticated principal's org and receives each bus event as a JSON text
//! frame `{"event": "notifications:update" | "integrations:update"}`.
//! A lagging consumer loses the oldest events (broadcast semantics); since
//! events carry no payload, the client's next re-read converges anyway.
//! Inbound frames are ignored except for close.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Extension;
use axum::extract::State;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;
use flowgate_core::Principal;
use flowgate_core::StoreEventKind;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// `GET /ws` — upgrade and join the caller's org room.
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| drive_socket(state, principal, socket))
}

/// Streams room events to one socket until either side closes.
async fn drive_socket(state: AppState, principal: Principal, mut socket: WebSocket) {
    let mut events = state.rooms.subscribe(principal.org_id);
    loop {
        // The select only picks what happened; the send runs after both
        // borrowed futures are dropped.
        let outcome = tokio::select! {
            event = events.recv() => match event {
                Ok(kind) => Some(kind),
                // Lagged: older payload-free events were dropped; the next
                // delivered event still triggers a full re-read.
                Err(RecvError::Lagged(_)) => None,
                Err(RecvError::Closed) => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => None,
            },
        };
        if let Some(kind) = outcome
            && send_event(&mut socket, kind).await.is_err()
        {
            break;
        }
    }
}

/// Sends one event frame.
async fn send_event(socket: &mut WebSocket, kind: StoreEventKind) -> Result<(), axum::Error> {
    let frame = json!({ "event": kind.as_event_name() }).to_string();
    socket.send(Message::Text(frame.into())).await
}
