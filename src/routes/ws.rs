//! WebSocket handler: real-time event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection id, registers an outbound queue with
//! the session registry, and enters a `select!` loop:
//! - Incoming client events → parse + dispatch to the chat service
//! - Room events from the registry queue → forward to client
//! - Shutdown flag → close frame, then exit
//!
//! Inbound events are handled one at a time, so a connection's events are
//! applied in the order it sent them. Successful operations publish through
//! the registry; only errors are written straight back to the sender, and
//! an error never closes the connection.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register queue → send `connected` with `connectionId`
//! 2. Client sends events → dispatch → errors go back to the sender only
//! 3. Close, read error, or shutdown → `ConnectionGuard` drops and the
//!    connection leaves every room it joined

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::Response;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{ChatError, ErrorCode};
use crate::event::{ClientEvent, ServerEvent};
use crate::services::registry::{ConnectionGuard, ConnectionId};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let conn = ConnectionId::new();
    let registry = state.chat.registry().clone();

    // Per-connection queue for room events published by the registry.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(state.ws_channel_capacity);
    registry.connect(conn, client_tx);
    let _guard = ConnectionGuard::new(registry, conn);
    let mut shutdown = state.shutdown_signal();

    let welcome = ServerEvent::Connected { connection_id: conn.as_uuid() };
    if send_event(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%conn, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if !reply_all(&mut socket, process_inbound_text(&state, conn, text.as_str()).await).await {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            () = closing(&mut shutdown) => {
                let frame = CloseFrame { code: close_code::AWAY, reason: "server shutting down".into() };
                let _ = socket.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }

    info!(%conn, rooms = state.chat.registry().rooms_of(conn).len(), "ws: client disconnected");
}

/// Resolves once shutdown begins.
async fn closing(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closing| *closing).await;
}

async fn reply_all(socket: &mut WebSocket, events: Vec<ServerEvent>) -> bool {
    for event in &events {
        if send_event(socket, event).await.is_err() {
            return false;
        }
    }
    true
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(event = event.name(), error = %e, "ws: failed to encode event");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return events for the sender.
///
/// Keeps websocket transport concerns separate from event handling, so tests
/// can drive dispatch and room fan-out without a socket.
pub(crate) async fn process_inbound_text(state: &AppState, conn: ConnectionId, text: &str) -> Vec<ServerEvent> {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%conn, error = %e, "ws: invalid inbound event");
            return vec![ServerEvent::error_from(&ChatError::validation(format!("invalid event: {e}")))];
        }
    };

    let name = event.name();
    debug!(%conn, event = name, "ws: recv event");

    let registry = state.chat.registry();
    let result = match event {
        ClientEvent::JoinSession(session_id) => {
            if registry.join(conn, session_id) {
                info!(%conn, %session_id, room_size = registry.members(session_id).len(), "ws: joined session");
            }
            Ok(())
        }
        ClientEvent::LeaveSession(session_id) => {
            if registry.leave(conn, session_id) {
                info!(%conn, %session_id, "ws: left session");
            }
            Ok(())
        }
        ClientEvent::SendMessage(payload) => state.chat.send_message(Some(conn), payload).await.map(drop),
        ClientEvent::Typing(payload) => state.chat.set_typing(Some(conn), payload).await.map(drop),
    };

    match result {
        Ok(()) => Vec::new(),
        Err(e) => {
            warn!(%conn, event = name, code = e.error_code(), error = %e, "ws: event failed");
            vec![ServerEvent::error_from(&e)]
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
