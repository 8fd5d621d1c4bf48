//! WebSocket route handler.
//!
//! Handles WebSocket upgrade, message loop, and cleanup.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{
    connection::{ConnectionId, ConnectionManager},
    messages::{msg_types, system, ClientMessage, ServerMessage},
};
use crate::print_queue::JobStore;
use crate::server::state::{GuardedConnectionManager, GuardedJobStore};

struct WsState {
    connection_manager: Arc<ConnectionManager>,
    store: Arc<JobStore>,
}

/// Route handler for `GET /ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(connection_manager): State<GuardedConnectionManager>,
    State(store): State<GuardedJobStore>,
) -> Response {
    let state = Arc::new(WsState {
        connection_manager,
        store,
    });
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (conn_id, outgoing_rx) = state.connection_manager.register();
    debug!("WebSocket connected: {}", conn_id);

    let (ws_sink, ws_stream) = socket.split();

    let greeting = vec![
        ServerMessage::new(
            msg_types::CONNECTED,
            system::Connected {
                agent_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        ),
        ServerMessage::queue_update(&state.store.list()),
    ];

    let outgoing_handle = tokio::spawn(forward_outgoing(ws_sink, outgoing_rx, greeting));

    process_incoming(ws_stream, conn_id, &state).await;

    debug!("WebSocket disconnected: {}", conn_id);
    outgoing_handle.abort();
    state.connection_manager.unregister(conn_id);
}

async fn send_json(
    ws_sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws_sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize WebSocket message: {}", e);
            true
        }
    }
}

/// Forward messages from the outgoing channel to the WebSocket.
async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
    initial: Vec<ServerMessage>,
) {
    for msg in &initial {
        if !send_json(&mut ws_sink, msg).await {
            return;
        }
    }

    while let Some(msg) = outgoing_rx.recv().await {
        if !send_json(&mut ws_sink, &msg).await {
            break;
        }
    }
}

async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    conn_id: ConnectionId,
    state: &WsState,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(conn_id, msg, state),
                Err(e) => {
                    debug!("Failed to parse client message: {}", e);
                    let error_msg = ServerMessage::new(
                        msg_types::ERROR,
                        system::Error::new("parse_error", format!("Invalid message format: {}", e)),
                    );
                    let _ = state.connection_manager.send_to(conn_id, error_msg);
                }
            },
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            // Pings are answered by axum
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }
}

fn handle_client_message(conn_id: ConnectionId, msg: ClientMessage, state: &WsState) {
    let reply = match msg.msg_type.as_str() {
        msg_types::PING => ServerMessage::empty(msg_types::PONG),
        msg_types::REFRESH => ServerMessage::queue_update(&state.store.list()),
        other => {
            debug!("Unknown message type: {}", other);
            ServerMessage::new(
                msg_types::ERROR,
                system::Error::new("unknown_type", format!("Unknown message type: {}", other)),
            )
        }
    };
    let _ = state.connection_manager.send_to(conn_id, reply);
}
