use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use crate::rating::{Ack, ClientConnection, ClientMessage, RatingServer};

/// Per-socket loop: assign an opaque connection id, pump outbound frames
/// through a dedicated task, dispatch inbound requests, and reconcile room
/// state when the socket goes away.
pub async fn handle_websocket(websocket: WebSocket, server: Arc<RatingServer>) {
    // The id is the connection's identity for its whole lifetime; it also
    // acts as the creator capability, so it is never taken from the client.
    let conn_id = Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "New WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    server
        .register_connection(ClientConnection::new(conn_id.clone(), tx))
        .await;

    // Spawn task to send messages to the client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => handle_client_message(&server, &conn_id, message).await,
            Err(e) => {
                tracing::error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Reconcile rooms before the connection entry disappears so survivors
    // still get their updates.
    server.handle_disconnect(&conn_id).await;
    server.unregister_connection(&conn_id).await;
    sender_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket connection closed");
}

async fn handle_client_message(server: &Arc<RatingServer>, conn_id: &str, message: Message) {
    if let Ok(text) = message.to_str() {
        tracing::debug!(conn_id = %conn_id, raw = %text, "Received client message");

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(client_message) => {
                server.dispatch(conn_id, client_message).await;
            }
            Err(e) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    error = %e,
                    raw_message = %text,
                    "Failed to parse client message"
                );
                if let Err(e) = server.send_ack(conn_id, Ack::err("Invalid message")).await {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Failed to send error ack");
                }
            }
        }
    }
    // Non-text frames (ping/pong/binary/close) need no dispatch
}
