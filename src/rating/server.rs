use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use warp::ws::Message;

use super::code;
use super::connection::ClientConnection;
use super::messages::{Ack, ClientMessage, ServerMessage};
use super::registry::{DisconnectEvent, RoomRegistry};
use crate::error::Result;

/// Bridges the socket layer to the room registry: owns the connection
/// table, routes inbound requests, and fans results out to subscribers.
///
/// Acks go only to the originating connection; room updates are serialized
/// once and delivered identically to every subscriber.
pub struct RatingServer {
    registry: Arc<RoomRegistry>,
    connections: Arc<RwLock<HashMap<String, Arc<ClientConnection>>>>,
}

impl RatingServer {
    pub fn new() -> Self {
        Self {
            registry: RoomRegistry::new(),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register_connection(&self, connection: ClientConnection) {
        tracing::debug!(conn_id = %connection.id, "Connection registered");
        let mut connections = self.connections.write().await;
        connections.insert(connection.id.clone(), Arc::new(connection));
    }

    pub async fn unregister_connection(&self, conn_id: &str) {
        let mut connections = self.connections.write().await;
        if connections.remove(conn_id).is_some() {
            tracing::debug!(conn_id = %conn_id, "Connection unregistered");
        }
    }

    /// Route one inbound request to the matching room operation. Domain
    /// failures are already answered on the ack channel by the operation;
    /// anything surfacing here is a delivery problem.
    pub async fn dispatch(&self, conn_id: &str, message: ClientMessage) {
        let result = match message {
            ClientMessage::CreateRoom => self.create_room(conn_id).await,
            ClientMessage::JoinRoom { code } => self.join_room(conn_id, &code).await,
            ClientMessage::SubmitRating { code, value } => {
                self.submit_rating(conn_id, &code, value).await
            }
            ClientMessage::ClearRatings { code } => self.clear_ratings(conn_id, &code).await,
            ClientMessage::EndRoom { code } => self.end_room(conn_id, &code).await,
        };

        if let Err(e) = result {
            tracing::error!(conn_id = %conn_id, error = %e, "Failed to deliver response");
        }
    }

    pub async fn create_room(&self, conn_id: &str) -> Result<()> {
        match self.registry.create(conn_id).await {
            Ok((room_code, _)) => self.send_ack(conn_id, Ack::ok_with_code(&room_code)).await,
            Err(e) => {
                // Only reachable on code-space exhaustion
                tracing::error!(conn_id = %conn_id, error = %e, "Failed to create room");
                self.send_ack(conn_id, Ack::err("Could not allocate room code"))
                    .await
            }
        }
    }

    /// Subscribe the caller and show them current stats privately. Nobody
    /// else in the room hears about a join.
    pub async fn join_room(&self, conn_id: &str, raw_code: &str) -> Result<()> {
        let room_code = code::normalize(raw_code);

        match self.registry.join(&room_code, conn_id).await {
            Ok(room_stats) => {
                self.send_ack(conn_id, Ack::ok_with_code(&room_code)).await?;
                self.send_message(conn_id, &ServerMessage::room_update(&room_code, &room_stats))
                    .await
            }
            Err(e) => self.send_ack(conn_id, Ack::err(e.to_string())).await,
        }
    }

    pub async fn submit_rating(&self, conn_id: &str, raw_code: &str, value: f64) -> Result<()> {
        let room_code = code::normalize(raw_code);

        match self.registry.submit_rating(&room_code, conn_id, value).await {
            Ok((room_stats, recipients)) => {
                self.broadcast(&recipients, &ServerMessage::room_update(&room_code, &room_stats))
                    .await?;
                self.send_ack(conn_id, Ack::ok()).await
            }
            Err(e) => self.send_ack(conn_id, Ack::err(e.to_string())).await,
        }
    }

    pub async fn clear_ratings(&self, conn_id: &str, raw_code: &str) -> Result<()> {
        let room_code = code::normalize(raw_code);

        match self.registry.clear(&room_code, conn_id).await {
            Ok((room_stats, recipients)) => {
                self.broadcast(&recipients, &ServerMessage::room_update(&room_code, &room_stats))
                    .await?;
                self.send_ack(conn_id, Ack::ok()).await
            }
            Err(e) => self.send_ack(conn_id, Ack::err(e.to_string())).await,
        }
    }

    pub async fn end_room(&self, conn_id: &str, raw_code: &str) -> Result<()> {
        let room_code = code::normalize(raw_code);

        match self.registry.end(&room_code, conn_id).await {
            Ok(recipients) => {
                self.broadcast(&recipients, &ServerMessage::room_ended(&room_code))
                    .await?;
                self.send_ack(conn_id, Ack::ok()).await
            }
            Err(e) => self.send_ack(conn_id, Ack::err(e.to_string())).await,
        }
    }

    /// Reconcile all rooms after a socket drop and notify survivors. Has no
    /// caller to report to, so nothing here fails outward.
    pub async fn handle_disconnect(&self, conn_id: &str) {
        tracing::info!(conn_id = %conn_id, "Connection closed, reconciling rooms");

        for event in self.registry.handle_disconnect(conn_id).await {
            let result = match event {
                DisconnectEvent::Update {
                    code: room_code,
                    stats: room_stats,
                    recipients,
                } => {
                    self.broadcast(&recipients, &ServerMessage::room_update(&room_code, &room_stats))
                        .await
                }
                DisconnectEvent::Ended {
                    code: room_code,
                    recipients,
                } => {
                    self.broadcast(&recipients, &ServerMessage::room_ended(&room_code))
                        .await
                }
            };

            if let Err(e) = result {
                tracing::error!(conn_id = %conn_id, error = %e, "Failed to deliver disconnect update");
            }
        }
    }

    pub async fn send_ack(&self, conn_id: &str, ack: Ack) -> Result<()> {
        let text = serde_json::to_string(&ack)?;
        self.send_text(conn_id, text).await;
        Ok(())
    }

    async fn send_message(&self, conn_id: &str, message: &ServerMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.send_text(conn_id, text).await;
        Ok(())
    }

    /// Serialize once, deliver the identical frame to every recipient that
    /// still has a live connection.
    async fn broadcast(&self, recipients: &[String], message: &ServerMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;

        let connections = self.connections.read().await;
        for conn_id in recipients {
            if let Some(connection) = connections.get(conn_id) {
                if let Err(e) = connection.send(Message::text(text.clone())) {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Failed to deliver broadcast");
                }
            }
        }
        Ok(())
    }

    /// A recipient that vanished between snapshot and send is not an error;
    /// the disconnect path will reconcile it.
    async fn send_text(&self, conn_id: &str, text: String) {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(conn_id) {
            if let Err(e) = connection.send(Message::text(text)) {
                tracing::warn!(conn_id = %conn_id, error = %e, "Failed to send message");
            }
        }
    }
}

impl Default for RatingServer {
    fn default() -> Self {
        Self::new()
    }
}
