use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::lobby::LobbyRegistry;
use crate::metrics::ServerMetrics;
use crate::protocol::{ErrorCode, GameError, ServerMessage};
use crate::room::{ClientSender, LeaveMode};

mod connection_manager;
mod message_router;
mod session;

use connection_manager::ConnectionManager;

/// Identity of one transport endpoint. Bound to at most one seat at a time.
pub type ConnectionId = Uuid;

#[derive(Debug, Error)]
pub enum RegisterClientError {
    #[error("Too many connections from your IP ({current}/{limit})")]
    IpLimitExceeded { current: usize, limit: usize },
}

/// The session dispatcher: binds transport endpoints to seats, routes
/// inbound messages to the right room, and translates room errors into
/// `*-error` replies on the originating connection only. Room events reach
/// clients directly through the per-connection queues the rooms hold.
pub struct GameServer {
    registry: Arc<LobbyRegistry>,
    connections: ConnectionManager,
    config: Config,
    metrics: Arc<ServerMetrics>,
    started_at: DateTime<Utc>,
}

impl GameServer {
    pub fn new(config: Config) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());
        let registry = LobbyRegistry::new(config.game, Arc::clone(&metrics));
        registry.spawn_sweeper();

        let connections = ConnectionManager::new(
            config.server.max_connections_per_ip,
            Arc::clone(&metrics),
        );

        Arc::new(Self {
            registry,
            connections,
            config,
            metrics,
            started_at: Utc::now(),
        })
    }

    /// Register a new transport endpoint.
    pub fn register_connection(
        &self,
        sender: ClientSender,
        addr: SocketAddr,
    ) -> Result<ConnectionId, RegisterClientError> {
        let conn_id = self.connections.register(sender, addr)?;
        tracing::info!(%conn_id, client_addr = %addr, "Connection established");
        Ok(conn_id)
    }

    /// Register an endpoint without IP accounting. Test hook, mirroring the
    /// WebSocket path.
    pub fn connect_test_client(&self, sender: ClientSender) -> ConnectionId {
        self.connections.register_unchecked(
            sender,
            SocketAddr::from(([127, 0, 0, 1], 0)),
        )
    }

    /// Transport closed: run the disconnect path for any bound seat and
    /// forget the endpoint.
    pub async fn unregister_connection(&self, conn_id: ConnectionId) {
        if let Some(connection) = self.connections.remove(conn_id) {
            if let Some((room_id, seat_id)) = connection.binding {
                if let Some(room) = self.registry.get(room_id) {
                    let effects = room.leave(seat_id, LeaveMode::Disconnect).await;
                    if effects.closed {
                        self.registry.remove(room_id);
                    }
                }
            }
            self.registry.release_host(conn_id);
            self.metrics.decrement_active_connections();
            tracing::info!(%conn_id, "Connection unregistered");
        }
    }

    /// One more unparseable frame from this endpoint; returns `true` once
    /// the fatal threshold is crossed and the connection should be closed.
    pub fn record_invalid_message(&self, conn_id: ConnectionId) -> bool {
        let count = self.connections.record_invalid(conn_id);
        count > self.config.server.invalid_message_threshold
    }

    pub fn registry(&self) -> &Arc<LobbyRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn active_connection_count(&self) -> usize {
        self.connections.len()
    }

    // ------------------------------------------------------------------
    // Replies to the originating connection
    // ------------------------------------------------------------------

    pub(crate) fn send_to_connection(&self, conn_id: ConnectionId, message: ServerMessage) {
        if let Some(sender) = self.connections.sender(conn_id) {
            match sender.try_send(Arc::new(message)) {
                Ok(()) => {}
                Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                    self.metrics.increment_messages_dropped();
                    tracing::warn!(%conn_id, "Outbound queue overflow; dropping connection");
                    sender.shut_down();
                }
                Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    pub(crate) fn reply_room_error(&self, conn_id: ConnectionId, err: &GameError) {
        self.send_to_connection(
            conn_id,
            ServerMessage::RoomError {
                code: err.code(),
                message: err.to_string(),
            },
        );
    }

    pub(crate) fn reply_join_error(&self, conn_id: ConnectionId, err: &GameError) {
        self.send_to_connection(
            conn_id,
            ServerMessage::JoinError {
                code: err.code(),
                message: err.to_string(),
            },
        );
    }

    pub(crate) fn reply_move_error(&self, conn_id: ConnectionId, err: &GameError) {
        self.send_to_connection(
            conn_id,
            ServerMessage::MoveError {
                code: err.code(),
                message: err.to_string(),
            },
        );
    }

    pub(crate) fn reply_invalid_input(&self, conn_id: ConnectionId, message: String) {
        self.send_to_connection(
            conn_id,
            ServerMessage::RoomError {
                code: ErrorCode::InvalidInput,
                message,
            },
        );
    }
}
