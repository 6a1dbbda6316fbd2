use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use crate::metrics::ServerMetrics;
use crate::protocol::{PlayerId, RoomId};
use crate::room::ClientSender;

use super::{ConnectionId, RegisterClientError};

/// Per-endpoint state the dispatcher tracks.
#[derive(Debug, Clone)]
pub(crate) struct ClientConnection {
    pub sender: ClientSender,
    pub client_addr: SocketAddr,
    /// The seat this endpoint speaks for, if any. One endpoint, one seat.
    pub binding: Option<(RoomId, PlayerId)>,
    pub invalid_messages: u32,
}

pub(crate) struct ConnectionManager {
    clients: DashMap<ConnectionId, ClientConnection>,
    connections_per_ip: DashMap<IpAddr, usize>,
    max_connections_per_ip: usize,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionManager {
    pub fn new(max_connections_per_ip: usize, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            clients: DashMap::new(),
            connections_per_ip: DashMap::new(),
            max_connections_per_ip,
            metrics,
        }
    }

    pub fn register(
        &self,
        sender: ClientSender,
        client_addr: SocketAddr,
    ) -> Result<ConnectionId, RegisterClientError> {
        let ip = client_addr.ip();
        if let Err(current) = self.try_reserve_ip_slot(ip) {
            warn!(
                %ip,
                current,
                max = self.max_connections_per_ip,
                "IP connection limit exceeded"
            );
            return Err(RegisterClientError::IpLimitExceeded {
                current,
                limit: self.max_connections_per_ip,
            });
        }
        Ok(self.insert(sender, client_addr))
    }

    /// Bypasses IP accounting; used by the in-process test hook.
    pub fn register_unchecked(&self, sender: ClientSender, client_addr: SocketAddr) -> ConnectionId {
        let ip = client_addr.ip();
        *self.connections_per_ip.entry(ip).or_insert(0) += 1;
        self.insert(sender, client_addr)
    }

    fn insert(&self, sender: ClientSender, client_addr: SocketAddr) -> ConnectionId {
        let conn_id = Uuid::new_v4();
        self.clients.insert(
            conn_id,
            ClientConnection {
                sender,
                client_addr,
                binding: None,
                invalid_messages: 0,
            },
        );
        self.metrics.increment_connections();
        conn_id
    }

    fn try_reserve_ip_slot(&self, ip: IpAddr) -> Result<(), usize> {
        let mut entry = self.connections_per_ip.entry(ip).or_insert(0);
        if *entry >= self.max_connections_per_ip {
            return Err(*entry);
        }
        *entry += 1;
        Ok(())
    }

    pub fn remove(&self, conn_id: ConnectionId) -> Option<ClientConnection> {
        let (_, connection) = self.clients.remove(&conn_id)?;
        let ip = connection.client_addr.ip();
        let drained = if let Some(mut count) = self.connections_per_ip.get_mut(&ip) {
            *count = count.saturating_sub(1);
            *count == 0
        } else {
            false
        };
        if drained {
            self.connections_per_ip.remove_if(&ip, |_, count| *count == 0);
        }
        Some(connection)
    }

    pub fn bind(&self, conn_id: ConnectionId, room_id: RoomId, seat_id: PlayerId) {
        if let Some(mut connection) = self.clients.get_mut(&conn_id) {
            connection.binding = Some((room_id, seat_id));
        }
    }

    pub fn unbind(&self, conn_id: ConnectionId) {
        if let Some(mut connection) = self.clients.get_mut(&conn_id) {
            connection.binding = None;
        }
    }

    pub fn binding(&self, conn_id: ConnectionId) -> Option<(RoomId, PlayerId)> {
        self.clients.get(&conn_id).and_then(|c| c.binding)
    }

    pub fn sender(&self, conn_id: ConnectionId) -> Option<ClientSender> {
        self.clients.get(&conn_id).map(|c| c.sender.clone())
    }

    pub fn record_invalid(&self, conn_id: ConnectionId) -> u32 {
        self.clients
            .get_mut(&conn_id)
            .map(|mut c| {
                c.invalid_messages += 1;
                c.invalid_messages
            })
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }
}
