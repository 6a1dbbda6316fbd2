use chrono::Utc;

use crate::lobby::CreateRoomRequest;
use crate::protocol::validation::{validate_cell_index, validate_nickname};
use crate::protocol::{GameError, PieceSize, PlayerId, RoomId, ServerMessage};
use crate::room::LeaveMode;

use super::{ConnectionId, GameServer};

impl GameServer {
    pub(crate) fn handle_ping(&self, conn_id: ConnectionId) {
        self.send_to_connection(
            conn_id,
            ServerMessage::Pong {
                ts: Utc::now().timestamp_millis(),
            },
        );
    }

    pub(crate) async fn handle_create_room(
        &self,
        conn_id: ConnectionId,
        player_name: String,
        room_name: Option<String>,
        is_private: bool,
        capacity: u8,
        code: Option<String>,
    ) {
        if self.connections.binding(conn_id).is_some() {
            self.reply_room_error(conn_id, &GameError::AlreadyInRoom);
            return;
        }
        let Some(sender) = self.connections.sender(conn_id) else {
            return;
        };

        let request = CreateRoomRequest {
            host_key: conn_id,
            name: room_name,
            capacity,
            is_private,
            code,
            host_nickname: player_name,
        };
        match self.registry.create(request, sender) {
            Ok((room, host_id)) => {
                self.connections.bind(conn_id, room.id, host_id);
                tracing::info!(
                    %conn_id,
                    room_id = %room.id,
                    %host_id,
                    "Connection bound to new room as host"
                );
            }
            Err(err) => {
                tracing::debug!(%conn_id, error = %err, "Room creation rejected");
                self.reply_room_error(conn_id, &err);
            }
        }
    }

    pub(crate) async fn handle_join_room(
        &self,
        conn_id: ConnectionId,
        room_id: RoomId,
        player_name: String,
        access_code: Option<String>,
        player_id: Option<PlayerId>,
    ) {
        if self.connections.binding(conn_id).is_some() {
            self.reply_join_error(conn_id, &GameError::AlreadyInRoom);
            return;
        }
        let Some(sender) = self.connections.sender(conn_id) else {
            return;
        };
        let Some(room) = self.registry.get(room_id) else {
            self.reply_join_error(conn_id, &GameError::RoomNotFound);
            return;
        };

        // A join asserting an existing seat id is a reconnection attempt;
        // the room checks the grace window and ships a full snapshot.
        let joined = match player_id {
            Some(seat_id) => room.reconnect(seat_id, sender).await,
            None => match validate_nickname(&player_name) {
                Ok(nickname) => room.join(nickname, access_code.as_deref(), sender).await,
                Err(err) => Err(err),
            },
        };

        match joined {
            Ok(seat_id) => {
                self.connections.bind(conn_id, room.id, seat_id);
                tracing::info!(%conn_id, room_id = %room.id, %seat_id, "Connection bound to seat");
            }
            Err(err) => {
                tracing::debug!(%conn_id, room_id = %room.id, error = %err, "Join rejected");
                self.reply_join_error(conn_id, &err);
            }
        }
    }

    pub(crate) async fn handle_leave_room(&self, conn_id: ConnectionId) {
        let Some((room_id, seat_id)) = self.connections.binding(conn_id) else {
            self.reply_room_error(conn_id, &GameError::NotInRoom);
            return;
        };
        self.connections.unbind(conn_id);
        self.registry.release_host(conn_id);

        if let Some(room) = self.registry.get(room_id) {
            let effects = room.leave(seat_id, LeaveMode::Explicit).await;
            if effects.closed {
                self.registry.remove(room_id);
            }
        }
        tracing::info!(%conn_id, %room_id, %seat_id, "Seat left room");
    }

    pub(crate) async fn handle_make_move(
        &self,
        conn_id: ConnectionId,
        room_id: RoomId,
        cell_index: usize,
        size: PieceSize,
    ) {
        let Some((bound_room, seat_id)) = self.connections.binding(conn_id) else {
            self.reply_move_error(conn_id, &GameError::NotInRoom);
            return;
        };
        if bound_room != room_id {
            self.reply_move_error(conn_id, &GameError::NotInRoom);
            return;
        }
        let cell = match validate_cell_index(cell_index) {
            Ok(cell) => cell,
            Err(err) => {
                self.reply_move_error(conn_id, &err);
                return;
            }
        };
        let Some(room) = self.registry.get(room_id) else {
            self.reply_move_error(conn_id, &GameError::RoomNotFound);
            return;
        };

        if let Err(err) = room.submit_move(seat_id, cell, size).await {
            tracing::debug!(%conn_id, %room_id, %seat_id, error = %err, "Move rejected");
            self.reply_move_error(conn_id, &err);
        }
    }

    pub(crate) async fn handle_get_game_state(&self, conn_id: ConnectionId, room_id: RoomId) {
        let Some((bound_room, _seat_id)) = self.connections.binding(conn_id) else {
            self.reply_room_error(conn_id, &GameError::NotInRoom);
            return;
        };
        if bound_room != room_id {
            self.reply_room_error(conn_id, &GameError::NotInRoom);
            return;
        }
        let Some(room) = self.registry.get(room_id) else {
            self.reply_room_error(conn_id, &GameError::RoomNotFound);
            return;
        };
        let view = room.snapshot().await;
        self.send_to_connection(conn_id, ServerMessage::GameState(Box::new(view)));
    }

    pub(crate) async fn handle_cast_replay_vote(
        &self,
        conn_id: ConnectionId,
        room_id: RoomId,
        vote: bool,
    ) {
        let Some((bound_room, seat_id)) = self.connections.binding(conn_id) else {
            self.reply_room_error(conn_id, &GameError::NotInRoom);
            return;
        };
        if bound_room != room_id {
            self.reply_room_error(conn_id, &GameError::NotInRoom);
            return;
        }
        let Some(room) = self.registry.get(room_id) else {
            self.reply_room_error(conn_id, &GameError::RoomNotFound);
            return;
        };

        if let Err(err) = room.cast_replay_vote(seat_id, vote).await {
            tracing::debug!(%conn_id, %room_id, %seat_id, error = %err, "Replay vote rejected");
            self.reply_room_error(conn_id, &err);
        }
    }
}
