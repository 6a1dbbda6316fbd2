use crate::protocol::ClientMessage;

use super::{ConnectionId, GameServer};

impl GameServer {
    /// Route one inbound message from a connection to its handler.
    pub async fn handle_client_message(&self, conn_id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Ping => {
                self.handle_ping(conn_id);
            }
            ClientMessage::CreateRoom {
                player_name,
                room_name,
                is_private,
                capacity,
                code,
            } => {
                self.handle_create_room(conn_id, player_name, room_name, is_private, capacity, code)
                    .await;
            }
            ClientMessage::JoinRoom {
                room_id,
                player_name,
                access_code,
                player_id,
            } => {
                self.handle_join_room(conn_id, room_id, player_name, access_code, player_id)
                    .await;
            }
            ClientMessage::LeaveRoom => {
                self.handle_leave_room(conn_id).await;
            }
            ClientMessage::MakeMove {
                room_id,
                cell_index,
                size,
            } => {
                self.handle_make_move(conn_id, room_id, cell_index, size)
                    .await;
            }
            ClientMessage::GetGameState { room_id } => {
                self.handle_get_game_state(conn_id, room_id).await;
            }
            ClientMessage::CastReplayVote { room_id, vote } => {
                self.handle_cast_replay_vote(conn_id, room_id, vote).await;
            }
        }
    }
}
