use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{
    GameStatePayload, PieceSize, PlayerId, PlayerView, ReplayVotes, RoomId, RoomView, SkipReason,
};

/// Message types sent from client to server.
///
/// Wire shape is `{"type": "<kebab-case>", ...camelCase fields}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Heartbeat; the server answers with `pong`.
    Ping,
    /// Create a room and claim its host seat.
    CreateRoom {
        player_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_name: Option<String>,
        is_private: bool,
        capacity: u8,
        /// Access code, required iff `is_private`.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    /// Join an existing room. When `player_id` names a seat that recently
    /// disconnected, this reclaims it instead of allocating a new one.
    JoinRoom {
        room_id: RoomId,
        player_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
    },
    /// Explicitly leave the current room.
    LeaveRoom,
    /// Place a piece.
    MakeMove {
        room_id: RoomId,
        cell_index: usize,
        size: PieceSize,
    },
    /// Request a full authoritative snapshot.
    GetGameState { room_id: RoomId },
    /// Cast or change a ballot in the open replay vote.
    CastReplayVote { room_id: RoomId, vote: bool },
}

/// Payload for `room-created` / `room-joined`.
/// Boxed in [`ServerMessage`] to keep the enum small.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomWelcome {
    /// The seat id assigned to (or reclaimed by) the receiving client.
    pub player_id: PlayerId,
    pub room: RoomView,
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Heartbeat reply; `ts` is server epoch milliseconds.
    Pong { ts: i64 },
    /// Room created; sent to the host only.
    RoomCreated(Box<RoomWelcome>),
    /// Joined (or rejoined) a room; sent to the joiner only.
    RoomJoined(Box<RoomWelcome>),
    /// Another player took a seat.
    PlayerJoined { player: PlayerView },
    /// A seat was vacated while the room was waiting.
    PlayerLeft { player_id: PlayerId },
    /// Room operation failed (create/leave/state).
    RoomError { code: ErrorCode, message: String },
    /// Join failed.
    JoinError { code: ErrorCode, message: String },
    /// Move rejected; room state is unchanged.
    MoveError { code: ErrorCode, message: String },
    /// A match started (room reached capacity).
    GameStarted { game_state: GameStatePayload },
    /// A move was applied.
    GameUpdated { game_state: GameStatePayload },
    /// The match reached a terminal state.
    GameEnded {
        winner_id: Option<PlayerId>,
        is_draw: bool,
        game_state: GameStatePayload,
    },
    /// Periodic countdown broadcast (~1 Hz) while a turn is live.
    TimerUpdate {
        /// Whole seconds left on the active turn.
        turn_time_left: u64,
        current_player_id: Option<PlayerId>,
    },
    /// A seat's turn was skipped (timeout, leave, or no legal move).
    TurnSkipped {
        skipped_player_id: PlayerId,
        reason: SkipReason,
        game_state: GameStatePayload,
    },
    /// A seat was eliminated (skip limit or explicit leave mid-game).
    PlayerEliminated { player_id: PlayerId },
    /// A seat's transport dropped; the seat stays in the match.
    PlayerDisconnected { player_id: PlayerId },
    /// A disconnected seat was reclaimed by a fresh transport.
    PlayerReconnected { player_id: PlayerId },
    /// Host role moved to the earliest-joined remaining seat.
    HostTransferred { new_host_id: PlayerId },
    /// A replay vote opened after the match ended.
    ReplayVotingStarted {
        /// Epoch milliseconds when the vote expires.
        replay_deadline: i64,
        replay_votes: ReplayVotes,
    },
    /// A ballot was cast or changed.
    ReplayVoteUpdated { replay_votes: ReplayVotes },
    /// The vote completed without unanimity; the room is closing.
    ReplayRejected,
    /// The vote window elapsed with ballots missing; the room is closing.
    ReplayTimeout,
    /// Unanimous replay: a fresh match started with the same seats.
    GameRestarted { game_state: GameStatePayload },
    /// Full snapshot (reply to `get-game-state`, and the first frame after a
    /// reconnect). Boxed to keep the enum small.
    GameState(Box<RoomView>),
}
