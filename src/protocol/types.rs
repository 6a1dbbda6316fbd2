use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::game::board::Cell;

/// Number of cells on the board (3x3, row-major addressing).
pub const BOARD_CELLS: usize = 9;

/// Pieces of each size a seat starts a match with.
pub const PIECES_PER_SIZE: u8 = 3;

/// Unique identifier for players (seat-scoped, minted by the room)
pub type PlayerId = Uuid;
/// Unique identifier for rooms
pub type RoomId = Uuid;

/// Seat colors, assigned from [`COLOR_PALETTE`] in order (first unused).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
}

/// Ordered assignment palette. A room never holds more seats than colors.
pub const COLOR_PALETTE: [PlayerColor; 4] = [
    PlayerColor::Red,
    PlayerColor::Blue,
    PlayerColor::Green,
    PlayerColor::Yellow,
];

/// The three nested piece sizes. `G` covers `M` covers `P` for visibility,
/// but each size occupies an independent slot within a cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceSize {
    #[serde(rename = "P")]
    Small,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "G")]
    Large,
}

impl PieceSize {
    pub const ALL: [PieceSize; 3] = [PieceSize::Small, PieceSize::Medium, PieceSize::Large];
}

/// Per-seat piece counts, keyed `P`/`M`/`G` on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PieceInventory {
    #[serde(rename = "P")]
    pub small: u8,
    #[serde(rename = "M")]
    pub medium: u8,
    #[serde(rename = "G")]
    pub large: u8,
}

impl PieceInventory {
    /// Fresh match allotment: three pieces of every size.
    pub const fn full() -> Self {
        Self {
            small: PIECES_PER_SIZE,
            medium: PIECES_PER_SIZE,
            large: PIECES_PER_SIZE,
        }
    }

    pub const fn empty() -> Self {
        Self {
            small: 0,
            medium: 0,
            large: 0,
        }
    }

    pub const fn count(&self, size: PieceSize) -> u8 {
        match size {
            PieceSize::Small => self.small,
            PieceSize::Medium => self.medium,
            PieceSize::Large => self.large,
        }
    }

    /// Remove one piece of `size`. Returns `false` (unchanged) when none left.
    pub fn take(&mut self, size: PieceSize) -> bool {
        let slot = match size {
            PieceSize::Small => &mut self.small,
            PieceSize::Medium => &mut self.medium,
            PieceSize::Large => &mut self.large,
        };
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    pub const fn is_exhausted(&self) -> bool {
        self.small == 0 && self.medium == 0 && self.large == 0
    }
}

impl Default for PieceInventory {
    fn default() -> Self {
        Self::full()
    }
}

/// Room/game status as clients see it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
}

/// Why a seat's turn was skipped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Turn timer elapsed without a move.
    Timeout,
    /// The seat explicitly left mid-game while holding the turn.
    Leave,
    /// The seat had no legal move when its turn came up.
    NoLegalMoves,
}

/// Client-visible view of one seat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    pub color: PlayerColor,
    pub inventory: PieceInventory,
    pub connected: bool,
    pub is_host: bool,
    pub is_eliminated: bool,
    pub skips_in_a_row: u32,
}

/// Authoritative game state snapshot, broadcast after any mutation and sent
/// in full to joining or reconnecting clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub board: [Cell; BOARD_CELLS],
    pub players: Vec<PlayerView>,
    pub current_player_id: Option<PlayerId>,
    pub status: GameStatus,
    pub winner_id: Option<PlayerId>,
    pub is_draw: bool,
    /// Epoch milliseconds, `null` before the first match starts.
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    /// Whole seconds left on the active turn. Derived; clients should prefer
    /// the dedicated `timer-update` stream.
    pub turn_time_left: u64,
}

/// Room-level view wrapping the game snapshot with lobby metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: RoomId,
    pub name: String,
    pub capacity: u8,
    pub is_private: bool,
    pub host_id: PlayerId,
    /// Epoch milliseconds after which the room is eligible for eviction.
    pub expires_at: i64,
    pub game: GameStatePayload,
}

/// Compact listing entry returned by `GET /rooms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub player_count: usize,
    pub capacity: u8,
    pub is_private: bool,
    pub status: GameStatus,
}

/// Ballot board for an open replay vote: every voter appears as a key,
/// `null` until they cast. `BTreeMap` keeps the wire order stable.
pub type ReplayVotes = BTreeMap<PlayerId, Option<bool>>;
