// Protocol module: message types, error codes, and input validation

pub mod error_codes;
pub mod messages;
pub mod types;
pub mod validation;

pub use error_codes::{ErrorCode, GameError};

pub use types::{
    GameStatePayload, GameStatus, PieceInventory, PieceSize, PlayerColor, PlayerId, PlayerView,
    ReplayVotes, RoomId, RoomSummary, RoomView, SkipReason, BOARD_CELLS, COLOR_PALETTE,
    PIECES_PER_SIZE,
};

pub use messages::{ClientMessage, RoomWelcome, ServerMessage};
