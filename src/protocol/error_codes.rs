use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::types::{PieceSize, PlayerId};

/// Stable error codes surfaced in `*-error` messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Forbidden,
    Conflict,
    IllegalMove,
    Expired,
    InvalidCode,
    Unavailable,
    Internal,
}

impl ErrorCode {
    /// Human-readable description for SDKs and logs.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => {
                "The request payload is malformed or out of range. Check the field values."
            }
            Self::NotFound => "The requested room or player does not exist. It may have closed.",
            Self::Forbidden => {
                "You are not allowed to perform this action right now (wrong turn, wrong room, or not a voter)."
            }
            Self::Conflict => {
                "The request conflicts with current state: room full, already joined, host already owns a room, or no color left."
            }
            Self::IllegalMove => {
                "The move violates the rules: that size slot is occupied or you have no piece of that size left."
            }
            Self::Expired => "The room or voting window has expired.",
            Self::InvalidCode => "The access code for this private room does not match.",
            Self::Unavailable => {
                "The operation is not available in the current phase (no match in progress, or no vote open)."
            }
            Self::Internal => "An internal server error occurred. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Typed failure for every room, lobby, and match operation. Each variant
/// maps onto one stable [`ErrorCode`]; the dispatcher turns these into
/// `*-error` replies on the originating connection only.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GameError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("room not found")]
    RoomNotFound,
    #[error("player {0} is not seated in this room")]
    SeatNotFound(PlayerId),
    #[error("not your turn")]
    NotYourTurn,
    #[error("you are not bound to a room")]
    NotInRoom,
    #[error("you are not part of this vote")]
    NotAVoter,
    #[error("eliminated seats cannot act")]
    SeatEliminated,
    #[error("room is full")]
    RoomFull,
    #[error("already in a room")]
    AlreadyInRoom,
    #[error("host already owns a live room")]
    HostBusy,
    #[error("no color left in the palette")]
    ColorExhausted,
    #[error("cell {cell} already holds a {size:?} piece")]
    SlotOccupied { cell: usize, size: PieceSize },
    #[error("no {0:?} piece left in inventory")]
    OutOfPieces(PieceSize),
    #[error("room has expired")]
    RoomExpired,
    #[error("the voting window has closed")]
    VoteClosed,
    #[error("the reconnect window has closed")]
    ReconnectExpired,
    #[error("access code mismatch")]
    InvalidAccessCode,
    #[error("a match is already in progress")]
    MatchInProgress,
    #[error("no match is currently being played")]
    MatchNotActive,
    #[error("no replay vote is open")]
    VoteNotActive,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// The stable wire code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::RoomNotFound | Self::SeatNotFound(_) => ErrorCode::NotFound,
            Self::NotYourTurn | Self::NotInRoom | Self::NotAVoter | Self::SeatEliminated => {
                ErrorCode::Forbidden
            }
            Self::RoomFull | Self::AlreadyInRoom | Self::HostBusy | Self::ColorExhausted => {
                ErrorCode::Conflict
            }
            Self::SlotOccupied { .. } | Self::OutOfPieces(_) => ErrorCode::IllegalMove,
            Self::RoomExpired | Self::VoteClosed | Self::ReconnectExpired => ErrorCode::Expired,
            Self::InvalidAccessCode => ErrorCode::InvalidCode,
            Self::MatchInProgress | Self::MatchNotActive | Self::VoteNotActive => {
                ErrorCode::Unavailable
            }
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}
