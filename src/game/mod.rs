// Game module: pure board rules, seat records, and the match state machine

pub mod board;
pub mod engine;
pub mod seat;

pub use board::{Board, Cell, LINES};
pub use engine::{EngineEvent, Match, MatchRules, MatchStatus};
pub use seat::Seat;
