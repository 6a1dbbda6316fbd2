// Room module: the serialization unit for one table, plus its clocks and
// the post-match replay vote

pub mod replay;
pub mod room;
pub mod timer;

pub use replay::{ReplayVote, VoteProgress};
pub use room::{
    ClientSender, LeaveEffects, LeaveMode, ListingSnapshot, Room, RoomOptions, RoomPhase,
};
pub use timer::TurnTimer;
