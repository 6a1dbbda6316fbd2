//! Game rule configuration: every timing and threshold the match engine and
//! rooms run with.

use super::defaults::{
    default_cleanup_sweep_ms, default_consecutive_skip_limit, default_reconnect_grace_ms,
    default_replay_vote_window_ms, default_room_ttl_ms, default_timer_tick_ms,
    default_turn_timeout_ms,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Budget for one turn (milliseconds); the seat is skipped on expiry.
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,
    /// Replay vote window after a match ends (milliseconds).
    #[serde(default = "default_replay_vote_window_ms")]
    pub replay_vote_window_ms: u64,
    /// Room lifetime (milliseconds); reset on every match start.
    #[serde(default = "default_room_ttl_ms")]
    pub room_ttl_ms: u64,
    /// A seat is eliminated when it reaches this many skips in a row.
    #[serde(default = "default_consecutive_skip_limit")]
    pub consecutive_skip_limit: u32,
    /// How long a disconnected seat may still be reclaimed (milliseconds).
    /// Does not pause the turn timer.
    #[serde(default = "default_reconnect_grace_ms")]
    pub reconnect_grace_ms: u64,
    /// Lobby sweep interval for expired rooms (milliseconds).
    #[serde(default = "default_cleanup_sweep_ms")]
    pub cleanup_sweep_ms: u64,
    /// Countdown broadcast cadence (milliseconds).
    #[serde(default = "default_timer_tick_ms")]
    pub timer_tick_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_timeout_ms: default_turn_timeout_ms(),
            replay_vote_window_ms: default_replay_vote_window_ms(),
            room_ttl_ms: default_room_ttl_ms(),
            consecutive_skip_limit: default_consecutive_skip_limit(),
            reconnect_grace_ms: default_reconnect_grace_ms(),
            cleanup_sweep_ms: default_cleanup_sweep_ms(),
            timer_tick_ms: default_timer_tick_ms(),
        }
    }
}

impl GameConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn replay_vote_window(&self) -> Duration {
        Duration::from_millis(self.replay_vote_window_ms)
    }

    pub fn room_ttl(&self) -> Duration {
        Duration::from_millis(self.room_ttl_ms)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_millis(self.reconnect_grace_ms)
    }

    pub fn cleanup_sweep(&self) -> Duration {
        Duration::from_millis(self.cleanup_sweep_ms)
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.timer_tick_ms)
    }
}
