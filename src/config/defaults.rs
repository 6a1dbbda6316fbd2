//! Default value functions for configuration fields, referenced by serde's
//! `#[serde(default = ...)]` attributes.

use super::logging::LogFormat;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3545
}

// =============================================================================
// Game Rule Defaults
// =============================================================================

/// Budget for one turn before the seat is skipped.
pub const fn default_turn_timeout_ms() -> u64 {
    60_000
}

/// How long the post-match replay vote stays open.
pub const fn default_replay_vote_window_ms() -> u64 {
    30_000
}

/// Room lifetime; reset whenever a match starts.
pub const fn default_room_ttl_ms() -> u64 {
    3_600_000
}

/// Consecutive skipped turns before a seat is eliminated.
pub const fn default_consecutive_skip_limit() -> u32 {
    2
}

/// Window during which a disconnected seat may be reclaimed.
pub const fn default_reconnect_grace_ms() -> u64 {
    300_000
}

/// Interval between lobby sweeps for expired rooms.
pub const fn default_cleanup_sweep_ms() -> u64 {
    300_000
}

/// Countdown broadcast cadence (~1 Hz).
pub const fn default_timer_tick_ms() -> u64 {
    1_000
}

// =============================================================================
// Server Defaults
// =============================================================================

pub const fn default_max_message_size() -> usize {
    65_536 // 64KB
}

pub const fn default_max_connections_per_ip() -> usize {
    16
}

/// Outbound messages buffered per connection before it is considered
/// unhealthy and dropped.
pub const fn default_outbound_queue_depth() -> usize {
    64
}

/// Unparseable frames tolerated per connection before a fatal close.
pub const fn default_invalid_message_threshold() -> u32 {
    10
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}
