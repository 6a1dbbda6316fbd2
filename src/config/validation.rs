//! Configuration validation.

use super::Config;

/// Reject configurations the server cannot run correctly with. Returns a
/// newline-separated list of every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut problems = Vec::new();

    if config.game.turn_timeout_ms == 0 {
        problems.push("game.turn_timeout_ms must be greater than zero".to_string());
    }
    if config.game.replay_vote_window_ms == 0 {
        problems.push("game.replay_vote_window_ms must be greater than zero".to_string());
    }
    if config.game.room_ttl_ms == 0 {
        problems.push("game.room_ttl_ms must be greater than zero".to_string());
    }
    if config.game.consecutive_skip_limit == 0 {
        problems.push("game.consecutive_skip_limit must be at least 1".to_string());
    }
    if config.game.cleanup_sweep_ms == 0 {
        problems.push("game.cleanup_sweep_ms must be greater than zero".to_string());
    }
    if config.game.timer_tick_ms == 0 {
        problems.push("game.timer_tick_ms must be greater than zero".to_string());
    }
    if config.server.outbound_queue_depth == 0 {
        problems.push("server.outbound_queue_depth must be at least 1".to_string());
    }
    if config.server.max_message_size < 256 {
        problems.push("server.max_message_size must be at least 256 bytes".to_string());
    }
    if config.server.max_connections_per_ip == 0 {
        problems.push("server.max_connections_per_ip must be at least 1".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}
