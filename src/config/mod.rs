//! Configuration module for the Mortpion server.
//!
//! Supports JSON configuration files, environment variable overrides, and
//! compiled-in defaults.
//!
//! # Module Structure
//!
//! - [`types`]: Root `Config` struct
//! - [`game`]: Game rule knobs (turn budget, vote window, TTL, skip limit)
//! - [`server`]: Transport limits (frame size, queues, per-IP caps)
//! - [`logging`]: Logging configuration
//! - [`loader`]: Configuration loading functions
//! - [`validation`]: Configuration validation functions
//! - [`defaults`]: Default value functions

// Submodules
pub mod defaults;
pub mod game;
pub mod loader;
pub mod logging;
pub mod server;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use game::GameConfig;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use server::ServerConfig;

pub use types::Config;

pub use validation::validate_config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3545);
        assert_eq!(config.game.turn_timeout_ms, 60_000);
        assert_eq!(config.game.replay_vote_window_ms, 30_000);
        assert_eq!(config.game.room_ttl_ms, 3_600_000);
        assert_eq!(config.game.consecutive_skip_limit, 2);
        assert_eq!(config.game.reconnect_grace_ms, 300_000);
        assert_eq!(config.game.cleanup_sweep_ms, 300_000);
        assert_eq!(config.game.timer_tick_ms, 1_000);

        assert_eq!(config.server.max_message_size, 65_536);
        assert_eq!(config.server.outbound_queue_depth, 64);
        assert_eq!(config.server.invalid_message_threshold, 10);

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "server.log");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization_round_trips() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.port, deserialized.port);
        assert_eq!(config.game, deserialized.game);
        assert_eq!(config.server, deserialized.server);
    }

    #[test]
    fn partial_documents_fill_from_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"game": {"turn_timeout_ms": 500}}"#).unwrap();
        assert_eq!(cfg.game.turn_timeout_ms, 500);
        assert_eq!(cfg.game.consecutive_skip_limit, 2);
        assert_eq!(cfg.port, 3545);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn log_level_parsing_accepts_aliases() {
        let level: LogLevel = serde_json::from_str("\"WARNING\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
        let level: LogLevel = serde_json::from_str("\"err\"").unwrap();
        assert_eq!(level, LogLevel::Error);
        assert!(serde_json::from_str::<LogLevel>("\"loud\"").is_err());
    }
}
