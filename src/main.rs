#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use mortpion_server::config;
use mortpion_server::logging;
use mortpion_server::server::GameServer;
use mortpion_server::websocket;
use std::net::SocketAddr;

/// Mortpion -- authoritative WebSocket server for the nested-pieces 3x3 board game
#[derive(Parser, Debug)]
#[command(name = "mortpion-server")]
#[command(about = "Authoritative in-memory WebSocket server for the Mortpion board game")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json / env overrides, else defaults.
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() only warns on validation problems; capture the result
    // here for a proper exit code and hard startup failure.
    let validation_result =
        config::validate_config(&cfg).map_err(|e| anyhow::anyhow!("invalid configuration:\n{e}"));

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Turn timeout: {} ms", cfg.game.turn_timeout_ms);
                println!("  Replay vote window: {} ms", cfg.game.replay_vote_window_ms);
                println!("  Room TTL: {} ms", cfg.game.room_ttl_ms);
                println!("  Skip limit: {}", cfg.game.consecutive_skip_limit);
                println!("  Reconnect grace: {} ms", cfg.game.reconnect_grace_ms);
                println!("  Cleanup sweep: {} ms", cfg.game.cleanup_sweep_ms);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    // Initialize logging from config.
    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting Mortpion server");

    let cors_origins = cfg.server.cors_origins.clone();
    let game_server = GameServer::new(cfg);

    let app = websocket::create_router(&cors_origins).with_state(game_server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cors_origins,
        "Server started - WebSocket: /ws, Health: /health, Rooms: /rooms"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["mortpion-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["mortpion-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        let result =
            Cli::try_parse_from(["mortpion-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
    }
}
