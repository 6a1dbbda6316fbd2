#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Mortpion Server
//!
//! Authoritative in-memory backend for Mortpion, a turn-based 3x3 board game
//! for 2-4 players with three nested piece sizes per cell.
//!
//! The server validates every rule server-side, serializes all mutations per
//! room, and fans events out to WebSocket clients. No database, no cloud
//! services -- run the binary and connect.

/// Server configuration and environment variables
pub mod config;

/// Board, seats, and the match rule engine
pub mod game;

/// Process-wide room catalog
pub mod lobby;

/// Structured logging configuration
pub mod logging;

/// Counter-based server metrics
pub mod metrics;

/// WebSocket message protocol definitions
pub mod protocol;

/// Room aggregate: serialization unit for one table
pub mod room;

/// Session dispatcher and connection management
pub mod server;

/// WebSocket connection handling
pub mod websocket;
