//! Server behavior configuration: connection limits and transport hygiene.

use super::defaults::{
    default_cors_origins, default_invalid_message_threshold, default_max_connections_per_ip,
    default_max_message_size, default_outbound_queue_depth,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Largest accepted WebSocket text frame (bytes).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Simultaneous connections allowed per client IP.
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,
    /// Outbound messages buffered per connection. A full queue marks the
    /// connection unhealthy and it is dropped; rooms never wait for slow
    /// clients.
    #[serde(default = "default_outbound_queue_depth")]
    pub outbound_queue_depth: usize,
    /// Unparseable frames tolerated per connection before a fatal close.
    #[serde(default = "default_invalid_message_threshold")]
    pub invalid_message_threshold: u32,
    /// Comma-separated CORS origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_connections_per_ip: default_max_connections_per_ip(),
            outbound_queue_depth: default_outbound_queue_depth(),
            invalid_message_threshold: default_invalid_message_threshold(),
            cors_origins: default_cors_origins(),
        }
    }
}
