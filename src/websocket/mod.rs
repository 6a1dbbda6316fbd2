// WebSocket transport edge: router, upgrade handler, per-socket loops

mod connection;
mod handler;
mod routes;

pub use handler::websocket_handler;
pub use routes::create_router;
