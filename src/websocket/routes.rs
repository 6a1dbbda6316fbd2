use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::lobby::{RoomFilter, RoomPage, RoomSortKey, SortOrder};
use crate::protocol::GameStatus;
use crate::server::GameServer;

use super::handler::websocket_handler;

/// Create the Axum router with WebSocket support
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<GameServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_handler))
        .route("/rooms", get(rooms_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health_handler(State(server): State<Arc<GameServer>>) -> Json<serde_json::Value> {
    let uptime = (chrono::Utc::now() - server.started_at()).num_seconds().max(0);
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": uptime,
        "rooms": server.registry().room_count(),
        "connections": server.active_connection_count(),
    }))
}

/// JSON snapshot of the process counters
async fn metrics_handler(State(server): State<Arc<GameServer>>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(server.metrics().snapshot()).unwrap_or_default())
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoomsQuery {
    status: Option<String>,
    has_space: Option<bool>,
    is_private: Option<bool>,
    name: Option<String>,
    sort: Option<String>,
    order: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

/// Room listing. Without filter parameters this returns the joinable rooms
/// (waiting, not full, not expired); every registry filter and sort is
/// reachable through query parameters.
async fn rooms_handler(
    State(server): State<Arc<GameServer>>,
    Query(query): Query<RoomsQuery>,
) -> Json<serde_json::Value> {
    let default_to_joinable =
        query.status.is_none() && query.has_space.is_none() && query.is_private.is_none();

    let status = query.status.as_deref().and_then(|s| match s {
        "waiting" => Some(GameStatus::Waiting),
        "playing" => Some(GameStatus::Playing),
        "finished" => Some(GameStatus::Finished),
        _ => None,
    });

    let filter = if default_to_joinable {
        RoomFilter {
            status: Some(GameStatus::Waiting),
            has_space: Some(true),
            name_contains: query.name.clone(),
            ..RoomFilter::default()
        }
    } else {
        RoomFilter {
            status,
            has_space: query.has_space,
            is_private: query.is_private,
            name_contains: query.name.clone(),
        }
    };

    let sort = match query.sort.as_deref() {
        Some("name") => RoomSortKey::Name,
        Some("activity") => RoomSortKey::Activity,
        _ => RoomSortKey::Created,
    };
    let order = match query.order.as_deref() {
        Some("desc") => SortOrder::Descending,
        _ => SortOrder::Ascending,
    };
    let page = RoomPage {
        offset: query.offset.unwrap_or(0),
        limit: query.limit,
    };

    let listing = server.registry().list(&filter, sort, order, page).await;
    Json(serde_json::json!({
        "items": listing.items,
        "total": listing.total,
        "hasMore": listing.has_more,
    }))
}
