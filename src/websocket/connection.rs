use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::room::ClientSender;
use crate::server::{GameServer, RegisterClientError};

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<GameServer>, addr: SocketAddr) {
    let (mut sink, mut stream) = socket.split();
    let queue_depth = server.config().server.outbound_queue_depth;
    let max_message_size = server.config().server.max_message_size;
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(queue_depth);
    let kill = CancellationToken::new();

    let conn_id = match server.register_connection(ClientSender::new(tx, kill.clone()), addr) {
        Ok(conn_id) => conn_id,
        Err(err @ RegisterClientError::IpLimitExceeded { .. }) => {
            let refusal = ServerMessage::RoomError {
                code: ErrorCode::Unavailable,
                message: err.to_string(),
            };
            if let Ok(json) = serde_json::to_string(&refusal) {
                let _ = sink.send(Message::Text(json.into())).await;
            }
            let _ = sink.close().await;
            return;
        }
    };

    // Outbound: drain the bounded queue onto the socket. The queue's sender
    // side lives with the dispatcher and any room the seat joins; when a
    // room drops it on overflow this task ends and the socket closes.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(message.as_ref()) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(%conn_id, error = %err, "Failed to serialize outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Inbound: parse frames and hand them to the dispatcher. Repeated
    // garbage past the configured threshold is a fatal protocol desync.
    let server_inbound = Arc::clone(&server);
    let receive_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(err) => {
                    tracing::debug!(%conn_id, error = %err, "WebSocket error");
                    break;
                }
            };
            match msg {
                Message::Text(text) => {
                    if text.len() > max_message_size {
                        tracing::warn!(
                            %conn_id,
                            size = text.len(),
                            max = max_message_size,
                            "Frame exceeds size limit"
                        );
                        server_inbound.reply_invalid_input(
                            conn_id,
                            format!(
                                "message too large ({} bytes, max {max_message_size})",
                                text.len()
                            ),
                        );
                        if server_inbound.record_invalid_message(conn_id) {
                            break;
                        }
                        continue;
                    }
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            server_inbound.handle_client_message(conn_id, message).await;
                        }
                        Err(err) => {
                            tracing::debug!(%conn_id, error = %err, "Rejected client frame");
                            server_inbound
                                .reply_invalid_input(conn_id, format!("unrecognized message: {err}"));
                            if server_inbound.record_invalid_message(conn_id) {
                                tracing::warn!(%conn_id, "Invalid-message threshold crossed; closing");
                                break;
                            }
                        }
                    }
                }
                Message::Binary(_) => {
                    // This protocol is JSON text frames only.
                    server_inbound
                        .reply_invalid_input(conn_id, "binary frames are not supported".into());
                    if server_inbound.record_invalid_message(conn_id) {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!(%conn_id, "WebSocket connection closed");
                    break;
                }
                // Transport-level ping/pong is handled by axum.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = receive_task => {}
        () = kill.cancelled() => {
            tracing::warn!(%conn_id, "Connection closed: outbound queue overflow");
        }
    }

    // Dropping the dispatcher's sender here closes the outbound channel;
    // the send task drains what is queued, closes the sink, and the
    // receive task ends with the socket.
    server.unregister_connection(conn_id).await;
}
