//! One full flight over a real socket: two clients connect, form a room,
//! and start a match through the actual WebSocket edge.


use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use test_helpers::create_test_server;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> SocketAddr {
    let server = create_test_server();
    let app = mortpion_server::websocket::create_router("*").with_state(server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    addr
}

async fn ws_connect(addr: SocketAddr) -> WsStream {
    let url = format!("ws://{addr}/ws");
    let (stream, _) = tokio::time::timeout(Duration::from_secs(10), connect_async(&url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    stream
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send failed");
}

/// Read frames until one has the wanted `type`.
async fn recv_type(ws: &mut WsStream, wanted: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frame = ws.next().await.expect("stream ended").expect("ws error");
            if let Message::Text(text) = frame {
                let value: Value = serde_json::from_str(&text).expect("invalid JSON frame");
                if value["type"] == wanted {
                    return value;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for '{wanted}' frame"))
}

#[tokio::test(flavor = "multi_thread")]
async fn two_clients_meet_and_start_a_match() {
    let addr = start_server().await;

    let mut host = ws_connect(addr).await;
    send_json(&mut host, json!({"type": "ping"})).await;
    let pong = recv_type(&mut host, "pong").await;
    assert!(pong["ts"].as_i64().unwrap() > 0);

    send_json(
        &mut host,
        json!({
            "type": "create-room",
            "playerName": "Host",
            "roomName": "Wire table",
            "isPrivate": false,
            "capacity": 2,
        }),
    )
    .await;
    let created = recv_type(&mut host, "room-created").await;
    let room_id = created["room"]["roomId"].as_str().unwrap().to_string();
    let host_id = created["playerId"].as_str().unwrap().to_string();
    assert_eq!(created["room"]["game"]["status"], "waiting");

    let mut guest = ws_connect(addr).await;
    send_json(
        &mut guest,
        json!({
            "type": "join-room",
            "roomId": room_id,
            "playerName": "Guest",
        }),
    )
    .await;
    let joined = recv_type(&mut guest, "room-joined").await;
    let guest_id = joined["playerId"].as_str().unwrap().to_string();

    // Capacity reached: both ends see the match start.
    let started_host = recv_type(&mut host, "game-started").await;
    let started_guest = recv_type(&mut guest, "game-started").await;
    assert_eq!(started_host["gameState"]["status"], "playing");
    let current = started_guest["gameState"]["currentPlayerId"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(current == host_id || current == guest_id);

    // The seat holding the turn places one piece.
    let mover = if current == host_id {
        &mut host
    } else {
        &mut guest
    };
    send_json(
        mover,
        json!({
            "type": "make-move",
            "roomId": room_id,
            "cellIndex": 4,
            "size": "G",
        }),
    )
    .await;
    let updated = recv_type(&mut host, "game-updated").await;
    assert_eq!(updated["gameState"]["board"][4]["G"].as_str().is_some(), true);
    assert_ne!(updated["gameState"]["currentPlayerId"], current.as_str());

    // A move out of turn only errors at the offender.
    let idler = if current == host_id {
        &mut guest
    } else {
        &mut host
    };
    send_json(
        idler,
        json!({
            "type": "make-move",
            "roomId": room_id,
            "cellIndex": 0,
            "size": "P",
        }),
    )
    .await;
    let rejection = recv_type(idler, "move-error").await;
    assert_eq!(rejection["code"], "FORBIDDEN");
}

#[tokio::test(flavor = "multi_thread")]
async fn garbage_frames_error_then_disconnect() {
    let addr = start_server().await;
    let mut ws = ws_connect(addr).await;

    send_json(&mut ws, json!({"type": "no-such-thing"})).await;
    let err = recv_type(&mut ws, "room-error").await;
    assert_eq!(err["code"], "INVALID_INPUT");

    // Keep sending garbage past the threshold; the server hangs up.
    for _ in 0..16 {
        if ws
            .send(Message::Text("not even json".to_string().into()))
            .await
            .is_err()
        {
            break;
        }
    }
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) => return true,
                Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("timed out waiting for the server to hang up");
    assert!(closed);
}
