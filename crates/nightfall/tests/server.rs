//! Integration tests for the Nightfall server: real WebSocket clients
//! against a server bound to a random port.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nightfall::{
    CannedNarrator, ClientAction, Envelope, NightfallServer, NightfallServerBuilder, PROTOCOL_VERSION, Payload,
    PlayerId, RoomCode, RoomConfig, Seat, ServerEvent, SessionConfig, SystemMessage,
};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn build_server() -> (NightfallServer<CannedNarrator>, String) {
    let server = NightfallServerBuilder::new()
        .bind("127.0.0.1:0")
        .room_config(RoomConfig::default())
        .build(CannedNarrator)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    (server, addr)
}

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let (server, addr) = build_server().await;
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

/// Like [`start_server`], but stops when the returned sender fires.
async fn start_stoppable_server() -> (String, oneshot::Sender<()>) {
    let (server, addr) = build_server().await;
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run_until(async {
                let _ = rx.await;
            })
            .await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, tx)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

fn encode_envelope(envelope: &Envelope) -> Message {
    let bytes = serde_json::to_vec(envelope).expect("encode");
    Message::Binary(bytes.into())
}

fn decode_envelope(msg: Message) -> Envelope {
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

async fn send_system(ws: &mut ClientWs, msg: SystemMessage) {
    let envelope = Envelope {
        seq: 1,
        timestamp: 0,
        payload: Payload::System(msg),
    };
    ws.send(encode_envelope(&envelope)).await.expect("send");
}

async fn send_action(ws: &mut ClientWs, action: ClientAction) {
    let envelope = Envelope {
        seq: 1,
        timestamp: 0,
        payload: Payload::Game(serde_json::to_vec(&action).expect("encode action")),
    };
    ws.send(encode_envelope(&envelope)).await.expect("send");
}

async fn recv(ws: &mut ClientWs) -> Envelope {
    let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("recv");
    decode_envelope(msg)
}

/// Reads frames until a system message arrives, skipping game events.
async fn recv_system(ws: &mut ClientWs) -> SystemMessage {
    loop {
        if let Payload::System(msg) = recv(ws).await.payload {
            return msg;
        }
    }
}

/// Reads frames until `pick` accepts a game event.
async fn recv_event<T>(ws: &mut ClientWs, mut pick: impl FnMut(ServerEvent) -> Option<T>) -> T {
    loop {
        if let Payload::Game(data) = recv(ws).await.payload {
            let event: ServerEvent = serde_json::from_slice(&data).expect("decode event");
            if let Some(found) = pick(event) {
                return found;
            }
        }
    }
}

/// Sends a handshake and returns the reply.
async fn handshake(ws: &mut ClientWs) -> SystemMessage {
    send_system(
        ws,
        SystemMessage::Handshake {
            version: PROTOCOL_VERSION,
        },
    )
    .await;
    recv_system(ws).await
}

/// Connects, handshakes, and hosts a room. Returns (socket, code, token).
async fn host(addr: &str) -> (ClientWs, RoomCode, String) {
    let mut ws = connect(addr).await;
    handshake(&mut ws).await;
    send_system(
        &mut ws,
        SystemMessage::HostRoom {
            code: None,
            theme: None,
        },
    )
    .await;
    match recv_system(&mut ws).await {
        SystemMessage::RoomHosted { code, token } => (ws, code, token),
        other => panic!("expected RoomHosted, got {other:?}"),
    }
}

/// Connects, handshakes, and joins `code`. Returns (socket, id, token).
async fn join(addr: &str, code: &RoomCode, name: &str) -> (ClientWs, PlayerId, String) {
    let mut ws = connect(addr).await;
    handshake(&mut ws).await;
    send_system(
        &mut ws,
        SystemMessage::JoinRoom {
            code: code.clone(),
            name: name.to_string(),
            avatar: "owl".to_string(),
        },
    )
    .await;
    match recv_system(&mut ws).await {
        SystemMessage::RoomJoined {
            player_id, token, ..
        } => (ws, player_id, token),
        other => panic!("expected RoomJoined, got {other:?}"),
    }
}

fn expect_error(msg: SystemMessage) -> u16 {
    match msg {
        SystemMessage::Error { code, .. } => code,
        other => panic!("expected Error, got {other:?}"),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_handshake_success() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let ack = handshake(&mut ws).await;
    assert!(matches!(ack, SystemMessage::HandshakeAck { .. }));
}

#[tokio::test]
async fn test_handshake_version_mismatch() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_system(&mut ws, SystemMessage::Handshake { version: 999 }).await;

    assert_eq!(expect_error(recv_system(&mut ws).await), 400);
}

#[tokio::test]
async fn test_handshake_non_handshake_first_message() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_system(&mut ws, SystemMessage::Heartbeat { client_time: 0 }).await;

    assert_eq!(expect_error(recv_system(&mut ws).await), 400);
}

#[tokio::test]
async fn test_heartbeat_response() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    send_system(&mut ws, SystemMessage::Heartbeat { client_time: 12345 }).await;

    match recv_system(&mut ws).await {
        SystemMessage::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 12345),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_envelope_ignored() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    ws.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");
    send_system(&mut ws, SystemMessage::Heartbeat { client_time: 999 }).await;

    assert!(matches!(
        recv_system(&mut ws).await,
        SystemMessage::HeartbeatAck { client_time: 999, .. }
    ));
}

#[tokio::test]
async fn test_host_room_returns_code_token_and_lobby_snapshot() {
    let addr = start_server().await;
    let (mut ws, code, token) = host(&addr).await;

    assert_eq!(code.as_str().len(), 4);
    assert!(!token.is_empty());
    let snapshot = recv_event(&mut ws, |event| match event {
        ServerEvent::Snapshot(s) => Some(s),
        _ => None,
    })
    .await;
    assert_eq!(snapshot.code, code);
    assert!(snapshot.players.is_empty());
}

#[tokio::test]
async fn test_host_room_requested_code_taken_returns_409() {
    let addr = start_server().await;
    let (_host, code, _) = host(&addr).await;

    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;
    send_system(
        &mut ws,
        SystemMessage::HostRoom {
            code: Some(code),
            theme: None,
        },
    )
    .await;

    assert_eq!(expect_error(recv_system(&mut ws).await), 409);
}

#[tokio::test]
async fn test_join_room_broadcasts_snapshot_to_host() {
    let addr = start_server().await;
    let (mut host_ws, code, _) = host(&addr).await;

    let (_player, player_id, token) = join(&addr, &code, "ada").await;

    assert!(!token.is_empty());
    let names = recv_event(&mut host_ws, |event| match event {
        ServerEvent::Snapshot(s) if !s.players.is_empty() => {
            Some(s.players.into_iter().map(|p| (p.id, p.name)).collect::<Vec<_>>())
        }
        _ => None,
    })
    .await;
    assert_eq!(names, vec![(player_id, "ada".to_string())]);
}

#[tokio::test]
async fn test_join_room_duplicate_name_returns_409() {
    let addr = start_server().await;
    let (_host, code, _) = host(&addr).await;
    let (_first, _, _) = join(&addr, &code, "ada").await;

    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;
    send_system(
        &mut ws,
        SystemMessage::JoinRoom {
            code,
            name: "ADA".to_string(),
            avatar: String::new(),
        },
    )
    .await;

    assert_eq!(expect_error(recv_system(&mut ws).await), 409);
}

#[tokio::test]
async fn test_join_room_unknown_code_returns_404() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    send_system(
        &mut ws,
        SystemMessage::JoinRoom {
            code: RoomCode::parse("ZZZZ").unwrap(),
            name: "ada".to_string(),
            avatar: String::new(),
        },
    )
    .await;

    assert_eq!(expect_error(recv_system(&mut ws).await), 404);
}

#[tokio::test]
async fn test_join_room_while_bound_returns_409() {
    let addr = start_server().await;
    let (_host, code, _) = host(&addr).await;
    let (mut ws, _, _) = join(&addr, &code, "ada").await;

    send_system(
        &mut ws,
        SystemMessage::JoinRoom {
            code,
            name: "bea".to_string(),
            avatar: String::new(),
        },
    )
    .await;

    assert_eq!(expect_error(recv_system(&mut ws).await), 409);
}

#[tokio::test]
async fn test_reconnect_invalid_token_returns_401() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    send_system(
        &mut ws,
        SystemMessage::Reconnect {
            token: "not-a-token".to_string(),
        },
    )
    .await;

    assert_eq!(expect_error(recv_system(&mut ws).await), 401);
}

#[tokio::test]
async fn test_game_message_not_in_room_returns_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;

    send_action(&mut ws, ClientAction::Ready).await;

    match recv_system(&mut ws).await {
        SystemMessage::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("not in a room"));
        }
        other => panic!("expected Error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_game_message_malformed_returns_400() {
    let addr = start_server().await;
    let (mut ws, _, _) = host(&addr).await;

    let envelope = Envelope {
        seq: 1,
        timestamp: 0,
        payload: Payload::Game(br#"{"action":"fly"}"#.to_vec()),
    };
    ws.send(encode_envelope(&envelope)).await.expect("send");

    assert_eq!(expect_error(recv_system(&mut ws).await), 400);
}

#[tokio::test]
async fn test_start_game_from_player_rejected_with_403() {
    let addr = start_server().await;
    let (_host, code, _) = host(&addr).await;
    let (mut ws, _, _) = join(&addr, &code, "ada").await;

    send_action(&mut ws, ClientAction::StartGame).await;

    let rejected = recv_event(&mut ws, |event| match event {
        ServerEvent::ActionRejected { code, .. } => Some(code),
        _ => None,
    })
    .await;
    assert_eq!(rejected, 403);
}

#[tokio::test]
async fn test_start_game_deals_each_player_their_own_role() {
    let addr = start_server().await;
    let (mut host_ws, code, _) = host(&addr).await;
    let mut players = Vec::new();
    for name in ["ada", "bea", "cal", "dov"] {
        players.push(join(&addr, &code, name).await);
    }

    send_action(&mut host_ws, ClientAction::StartGame).await;

    for (ws, id, _) in &mut players {
        let owner = recv_event(ws, |event| match event {
            ServerEvent::SecretRole { player_id, .. } => Some(player_id),
            _ => None,
        })
        .await;
        assert_eq!(owner, *id);
    }
}

#[tokio::test]
async fn test_reconnect_after_drop_restores_seat_and_role() {
    let addr = start_server().await;
    let (mut host_ws, code, _) = host(&addr).await;
    let mut players = Vec::new();
    for name in ["ada", "bea", "cal", "dov"] {
        players.push(join(&addr, &code, name).await);
    }
    send_action(&mut host_ws, ClientAction::StartGame).await;

    let (mut ws, id, token) = players.remove(0);
    let dealt = recv_event(&mut ws, |event| match event {
        ServerEvent::SecretRole { role, .. } => Some(role),
        _ => None,
    })
    .await;
    drop(ws);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;
    send_system(&mut ws, SystemMessage::Reconnect { token }).await;

    match recv_system(&mut ws).await {
        SystemMessage::Reconnected {
            code: back, seat, ..
        } => {
            assert_eq!(back, code);
            assert_eq!(seat, Seat::Player(id));
        }
        other => panic!("expected Reconnected, got {other:?}"),
    }
    let restored = recv_event(&mut ws, |event| match event {
        ServerEvent::SecretRole { player_id, role } if player_id == id => Some(role),
        _ => None,
    })
    .await;
    assert_eq!(restored, dealt);
}

#[tokio::test]
async fn test_reconnect_while_connected_replaces_old_connection() {
    let addr = start_server().await;
    let (_host, code, _) = host(&addr).await;
    let (mut old, id, token) = join(&addr, &code, "ada").await;

    let mut new = connect(&addr).await;
    handshake(&mut new).await;
    send_system(&mut new, SystemMessage::Reconnect { token }).await;

    assert!(matches!(
        recv_system(&mut new).await,
        SystemMessage::Reconnected { seat: Seat::Player(p), .. } if p == id
    ));
    assert!(matches!(
        recv_system(&mut old).await,
        SystemMessage::Disconnect { .. }
    ));
}

#[tokio::test]
async fn test_reconnect_after_grace_returns_410_and_stays_unbound() {
    let server = NightfallServerBuilder::new()
        .bind("127.0.0.1:0")
        .session_config(SessionConfig {
            reconnect_grace: Duration::from_millis(100),
        })
        .sweep_interval(Duration::from_secs(3600))
        .build(CannedNarrator)
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr").to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (mut host_ws, code, _) = host(&addr).await;
    let mut players = Vec::new();
    for name in ["ada", "bea", "cal", "dov"] {
        players.push(join(&addr, &code, name).await);
    }
    send_action(&mut host_ws, ClientAction::StartGame).await;
    let (ws, _, token) = players.remove(0);
    drop(ws);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut ws = connect(&addr).await;
    handshake(&mut ws).await;
    send_system(&mut ws, SystemMessage::Reconnect { token }).await;
    assert_eq!(expect_error(recv_system(&mut ws).await), 410);

    send_action(&mut ws, ClientAction::Ready).await;
    assert_eq!(expect_error(recv_system(&mut ws).await), 400);
}

#[tokio::test]
async fn test_leave_room_in_lobby_revokes_token() {
    let addr = start_server().await;
    let (_host, code, _) = host(&addr).await;
    let (mut ws, _, token) = join(&addr, &code, "ada").await;

    send_system(&mut ws, SystemMessage::LeaveRoom).await;
    send_system(&mut ws, SystemMessage::Reconnect { token }).await;
    assert_eq!(expect_error(recv_system(&mut ws).await), 401);
}

#[tokio::test]
async fn test_host_leave_closes_room_for_players() {
    let addr = start_server().await;
    let (mut host_ws, code, _) = host(&addr).await;
    let (mut ws, _, _) = join(&addr, &code, "ada").await;

    send_system(&mut host_ws, SystemMessage::LeaveRoom).await;

    match recv_system(&mut ws).await {
        SystemMessage::RoomClosed { code: closed, .. } => assert_eq!(closed, code),
        other => panic!("expected RoomClosed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_run_until_shutdown_closes_every_room() {
    let (addr, shutdown) = start_stoppable_server().await;
    let (mut host_ws, code, _) = host(&addr).await;

    let _ = shutdown.send(());

    match recv_system(&mut host_ws).await {
        SystemMessage::RoomClosed { code: closed, reason } => {
            assert_eq!(closed, code);
            assert!(reason.contains("shutting down"));
        }
        other => panic!("expected RoomClosed, got {other:?}"),
    }
}
