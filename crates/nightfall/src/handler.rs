//! Per-connection handler: handshake, seat binding, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version → send HandshakeAck
//!   2. Loop over inbound frames and, once bound, the room's outbound
//!      channel
//!   3. HostRoom / JoinRoom / Reconnect bind the connection to one seat;
//!      game payloads are forwarded to that seat's room

use std::sync::Arc;
use std::time::Duration;

use nightfall_engine::ClientAction;
use nightfall_protocol::{
    Codec, Envelope, PROTOCOL_VERSION, Payload, ProtocolError, RoomCode, Seat, SystemMessage,
};
use nightfall_room::{Narrator, RoomError, RoomHandle, RoomOutbound};
use nightfall_session::{SessionError, SessionKey};
use nightfall_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::NightfallError;
use crate::server::ServerState;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// The seat this connection currently speaks for.
struct Bound {
    room: RoomHandle,
    key: SessionKey,
    outbound: mpsc::UnboundedReceiver<RoomOutbound>,
}

/// Drop guard that releases the connection's seat when the handler exits.
///
/// Cleanup happens even if the handler panics. `Drop` is synchronous, so
/// the async part runs in a fire-and-forget task.
struct SeatGuard<N: Narrator> {
    conn_id: ConnectionId,
    state: Arc<ServerState<N>>,
    bound: Option<Bound>,
}

impl<N: Narrator> Drop for SeatGuard<N> {
    fn drop(&mut self) {
        let Some(bound) = self.bound.take() else {
            return;
        };
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _ = bound.room.disconnect(bound.key.seat, conn_id).await;
            let _ = state.sessions.lock().await.disconnect(&bound.key);
        });
    }
}

/// What the loop should do after a message is handled.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<N: Narrator>(
    conn: WebSocketConnection,
    state: Arc<ServerState<N>>,
) -> Result<(), NightfallError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    perform_handshake(&conn, &state).await?;
    tracing::debug!(%conn_id, "handshake complete");

    let mut guard = SeatGuard {
        conn_id,
        state: Arc::clone(&state),
        bound: None,
    };

    // --- Step 2: Message loop ---
    let mut seq: u64 = 1;
    let mut idle_deadline = Instant::now() + state.idle_timeout;

    loop {
        tokio::select! {
            received = tokio::time::timeout_at(idle_deadline, conn.recv()) => {
                let data = match received {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%conn_id, "connection timed out");
                        break;
                    }
                };
                idle_deadline = Instant::now() + state.idle_timeout;

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                        continue;
                    }
                };

                let flow = match envelope.payload {
                    Payload::System(msg) => {
                        handle_system_message(&conn, &state, &mut guard, msg, &mut seq).await?
                    }
                    Payload::Game(data) => {
                        handle_game_message(&conn, &state, &guard, data, &mut seq).await?;
                        Flow::Continue
                    }
                };
                if matches!(flow, Flow::Close) {
                    break;
                }
            }
            outbound = next_outbound(&mut guard.bound) => {
                if matches!(
                    forward_outbound(&conn, &state, &mut guard, outbound, &mut seq).await?,
                    Flow::Close
                ) {
                    break;
                }
            }
        }
    }

    // guard drops here → room and session hear about the disconnect.
    Ok(())
}

/// Waits for the next room message, or forever while unbound.
async fn next_outbound(bound: &mut Option<Bound>) -> Option<RoomOutbound> {
    match bound {
        Some(bound) => bound.outbound.recv().await,
        None => std::future::pending().await,
    }
}

/// Writes one room message to the client.
async fn forward_outbound<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    guard: &mut SeatGuard<N>,
    outbound: Option<RoomOutbound>,
    seq: &mut u64,
) -> Result<Flow, NightfallError> {
    match outbound {
        Some(RoomOutbound::Event(event)) => {
            let data = state.codec.encode(&event)?;
            send_payload(conn, state, Payload::Game(data), next_seq(seq)).await?;
            Ok(Flow::Continue)
        }
        Some(RoomOutbound::Replaced) => {
            // The new connection owns the seat now; nothing to report.
            guard.bound = None;
            let reason = "seat taken over by another connection".to_string();
            send_payload(
                conn,
                state,
                Payload::System(SystemMessage::Disconnect { reason }),
                next_seq(seq),
            )
            .await?;
            let _ = conn.close().await;
            Ok(Flow::Close)
        }
        Some(RoomOutbound::Closed { reason }) => {
            if let Some(bound) = guard.bound.take() {
                let code = bound.key.room;
                send_payload(
                    conn,
                    state,
                    Payload::System(SystemMessage::RoomClosed { code, reason }),
                    next_seq(seq),
                )
                .await?;
            }
            Ok(Flow::Continue)
        }
        None => {
            if let Some(bound) = guard.bound.take() {
                tracing::warn!(room = %bound.key.room, conn_id = %guard.conn_id, "room stopped without notice");
            }
            Ok(Flow::Continue)
        }
    }
}

/// Performs the initial handshake: receive Handshake, validate, send Ack.
async fn perform_handshake<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
) -> Result<(), NightfallError> {
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(NightfallError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;

    let version = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version }) => version,
        _ => {
            send_error(conn, state, 400, "expected Handshake", 0).await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Handshake".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            state,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            0,
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let server_time = state.elapsed_ms();
    send_payload(
        conn,
        state,
        Payload::System(SystemMessage::HandshakeAck { server_time }),
        0,
    )
    .await
}

/// Handles a system message.
async fn handle_system_message<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    guard: &mut SeatGuard<N>,
    msg: SystemMessage,
    seq: &mut u64,
) -> Result<Flow, NightfallError> {
    let conn_id = conn.id();

    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let ack = SystemMessage::HeartbeatAck {
                client_time,
                server_time: state.elapsed_ms(),
            };
            send_payload(conn, state, Payload::System(ack), next_seq(seq)).await?;
        }

        SystemMessage::HostRoom { code, theme } => {
            if guard.bound.is_some() {
                return already_bound(conn, state, seq).await;
            }
            // Lock only for the registry call, drop before touching the room.
            let hosted = state.rooms.lock().await.host(code, theme.as_deref());
            let room = match hosted {
                Ok(room) => room,
                Err(e) => return reply_room_error(conn, state, &e, seq).await,
            };

            let (tx, rx) = mpsc::unbounded_channel();
            if let Err(e) = room.attach_host(conn_id, tx).await {
                return reply_room_error(conn, state, &e, seq).await;
            }
            let code = room.code().clone();
            let key = SessionKey::new(code.clone(), Seat::Host);
            let token = state.sessions.lock().await.create(key.clone()).reconnect_token.clone();
            guard.bound = Some(Bound {
                room,
                key,
                outbound: rx,
            });

            tracing::info!(room = %code, %conn_id, "room hosted");
            send_payload(
                conn,
                state,
                Payload::System(SystemMessage::RoomHosted { code, token }),
                next_seq(seq),
            )
            .await?;
        }

        SystemMessage::JoinRoom { code, name, avatar } => {
            if guard.bound.is_some() {
                return already_bound(conn, state, seq).await;
            }
            let lookup = state.rooms.lock().await.get(&code);
            let room = match lookup {
                Ok(room) => room,
                Err(e) => return reply_room_error(conn, state, &e, seq).await,
            };

            let (tx, rx) = mpsc::unbounded_channel();
            let player_id = match room.join(name, avatar, conn_id, tx).await {
                Ok(outcome) => outcome.player_id(),
                Err(e) => return reply_room_error(conn, state, &e, seq).await,
            };
            let key = SessionKey::new(code.clone(), Seat::Player(player_id));
            let token = state.sessions.lock().await.create(key.clone()).reconnect_token.clone();
            guard.bound = Some(Bound {
                room,
                key,
                outbound: rx,
            });

            send_payload(
                conn,
                state,
                Payload::System(SystemMessage::RoomJoined {
                    code,
                    player_id,
                    token,
                }),
                next_seq(seq),
            )
            .await?;
        }

        SystemMessage::Reconnect { token } => {
            if guard.bound.is_some() {
                return already_bound(conn, state, seq).await;
            }
            let resolved = state.sessions.lock().await.resolve(&token);
            let key = match resolved {
                Ok(key) => key,
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "reconnect refused");
                    send_error(conn, state, e.code(), &e.to_string(), next_seq(seq)).await?;
                    return Ok(Flow::Continue);
                }
            };

            let lookup = state.rooms.lock().await.get(&key.room);
            let room = match lookup {
                Ok(room) => room,
                Err(_) => return reply_room_gone(conn, state, &key.room, seq).await,
            };
            // The session is re-checked, the room rebinds and the session
            // commits under one sessions lock, so expiry cannot land between
            // the rebind and the commit.
            let (tx, rx) = mpsc::unbounded_channel();
            let committed = {
                let mut sessions = state.sessions.lock().await;
                match sessions.resolve(&token) {
                    Ok(current) if current == key => {
                        match room.reconnect(key.seat, conn_id, tx).await {
                            Ok(()) => sessions
                                .mark_connected(&key)
                                .map(|session| session.reconnect_token.clone())
                                .map_err(NightfallError::from),
                            Err(e) => Err(NightfallError::from(e)),
                        }
                    }
                    Ok(_) => Err(NightfallError::from(SessionError::InvalidToken)),
                    Err(e) => Err(NightfallError::from(e)),
                }
            };
            let token = match committed {
                Ok(token) => token,
                Err(NightfallError::Room(e)) => return reply_room_error(conn, state, &e, seq).await,
                Err(NightfallError::Session(e)) => {
                    tracing::debug!(%conn_id, error = %e, "reconnect refused");
                    send_error(conn, state, e.code(), &e.to_string(), next_seq(seq)).await?;
                    return Ok(Flow::Continue);
                }
                Err(e) => return Err(e),
            };

            let code = key.room.clone();
            let seat = key.seat;
            guard.bound = Some(Bound {
                room,
                key,
                outbound: rx,
            });
            tracing::info!(room = %code, %seat, %conn_id, "seat reclaimed");
            send_payload(
                conn,
                state,
                Payload::System(SystemMessage::Reconnected { code, seat, token }),
                next_seq(seq),
            )
            .await?;
        }

        SystemMessage::LeaveRoom => {
            let Some(bound) = guard.bound.take() else {
                send_error(conn, state, 400, "not in a room", next_seq(seq)).await?;
                return Ok(Flow::Continue);
            };
            let removed = bound
                .room
                .leave(bound.key.seat, conn_id)
                .await
                .unwrap_or(true);
            let mut sessions = state.sessions.lock().await;
            if removed {
                sessions.remove(&bound.key);
            } else {
                let _ = sessions.disconnect(&bound.key);
            }
            tracing::info!(room = %bound.key.room, seat = %bound.key.seat, removed, "left room");
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%conn_id, %reason, "client disconnected");
            return Ok(Flow::Close);
        }

        _ => {
            tracing::debug!(%conn_id, "ignoring unexpected system message");
        }
    }

    Ok(Flow::Continue)
}

/// Handles a game message: decode, forward to the bound seat's room.
///
/// Refusals from the game itself come back asynchronously as an
/// `action_rejected` event on the room channel.
async fn handle_game_message<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    guard: &SeatGuard<N>,
    data: Vec<u8>,
    seq: &mut u64,
) -> Result<(), NightfallError> {
    let Some(bound) = guard.bound.as_ref() else {
        return send_error(conn, state, 400, "not in a room", next_seq(seq)).await;
    };

    let action: ClientAction = match state.codec.decode(&data) {
        Ok(action) => action,
        Err(e) => {
            return send_error(
                conn,
                state,
                400,
                &format!("invalid game message: {e}"),
                next_seq(seq),
            )
            .await;
        }
    };

    if let Err(e) = bound.room.act(bound.key.seat, conn.id(), action).await {
        send_error(conn, state, e.code(), &e.to_string(), next_seq(seq)).await?;
    }
    Ok(())
}

async fn already_bound<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    seq: &mut u64,
) -> Result<Flow, NightfallError> {
    send_error(conn, state, 409, "connection is already bound to a seat", next_seq(seq)).await?;
    Ok(Flow::Continue)
}

async fn reply_room_error<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    err: &RoomError,
    seq: &mut u64,
) -> Result<Flow, NightfallError> {
    tracing::debug!(conn_id = %conn.id(), error = %err, "room request refused");
    send_error(conn, state, err.code(), &err.to_string(), next_seq(seq)).await?;
    Ok(Flow::Continue)
}

/// A token that outlived its room is reported as gone, not unknown.
async fn reply_room_gone<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    code: &RoomCode,
    seq: &mut u64,
) -> Result<Flow, NightfallError> {
    state.sessions.lock().await.remove_room(code);
    send_error(conn, state, 410, &format!("room {code} is gone"), next_seq(seq)).await?;
    Ok(Flow::Continue)
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    code: u16,
    message: &str,
    seq: u64,
) -> Result<(), NightfallError> {
    let payload = Payload::System(SystemMessage::Error {
        code,
        message: message.to_string(),
    });
    send_payload(conn, state, payload, seq).await
}

/// Wraps `payload` in an envelope and writes it, as a text frame when the
/// codec produces text.
async fn send_payload<N: Narrator>(
    conn: &WebSocketConnection,
    state: &ServerState<N>,
    payload: Payload,
    seq: u64,
) -> Result<(), NightfallError> {
    let envelope = Envelope {
        seq,
        timestamp: state.elapsed_ms(),
        payload,
    };
    let bytes = state.codec.encode(&envelope)?;
    if state.codec.is_text() {
        let text = String::from_utf8(bytes)
            .map_err(|e| ProtocolError::InvalidMessage(format!("codec produced non-UTF-8 text: {e}")))?;
        conn.send_text(&text).await?;
    } else {
        conn.send(&bytes).await?;
    }
    Ok(())
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
