//! Room actor: an isolated Tokio task that owns one game.
//!
//! The actor is the only owner of its [`RoomState`]. Commands arrive on an
//! mpsc channel, timers are the state's own schedule, and narration comes
//! back on a private channel, all multiplexed in one `select!` loop. No
//! branch awaits while it mutates, so every command is applied atomically
//! and followed by one broadcast snapshot.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use nightfall_engine::{
    ClientAction, GameEvent, JoinOutcome, NarrativeRequest, Phase, RoomState, ServerEvent,
    Snapshot,
};
use nightfall_protocol::{PlayerId, RoomCode, Seat};
use nightfall_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::narrator::non_empty;
use crate::{Narrator, RoomConfig, RoomError, timer};

/// A message from the room actor to one bound connection.
#[derive(Debug, Clone)]
pub enum RoomOutbound {
    /// A game event to encode into a `Payload::Game` frame.
    Event(ServerEvent),
    /// Another connection took over this seat.
    Replaced,
    /// The room is gone.
    Closed { reason: String },
}

/// Channel sender for delivering outbound messages to a connection.
pub type SeatSender = mpsc::UnboundedSender<RoomOutbound>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Seat a player by name: a lobby join or a name reclaim.
    Join {
        name: String,
        avatar: String,
        conn: ConnectionId,
        sender: SeatSender,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },

    /// Bind a connection to a seat whose token was already verified.
    Reconnect {
        seat: Seat,
        conn: ConnectionId,
        sender: SeatSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A connection went away without saying goodbye.
    Disconnect { seat: Seat, conn: ConnectionId },

    /// A connection asked to leave. Replies `true` if the seat is gone for
    /// good and its session should be dropped.
    Leave {
        seat: Seat,
        conn: ConnectionId,
        reply: oneshot::Sender<bool>,
    },

    /// A game action from a bound connection.
    Action {
        seat: Seat,
        conn: ConnectionId,
        action: ClientAction,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown {
        reason: String,
    },
}

/// Room metadata plus the current public view.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: Phase,
    pub theme: &'static str,
    pub player_count: usize,
    pub connected_players: usize,
    pub host_connected: bool,
    pub snapshot: Snapshot,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it is just an `mpsc::Sender` wrapper.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Joins the lobby, or reclaims a disconnected seat by name mid-game.
    pub async fn join(
        &self,
        name: impl Into<String>,
        avatar: impl Into<String>,
        conn: ConnectionId,
        sender: SeatSender,
    ) -> Result<JoinOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            name: name.into(),
            avatar: avatar.into(),
            conn,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Binds the host screen to the room.
    pub async fn attach_host(
        &self,
        conn: ConnectionId,
        sender: SeatSender,
    ) -> Result<(), RoomError> {
        self.reconnect(Seat::Host, conn, sender).await
    }

    /// Rebinds `seat` to a new connection.
    ///
    /// The caller must already have verified the seat's token.
    pub async fn reconnect(
        &self,
        seat: Seat,
        conn: ConnectionId,
        sender: SeatSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Reconnect {
            seat,
            conn,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Reports a lost connection (fire-and-forget).
    pub async fn disconnect(&self, seat: Seat, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnect { seat, conn }).await
    }

    /// Leaves the room. Returns `true` if the seat was removed for good.
    pub async fn leave(&self, seat: Seat, conn: ConnectionId) -> Result<bool, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            seat,
            conn,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Sends a game action (fire-and-forget). A refusal comes back to the
    /// seat as [`ServerEvent::ActionRejected`].
    pub async fn act(
        &self,
        seat: Seat,
        conn: ConnectionId,
        action: ClientAction,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Action { seat, conn, action }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to close, notifying every bound connection.
    pub async fn shutdown(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown {
            reason: reason.into(),
        })
        .await
    }

    async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }
}

/// A connection currently speaking for a seat.
struct Binding {
    conn: ConnectionId,
    sender: SeatSender,
}

/// Narration text on its way back from a narrator task.
struct Narration {
    request: NarrativeRequest,
    text: String,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<N: Narrator> {
    state: RoomState,
    config: RoomConfig,
    narrator: Arc<N>,
    /// Seat → connection. Consulted only at the I/O boundary; game state
    /// never sees connection ids.
    bindings: HashMap<Seat, Binding>,
    /// Set while no host screen is bound.
    host_deadline: Option<Instant>,
    receiver: mpsc::Receiver<RoomCommand>,
    narration_tx: mpsc::UnboundedSender<Narration>,
    narration_rx: mpsc::UnboundedReceiver<Narration>,
}

impl<N: Narrator> RoomActor<N> {
    /// Runs the actor loop until shutdown, host timeout, or every handle
    /// is dropped.
    async fn run(mut self) {
        tracing::info!(
            room = %self.state.code(),
            theme = self.state.theme().id,
            "room actor started"
        );

        let reason = loop {
            let game_deadline = self.state.next_deadline();
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        break "room closed".to_string();
                    };
                    if let ControlFlow::Break(reason) = self.handle(cmd) {
                        break reason;
                    }
                }
                Some(narration) = self.narration_rx.recv() => {
                    self.handle_narration(narration);
                }
                () = timer::sleep_until(game_deadline) => {
                    let events = self.state.fire_due(Instant::now());
                    self.after_change(events);
                }
                () = timer::sleep_until(self.host_deadline) => {
                    tracing::info!(room = %self.state.code(), "host did not return");
                    break "the host did not return".to_string();
                }
            }
        };

        self.close(&reason);
        tracing::info!(room = %self.state.code(), %reason, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> ControlFlow<String> {
        match cmd {
            RoomCommand::Join {
                name,
                avatar,
                conn,
                sender,
                reply,
            } => {
                let result = self.handle_join(&name, &avatar, conn, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Reconnect {
                seat,
                conn,
                sender,
                reply,
            } => {
                let result = self.handle_reconnect(seat, conn, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { seat, conn } => self.handle_disconnect(seat, conn),
            RoomCommand::Leave { seat, conn, reply } => {
                if seat == Seat::Host && self.owns(seat, conn) {
                    let _ = reply.send(true);
                    return ControlFlow::Break("the host closed the room".to_string());
                }
                let removed = self.handle_leave(seat, conn);
                let _ = reply.send(removed);
            }
            RoomCommand::Action { seat, conn, action } => {
                self.handle_action(seat, conn, action);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown { reason } => {
                tracing::info!(room = %self.state.code(), %reason, "room shutting down");
                return ControlFlow::Break(reason);
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_join(
        &mut self,
        name: &str,
        avatar: &str,
        conn: ConnectionId,
        sender: SeatSender,
    ) -> Result<JoinOutcome, RoomError> {
        let outcome = self.state.join_or_reclaim(name, avatar).inspect_err(|e| {
            tracing::debug!(room = %self.state.code(), %conn, error = %e, "join rejected");
        })?;
        let player_id = outcome.player_id();
        self.bind(Seat::Player(player_id), conn, sender);
        tracing::info!(
            room = %self.state.code(),
            %player_id,
            %conn,
            reclaimed = matches!(outcome, JoinOutcome::Reclaimed(_)),
            players = self.state.players().len(),
            "player joined"
        );

        if let JoinOutcome::Reclaimed(id) = outcome {
            self.send_role(id);
        }
        self.broadcast_snapshot();
        Ok(outcome)
    }

    /// Binds a verified seat to `conn`. For a player the seat is marked
    /// connected, then the secret role and a snapshot follow, all before
    /// the next command is looked at.
    fn handle_reconnect(
        &mut self,
        seat: Seat,
        conn: ConnectionId,
        sender: SeatSender,
    ) -> Result<(), RoomError> {
        match seat {
            Seat::Host => {
                self.host_deadline = None;
                self.bind(seat, conn, sender);
                tracing::info!(room = %self.state.code(), %conn, "host attached");
            }
            Seat::Player(id) => {
                self.state
                    .reconnect(id)
                    .map_err(|_| RoomError::SeatGone(self.state.code().clone(), seat))?;
                self.bind(seat, conn, sender);
                self.send_role(id);
            }
        }
        self.broadcast_snapshot();
        Ok(())
    }

    fn handle_disconnect(&mut self, seat: Seat, conn: ConnectionId) {
        if !self.owns(seat, conn) {
            tracing::debug!(room = %self.state.code(), %seat, %conn, "ignoring stale disconnect");
            return;
        }
        self.bindings.remove(&seat);

        match seat {
            Seat::Host => {
                self.host_deadline = Some(Instant::now() + self.config.host_grace);
                tracing::info!(room = %self.state.code(), "host disconnected");
            }
            Seat::Player(id) => {
                if let Err(e) = self.state.disconnect(id) {
                    tracing::warn!(room = %self.state.code(), player_id = %id, error = %e, "disconnect for unknown seat");
                }
                self.broadcast_snapshot();
            }
        }
    }

    fn handle_leave(&mut self, seat: Seat, conn: ConnectionId) -> bool {
        let Seat::Player(id) = seat else {
            return false;
        };
        if !self.owns(seat, conn) {
            return false;
        }
        self.bindings.remove(&seat);
        let removed = self.state.disconnect(id).unwrap_or(false);
        tracing::info!(room = %self.state.code(), player_id = %id, removed, "player left");
        self.broadcast_snapshot();
        removed
    }

    fn handle_action(&mut self, seat: Seat, conn: ConnectionId, action: ClientAction) {
        if !self.owns(seat, conn) {
            tracing::debug!(room = %self.state.code(), %seat, %conn, "action from unbound connection");
            return;
        }
        let name = action.name();
        match self.state.apply(seat, action, Instant::now()) {
            Ok(events) => self.after_change(events),
            Err(e) => {
                tracing::debug!(
                    room = %self.state.code(),
                    %seat,
                    action = name,
                    error = %e,
                    "action rejected"
                );
                self.send_to(seat, RoomOutbound::Event(ServerEvent::rejected(&e)));
            }
        }
    }

    fn handle_narration(&mut self, narration: Narration) {
        if self.state.apply_narration(&narration.request, narration.text) {
            self.broadcast_snapshot();
        }
    }

    /// Delivers private messages the events call for, starts narration,
    /// then broadcasts one snapshot.
    fn after_change(&mut self, events: Vec<GameEvent>) {
        if events.contains(&GameEvent::RolesDealt) {
            let ids: Vec<PlayerId> = self.state.players().iter().map(|p| p.id).collect();
            for id in ids {
                self.send_role(id);
            }
        }
        if let Some(request) = self.state.narrative_for(&events) {
            self.spawn_narration(request);
        }
        self.broadcast_snapshot();
    }

    fn spawn_narration(&self, request: NarrativeRequest) {
        let narrator = Arc::clone(&self.narrator);
        let tx = self.narration_tx.clone();
        let timeout = self.config.narrative_timeout;
        let code = self.state.code().clone();

        tokio::spawn(async move {
            let outcome = time::timeout(timeout, narrator.narrate(request.clone())).await;
            let text = match outcome.map(|result| result.and_then(non_empty)) {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::warn!(room = %code, error = %e, "narrator failed, using fallback");
                    request.fallback()
                }
                Err(_) => {
                    tracing::warn!(room = %code, ?timeout, "narrator timed out, using fallback");
                    request.fallback()
                }
            };
            let _ = tx.send(Narration { request, text });
        });
    }

    /// Binds `seat` to `conn`, telling a different previous connection it
    /// was replaced.
    fn bind(&mut self, seat: Seat, conn: ConnectionId, sender: SeatSender) {
        let previous = self.bindings.insert(seat, Binding { conn, sender });
        if let Some(old) = previous.filter(|old| old.conn != conn) {
            tracing::info!(room = %self.state.code(), %seat, old = %old.conn, new = %conn, "seat taken over");
            let _ = old.sender.send(RoomOutbound::Replaced);
        }
    }

    fn owns(&self, seat: Seat, conn: ConnectionId) -> bool {
        self.bindings.get(&seat).is_some_and(|b| b.conn == conn)
    }

    fn send_role(&self, id: PlayerId) {
        if let Some(role) = self.state.role_of(id) {
            let event = ServerEvent::SecretRole {
                player_id: id,
                role: role.clone(),
            };
            self.send_to(Seat::Player(id), RoomOutbound::Event(event));
        }
    }

    fn broadcast_snapshot(&mut self) {
        let snapshot = self.state.snapshot(Instant::now());
        let outbound = RoomOutbound::Event(ServerEvent::Snapshot(snapshot));
        for binding in self.bindings.values() {
            let _ = binding.sender.send(outbound.clone());
        }
    }

    /// Sends to one seat. Silently drops if nothing is bound or the
    /// receiver is gone.
    fn send_to(&self, seat: Seat, outbound: RoomOutbound) {
        if let Some(binding) = self.bindings.get(&seat) {
            let _ = binding.sender.send(outbound);
        }
    }

    fn close(&mut self, reason: &str) {
        self.receiver.close();
        for (_, binding) in self.bindings.drain() {
            let _ = binding.sender.send(RoomOutbound::Closed {
                reason: reason.to_string(),
            });
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.state.code().clone(),
            phase: self.state.phase(),
            theme: self.state.theme().id,
            player_count: self.state.players().len(),
            connected_players: self.state.players().iter().filter(|p| p.connected).count(),
            host_connected: self.bindings.contains_key(&Seat::Host),
            snapshot: self.state.project(Instant::now()),
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// The room starts without a host; [`RoomHandle::attach_host`] should
/// follow, or the room closes after `host_grace`.
pub(crate) fn spawn_room<N: Narrator>(
    code: RoomCode,
    theme: Option<&str>,
    config: RoomConfig,
    narrator: Arc<N>,
) -> Result<RoomHandle, RoomError> {
    let now = Instant::now();
    let state = RoomState::new(code.clone(), theme, config.rules.clone(), now)?;
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let (narration_tx, narration_rx) = mpsc::unbounded_channel();

    let actor = RoomActor {
        state,
        host_deadline: Some(now + config.host_grace),
        config,
        narrator,
        bindings: HashMap::new(),
        receiver: rx,
        narration_tx,
        narration_rx,
    };

    tokio::spawn(actor.run());

    Ok(RoomHandle { code, sender: tx })
}
