//! `NightfallServer` builder and server loop.
//!
//! This is the entry point for running a Nightfall server. It ties the
//! layers together: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nightfall_protocol::{JsonCodec, RoomCode, Seat};
use nightfall_room::{Narrator, RoomConfig, RoomRegistry};
use nightfall_session::{SessionConfig, SessionManager};
use nightfall_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::handler::handle_connection;
use crate::{NightfallError, ServerConfig};

/// How often stale sessions and closed rooms are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The two
/// locks are never held at the same time.
pub(crate) struct ServerState<N: Narrator> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomRegistry<N>>,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
    /// Wire timestamps are milliseconds since this instant.
    pub(crate) started: Instant,
}

impl<N: Narrator> ServerState<N> {
    pub(crate) fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Nightfall server.
///
/// ```rust,no_run
/// # use nightfall::{CannedNarrator, NightfallServerBuilder};
/// # async fn serve() -> Result<(), nightfall::NightfallError> {
/// let server = NightfallServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(CannedNarrator)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct NightfallServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    session_config: SessionConfig,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl NightfallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: defaults.room,
            session_config: defaults.session,
            idle_timeout: defaults.idle_timeout,
            sweep_interval: SWEEP_INTERVAL,
        }
    }

    /// Starts from a loaded [`ServerConfig`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self::new()
            .bind(&config.bind)
            .room_config(config.room)
            .session_config(config.session)
            .idle_timeout(config.idle_timeout)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the rules and timeouts every hosted room uses.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Drops connections that send nothing for this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how often expired sessions and closed rooms are cleaned up.
    pub fn sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = every;
        self
    }

    /// Binds the listener and builds the server around `narrator`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<N: Narrator>(
        self,
        narrator: N,
    ) -> Result<NightfallServer<N>, NightfallError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            rooms: Mutex::new(RoomRegistry::new(self.room_config, narrator)),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            started: Instant::now(),
        });

        Ok(NightfallServer {
            transport,
            state,
            sweep_interval: self.sweep_interval,
        })
    }
}

impl Default for NightfallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Nightfall server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct NightfallServer<N: Narrator> {
    transport: WebSocketTransport,
    state: Arc<ServerState<N>>,
    sweep_interval: Duration,
}

impl<N: Narrator> NightfallServer<N> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NightfallError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), NightfallError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then closes every
    /// room so bound clients are told why.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), NightfallError> {
        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            "Nightfall server running"
        );
        let sweeper = tokio::spawn(sweep(Arc::clone(&self.state), self.sweep_interval));
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        sweeper.abort();
        self.transport.shutdown().await?;
        self.state
            .rooms
            .lock()
            .await
            .shutdown_all("the server is shutting down")
            .await;
        Ok(())
    }
}

/// Periodic cleanup: expires sessions past their grace, closes rooms
/// whose host can no longer come back, and drops the sessions of rooms
/// that have stopped.
async fn sweep<N: Narrator>(state: Arc<ServerState<N>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let orphaned: Vec<RoomCode> = {
            let mut sessions = state.sessions.lock().await;
            let expired = sessions.expire_stale();
            sessions.cleanup_expired();
            expired
                .into_iter()
                .filter(|key| key.seat == Seat::Host)
                .map(|key| key.room)
                .collect()
        };

        let gone = {
            let mut rooms = state.rooms.lock().await;
            for code in &orphaned {
                if rooms.destroy(code, "the host did not return").await.is_ok() {
                    tracing::info!(room = %code, "host session expired, room closed");
                }
            }
            let mut gone = rooms.reap_closed();
            gone.extend(orphaned);
            gone
        };

        if !gone.is_empty() {
            let mut sessions = state.sessions.lock().await;
            for code in &gone {
                let dropped = sessions.remove_room(code);
                tracing::debug!(room = %code, dropped, "sessions dropped for closed room");
            }
        }
    }
}
