//! Session manager: tracks every seat's session and its token.

use std::collections::HashMap;

use nightfall_protocol::RoomCode;
use rand::Rng;
use tokio::time::Instant;

use crate::{Session, SessionConfig, SessionError, SessionKey, SessionState};

/// Holds all active sessions, indexed both by seat and by token.
///
/// The token index keeps reconnect lookups O(1); both maps are always
/// updated together.
pub struct SessionManager {
    sessions: HashMap<SessionKey, Session>,
    tokens: HashMap<String, SessionKey>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            config,
        }
    }

    /// Issues a session for a freshly bound seat.
    ///
    /// A previous session for the same seat is replaced and its token
    /// revoked. That happens when a disconnected player reclaims their seat
    /// by name instead of by token.
    pub fn create(&mut self, key: SessionKey) -> &Session {
        if let Some(existing) = self.sessions.remove(&key) {
            self.tokens.remove(&existing.reconnect_token);
            tracing::debug!(%key, "replacing existing session");
        }

        let token = generate_token();
        self.tokens.insert(token.clone(), key.clone());
        tracing::info!(%key, "session created");

        self.sessions.entry(key.clone()).or_insert(Session {
            key,
            state: SessionState::Connected,
            reconnect_token: token,
        })
    }

    /// Marks a seat's connection as lost and starts its grace period.
    pub fn disconnect(&mut self, key: &SessionKey) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))?;

        if session.state == SessionState::Connected {
            session.state = SessionState::Disconnected {
                since: Instant::now(),
            };
            tracing::info!(%key, "seat disconnected, grace period started");
        }
        Ok(())
    }

    /// Looks up the seat a token names without changing its state.
    ///
    /// A `Connected` session resolves too: the newest connection presenting
    /// a valid token takes the seat over. A disconnected session whose grace
    /// has run out is marked `Expired` and rejected.
    pub fn resolve(&mut self, token: &str) -> Result<SessionKey, SessionError> {
        let key = self
            .tokens
            .get(token)
            .cloned()
            .ok_or(SessionError::InvalidToken)?;
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or(SessionError::InvalidToken)?;

        match session.state {
            SessionState::Connected => Ok(key),
            SessionState::Disconnected { since } => {
                if since.elapsed() >= self.config.reconnect_grace {
                    session.state = SessionState::Expired;
                    tracing::info!(%key, "session expired on reconnect");
                    return Err(SessionError::SessionExpired(key));
                }
                Ok(key)
            }
            SessionState::Expired => Err(SessionError::SessionExpired(key)),
        }
    }

    /// Marks a resolved seat as connected again.
    ///
    /// Callers resolve first, let the room accept the new connection, and
    /// only then call this, so a rejected reconnect leaves the session as
    /// it was.
    pub fn mark_connected(
        &mut self,
        key: &SessionKey,
    ) -> Result<&Session, SessionError> {
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))?;
        if session.state == SessionState::Expired {
            return Err(SessionError::SessionExpired(key.clone()));
        }
        session.state = SessionState::Connected;
        tracing::info!(%key, "seat reconnected");
        Ok(session)
    }

    /// [`resolve`](Self::resolve) followed by
    /// [`mark_connected`](Self::mark_connected).
    pub fn reconnect(&mut self, token: &str) -> Result<&Session, SessionError> {
        let key = self.resolve(token)?;
        self.mark_connected(&key)
    }

    /// Marks every session whose grace period has elapsed as `Expired`.
    ///
    /// Returns the keys that expired in this pass. Call
    /// [`cleanup_expired`](Self::cleanup_expired) afterwards to drop them.
    pub fn expire_stale(&mut self) -> Vec<SessionKey> {
        let grace = self.config.reconnect_grace;
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = session.state {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    expired.push(session.key.clone());
                    tracing::info!(
                        key = %session.key,
                        "session expired (grace period elapsed)"
                    );
                }
            }
        }

        expired
    }

    /// Removes all expired sessions and revokes their tokens.
    pub fn cleanup_expired(&mut self) {
        let tokens = &mut self.tokens;
        self.sessions.retain(|_, session| {
            if session.state == SessionState::Expired {
                tokens.remove(&session.reconnect_token);
                false
            } else {
                true
            }
        });
    }

    /// Drops one seat's session, e.g. when a player leaves for good.
    pub fn remove(&mut self, key: &SessionKey) -> Option<Session> {
        let session = self.sessions.remove(key)?;
        self.tokens.remove(&session.reconnect_token);
        Some(session)
    }

    /// Drops every session belonging to a room that no longer exists.
    /// Returns how many were removed.
    pub fn remove_room(&mut self, room: &RoomCode) -> usize {
        let before = self.sessions.len();
        let tokens = &mut self.tokens;
        self.sessions.retain(|key, session| {
            if &key.room == room {
                tokens.remove(&session.reconnect_token);
                false
            } else {
                true
            }
        });
        before - self.sessions.len()
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 16 random bytes as 32 lowercase hex characters.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
