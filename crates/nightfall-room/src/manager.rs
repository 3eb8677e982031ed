//! Room registry: creates, tracks, and tears down rooms by code.

use std::collections::HashMap;
use std::sync::Arc;

use nightfall_protocol::RoomCode;
use rand::Rng;

use crate::room::spawn_room;
use crate::{Narrator, RoomConfig, RoomError, RoomHandle};

/// Length of generated room codes.
pub const CODE_LEN: usize = 4;

/// Letters used for generated codes. `I` and `O` are left out so codes
/// read unambiguously off a shared screen.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

/// All live rooms of one server.
///
/// Owned by the server state and passed in explicitly; there is no global
/// room table.
pub struct RoomRegistry<N: Narrator> {
    rooms: HashMap<RoomCode, RoomHandle>,
    config: RoomConfig,
    narrator: Arc<N>,
}

impl<N: Narrator> RoomRegistry<N> {
    pub fn new(config: RoomConfig, narrator: N) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            narrator: Arc::new(narrator),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room and returns its handle.
    ///
    /// A requested code is used as given if no live room holds it;
    /// otherwise a fresh code is generated.
    pub fn host(
        &mut self,
        code: Option<RoomCode>,
        theme: Option<&str>,
    ) -> Result<RoomHandle, RoomError> {
        let code = match code {
            Some(code) if self.is_live(&code) => return Err(RoomError::CodeTaken(code)),
            Some(code) => code,
            None => self.fresh_code(),
        };

        let handle = spawn_room(
            code.clone(),
            theme,
            self.config.clone(),
            Arc::clone(&self.narrator),
        )?;
        self.rooms.insert(code.clone(), handle.clone());
        tracing::info!(room = %code, rooms = self.rooms.len(), "room created");
        Ok(handle)
    }

    /// Looks up a live room.
    pub fn get(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .filter(|h| !h.is_closed())
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Shuts a room down and forgets it.
    pub async fn destroy(&mut self, code: &RoomCode, reason: &str) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        let _ = handle.shutdown(reason).await;
        tracing::info!(room = %code, "room destroyed");
        Ok(())
    }

    /// Forgets rooms whose actor has stopped and returns their codes.
    pub fn reap_closed(&mut self) -> Vec<RoomCode> {
        let closed: Vec<RoomCode> = self
            .rooms
            .iter()
            .filter(|(_, h)| h.is_closed())
            .map(|(code, _)| code.clone())
            .collect();
        for code in &closed {
            self.rooms.remove(code);
            tracing::info!(room = %code, "closed room reaped");
        }
        closed
    }

    /// Shuts every room down.
    pub async fn shutdown_all(&mut self, reason: &str) {
        for (code, handle) in self.rooms.drain() {
            if handle.shutdown(reason).await.is_err() {
                tracing::debug!(room = %code, "room already stopped");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    fn is_live(&self, code: &RoomCode) -> bool {
        self.rooms.get(code).is_some_and(|h| !h.is_closed())
    }

    fn fresh_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let raw: String = (0..CODE_LEN)
                .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
                .collect();
            if let Ok(code) = RoomCode::parse(&raw) {
                if !self.is_live(&code) {
                    return code;
                }
            }
        }
    }
}
