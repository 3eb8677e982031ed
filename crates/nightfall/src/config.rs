//! Server configuration.
//!
//! Every setting has a code-level default. The binary overlays
//! `NIGHTFALL_*` environment variables on top through
//! [`ServerConfig::from_env`].

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use nightfall_room::RoomConfig;
use nightfall_session::SessionConfig;
use thiserror::Error;

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default per-connection receive timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: "0.0.0.0:8080").
    pub bind: String,

    /// Game rules and per-room timeouts.
    pub room: RoomConfig,

    /// Reconnection grace for dropped seats.
    pub session: SessionConfig,

    /// A connection that sends nothing for this long is dropped.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDRESS.to_string(),
            room: RoomConfig::default(),
            session: SessionConfig::default(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECONDS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// Unset variables keep their defaults. A variable that is set but does
    /// not parse is an error rather than a silent fallback.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = vars.get("NIGHTFALL_BIND") {
            if bind.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "NIGHTFALL_BIND must not be empty".to_string(),
                ));
            }
            config.bind = bind.trim().to_string();
        }

        let rules = &mut config.room.rules;
        if let Some(n) = parse(vars, "NIGHTFALL_MIN_PLAYERS")? {
            rules.min_players = n;
        }
        if let Some(n) = parse(vars, "NIGHTFALL_MAX_PLAYERS")? {
            rules.max_players = n;
        }
        if let Some(secs) = parse(vars, "NIGHTFALL_LOCK_IN_SECS")? {
            rules.lock_in = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(vars, "NIGHTFALL_COUNTDOWN_SECS")? {
            rules.countdown = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(vars, "NIGHTFALL_RESOLUTION_DELAY_SECS")? {
            rules.resolution_delay = Duration::from_secs(secs);
        }
        if let Some(flag) = parse(vars, "NIGHTFALL_STORY_INTRO")? {
            rules.story_intro = flag;
        }
        if let Some(flag) = parse(vars, "NIGHTFALL_NAME_RECLAIM")? {
            rules.allow_name_reclaim = flag;
        }
        if rules.min_players > rules.max_players {
            return Err(ConfigError::InvalidValue(format!(
                "NIGHTFALL_MIN_PLAYERS ({}) exceeds NIGHTFALL_MAX_PLAYERS ({})",
                rules.min_players, rules.max_players
            )));
        }

        if let Some(ms) = parse(vars, "NIGHTFALL_NARRATIVE_TIMEOUT_MS")? {
            config.room.narrative_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse(vars, "NIGHTFALL_HOST_GRACE_SECS")? {
            config.room.host_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(vars, "NIGHTFALL_RECONNECT_GRACE_SECS")? {
            config.session.reconnect_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(vars, "NIGHTFALL_IDLE_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(ConfigError::InvalidValue(
                    "NIGHTFALL_IDLE_TIMEOUT_SECS must be positive".to_string(),
                ));
            }
            config.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(vars: &HashMap<String, String>, name: &str) -> Result<Option<T>, ConfigError> {
    vars.get(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw:?}")))
        })
        .transpose()
}
