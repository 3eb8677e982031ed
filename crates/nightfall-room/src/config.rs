//! Room configuration.

use std::time::Duration;

use nightfall_engine::Rules;

/// Settings shared by every room a registry hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Game rules handed to each new [`RoomState`](nightfall_engine::RoomState).
    pub rules: Rules,

    /// Upper bound on one narrator call. The canned fallback is used when
    /// it runs out.
    pub narrative_timeout: Duration,

    /// How long a room survives without a connected host screen.
    pub host_grace: Duration,

    /// Capacity of each room's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            rules: Rules::default(),
            narrative_timeout: Duration::from_secs(3),
            host_grace: Duration::from_secs(600),
            channel_size: 64,
        }
    }
}
