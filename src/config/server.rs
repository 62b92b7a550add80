//! Server behavior configuration types.

use super::defaults::{
    default_idle_room_timeout, default_max_players, default_sweep_interval,
};
use serde::{Deserialize, Serialize};

/// Room and player management configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Maximum players per room
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    /// Interval for the room eviction sweep (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
    /// Idle time after which a Waiting room is collected (seconds)
    #[serde(default = "default_idle_room_timeout")]
    pub idle_room_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players: default_max_players(),
            sweep_interval: default_sweep_interval(),
            idle_room_timeout: default_idle_room_timeout(),
        }
    }
}
