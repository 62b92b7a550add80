//! WebSocket connection configuration types.

use super::defaults::{
    default_max_message_size, default_ping_period_secs, default_pong_wait_secs,
    default_send_queue_capacity, default_write_wait_secs,
};
use serde::{Deserialize, Serialize};

/// Per-connection transport limits and heartbeat cadence.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Read deadline: a connection missing pongs this long is closed (seconds)
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,
    /// Keepalive ping cadence (seconds)
    #[serde(default = "default_ping_period_secs")]
    pub ping_period_secs: u64,
    /// Write deadline for a single outbound frame (seconds)
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,
    /// Bounded per-connection outbound queue; overflow evicts the connection
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            pong_wait_secs: default_pong_wait_secs(),
            ping_period_secs: default_ping_period_secs(),
            write_wait_secs: default_write_wait_secs(),
            send_queue_capacity: default_send_queue_capacity(),
        }
    }
}

impl WebSocketConfig {
    /// Validate WebSocket configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ping_period_secs >= self.pong_wait_secs {
            anyhow::bail!(
                "websocket.ping_period_secs ({}) must be shorter than pong_wait_secs ({})",
                self.ping_period_secs,
                self.pong_wait_secs
            );
        }
        if self.send_queue_capacity == 0 {
            anyhow::bail!("websocket.send_queue_capacity must be at least 1");
        }
        if self.max_message_size < 64 {
            anyhow::bail!(
                "websocket.max_message_size must be at least 64 bytes (configured: {})",
                self.max_message_size
            );
        }
        Ok(())
    }
}
