use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable user identifier issued by the authentication layer.
/// The core never mints these; it only keys state by them.
pub type UserId = i64;

/// Room identifier, rendered on the wire as 128-bit lowercase hex.
pub type RoomId = Uuid;

/// Identifier for a single WebSocket connection. Distinguishes two
/// connections from the same user so that unregister stays idempotent
/// after a register-replaces-prior swap.
pub type ConnectionId = Uuid;

/// Maximum players admitted to a single room.
pub const MAX_PLAYERS: usize = 10;

/// Which game a room is configured to play.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    BlindTest,
    CategoryRace,
}

impl GameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlindTest => "blind_test",
            Self::CategoryRace => "category_race",
        }
    }
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    #[default]
    Waiting,
    Playing,
    Finished,
}

/// A track handed out by the external music catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub preview_url: String,
    #[serde(default)]
    pub image_url: String,
}
