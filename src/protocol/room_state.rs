use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::types::{GameKind, RoomId, RoomStatus, UserId, MAX_PLAYERS};

// ============================================================================
// ROOM LIFECYCLE
// ============================================================================
//
// ```text
// [*] --> Waiting: Room Created
//
// Waiting --> Playing: StartGame (host, all ready or solo)
// Playing --> Finished: Game completed
// Finished --> Playing: StartGame again (host restart)
//
// Waiting --> [*]: Idle > 2h (sweep)
// Finished --> [*]: Sweep
// Any --> [*]: Last player leaves
// ```
//
// A room in `Playing` admits no new players; a disconnected player keeps
// their slot (marked not connected) until they leave explicitly or the room
// is collected.
// ============================================================================

/// A member of a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub user_id: UserId,
    pub display_name: String,
    pub score: i32,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_connected: bool,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl Player {
    pub fn new(user_id: UserId, display_name: impl Into<String>, is_host: bool) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            score: 0,
            is_host,
            // The host created the room on purpose; everyone else opts in.
            is_ready: is_host,
            is_connected: true,
            joined_at: chrono::Utc::now(),
        }
    }
}

/// Blind Test room settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlindTestConfig {
    pub playlist: String,
    pub time_per_round: u64,
    pub total_rounds: u32,
}

impl Default for BlindTestConfig {
    fn default() -> Self {
        Self {
            playlist: "Pop".to_string(),
            time_per_round: 37,
            total_rounds: 10,
        }
    }
}

/// Category Race room settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRaceConfig {
    pub categories: Vec<String>,
    pub total_rounds: u32,
    pub time_per_round: u64,
    pub vote_time: u64,
    #[serde(default)]
    pub used_letters: Vec<char>,
}

impl Default for CategoryRaceConfig {
    fn default() -> Self {
        Self {
            categories: ["artiste", "album", "groupe", "instrument", "featuring"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            total_rounds: 9,
            time_per_round: 60,
            vote_time: 30,
            used_letters: Vec::new(),
        }
    }
}

/// Kind-specific room configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RoomConfig {
    BlindTest(BlindTestConfig),
    CategoryRace(CategoryRaceConfig),
}

impl RoomConfig {
    pub fn default_for(kind: GameKind) -> Self {
        match kind {
            GameKind::BlindTest => Self::BlindTest(BlindTestConfig::default()),
            GameKind::CategoryRace => Self::CategoryRace(CategoryRaceConfig::default()),
        }
    }

    pub fn as_blind_test(&self) -> Option<&BlindTestConfig> {
        match self {
            Self::BlindTest(cfg) => Some(cfg),
            Self::CategoryRace(_) => None,
        }
    }

    pub fn as_category_race(&self) -> Option<&CategoryRaceConfig> {
        match self {
            Self::CategoryRace(cfg) => Some(cfg),
            Self::BlindTest(_) => None,
        }
    }
}

/// Room configuration and state.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub name: String,
    pub host_id: UserId,
    pub kind: GameKind,
    pub status: RoomStatus,
    pub players: HashMap<UserId, Player>,
    pub config: RoomConfig,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
}

impl Room {
    pub fn new(
        name: String,
        code: String,
        host_id: UserId,
        host_name: String,
        kind: GameKind,
    ) -> Self {
        let now = chrono::Utc::now();
        let mut players = HashMap::new();
        players.insert(host_id, Player::new(host_id, host_name, true));
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            host_id,
            kind,
            status: RoomStatus::Waiting,
            players,
            config: RoomConfig::default_for(kind),
            created_at: now,
            last_activity: now,
        }
    }

    /// Update the last activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = chrono::Utc::now();
    }

    pub fn can_join(&self) -> bool {
        self.status != RoomStatus::Playing && self.players.len() < MAX_PLAYERS
    }

    /// A room is ready when it has at least one player and every member is
    /// both ready and connected. Solo play is legal.
    pub fn is_ready(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .values()
                .all(|p| p.is_ready && p.is_connected)
    }

    /// Remove a player. When the host leaves and others remain, the
    /// earliest-joined remaining player inherits the host role.
    pub fn remove_player(&mut self, user_id: UserId) -> Option<Player> {
        let removed = self.players.remove(&user_id)?;

        if removed.is_host {
            if let Some(successor) = self
                .players
                .values()
                .min_by_key(|p| (p.joined_at, p.user_id))
                .map(|p| p.user_id)
            {
                self.host_id = successor;
                if let Some(player) = self.players.get_mut(&successor) {
                    player.is_host = true;
                    player.is_ready = true;
                }
            }
        }

        Some(removed)
    }

    pub fn set_ready(&mut self, user_id: UserId, ready: bool) -> bool {
        match self.players.get_mut(&user_id) {
            Some(player) => {
                player.is_ready = ready;
                true
            }
            None => false,
        }
    }

    pub fn set_connected(&mut self, user_id: UserId, connected: bool) -> bool {
        match self.players.get_mut(&user_id) {
            Some(player) => {
                player.is_connected = connected;
                true
            }
            None => false,
        }
    }

    /// Zero every score. Called at game start.
    pub fn reset_scores(&mut self) {
        for player in self.players.values_mut() {
            player.score = 0;
        }
    }

    /// Users currently connected to the room.
    pub fn connected_users(&self) -> Vec<UserId> {
        self.players
            .values()
            .filter(|p| p.is_connected)
            .map(|p| p.user_id)
            .collect()
    }

    /// Whether the sweep should collect this room.
    pub fn is_expired(&self, idle_timeout: chrono::Duration) -> bool {
        match self.status {
            RoomStatus::Finished => true,
            RoomStatus::Waiting => {
                chrono::Utc::now().signed_duration_since(self.last_activity) > idle_timeout
            }
            RoomStatus::Playing => false,
        }
    }
}
