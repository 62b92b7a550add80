//! Room lifecycle and membership management.
//!
//! All operations are local-memory and never block on I/O; the [`Store`]
//! mirror calls are spawned off and their failures logged, never propagated.
//! Cross-room indices (room table, code table) are concurrent maps; each
//! room's mutable state sits behind its own `RwLock`, acquired for the
//! duration of a single transition.

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::GamesConfig;
use crate::protocol::{
    generate_room_code, normalize_room_code, validation, ErrorCode, GameKind, Player,
    Room, RoomConfig, RoomId, RoomSnapshot, RoomStatus, UserId, CODE_ALLOCATION_ATTEMPTS,
};
use crate::store::Store;

/// Room operation failures surfaced to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("invalid room name: {0}")]
    InvalidName(String),
    #[error("no free room code after {CODE_ALLOCATION_ATTEMPTS} attempts")]
    CodeExhaustion,
    #[error("room not found")]
    NotFound,
    #[error("room is full")]
    Full,
    #[error("game already in progress")]
    GameInProgress,
    #[error("user is not a member of the room")]
    UserNotInRoom,
}

impl RoomError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidName(_) => ErrorCode::InvalidName,
            Self::CodeExhaustion => ErrorCode::CodeExhaustion,
            Self::NotFound => ErrorCode::RoomNotFound,
            Self::Full => ErrorCode::RoomFull,
            Self::GameInProgress => ErrorCode::GameInProgress,
            Self::UserNotInRoom => ErrorCode::UserNotInRoom,
        }
    }
}

/// What happened when a player left a room.
#[derive(Debug)]
pub struct LeaveOutcome {
    pub removed: Player,
    /// Set when the host role moved to another player.
    pub new_host: Option<UserId>,
    /// Set when the room was destroyed because it became empty.
    pub destroyed: bool,
}

/// Shared handle to one room's state.
pub type SharedRoom = Arc<RwLock<Room>>;

/// Creates, indexes, and evicts rooms. Constructed once at process init and
/// passed by reference; tests build fresh instances per case.
pub struct RoomManager {
    rooms: DashMap<RoomId, SharedRoom>,
    codes: DashMap<String, RoomId>,
    store: Arc<dyn Store>,
    games: GamesConfig,
    max_players: usize,
}

impl RoomManager {
    pub fn new(store: Arc<dyn Store>, games: GamesConfig, max_players: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            codes: DashMap::new(),
            store,
            games,
            max_players,
        }
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Create a room with the caller as host. The room code is sampled from
    /// the clean alphabet; a collision storm surfaces as `CodeExhaustion`.
    pub async fn create_room(
        &self,
        name: &str,
        host_id: UserId,
        host_name: &str,
        kind: GameKind,
    ) -> Result<RoomSnapshot, RoomError> {
        let name = validation::validate_room_name(name).map_err(RoomError::InvalidName)?;
        let code = self.allocate_code()?;

        let mut room = Room::new(name, code.clone(), host_id, host_name.to_string(), kind);
        room.config = self.default_config(kind);
        let room_id = room.id;
        let snapshot = RoomSnapshot::of_room(&room);

        self.rooms.insert(room_id, Arc::new(RwLock::new(room)));
        // Replace the placeholder reserved by allocate_code with the real id.
        self.codes.insert(normalize_room_code(&code), room_id);

        let store = Arc::clone(&self.store);
        let mirror = snapshot.clone();
        tokio::spawn(async move {
            if let Err(e) = store.room_created(&mirror).await {
                tracing::warn!(room_code = %mirror.room_code, error = %e, "Failed to mirror room creation");
            }
        });

        tracing::info!(room_id = %room_id, room_code = %code, %host_id, %kind, "Room created");
        Ok(snapshot)
    }

    fn default_config(&self, kind: GameKind) -> RoomConfig {
        match kind {
            GameKind::BlindTest => RoomConfig::BlindTest(self.games.blind_test.clone()),
            GameKind::CategoryRace => {
                RoomConfig::CategoryRace(self.games.category_race.clone())
            }
        }
    }

    fn allocate_code(&self) -> Result<String, RoomError> {
        for _ in 0..CODE_ALLOCATION_ATTEMPTS {
            let code = generate_room_code();
            // Reserve atomically so two creators can never share a code.
            match self.codes.entry(code.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    // Placeholder id; replaced right below in create_room via
                    // the same entry before anyone can look the code up.
                    entry.insert(RoomId::nil());
                    return Ok(code);
                }
            }
        }
        Err(RoomError::CodeExhaustion)
    }

    pub fn get_room(&self, room_id: RoomId) -> Result<SharedRoom, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RoomError::NotFound)
    }

    /// Case-insensitive lookup by room code.
    pub fn get_room_by_code(&self, code: &str) -> Result<SharedRoom, RoomError> {
        let code = normalize_room_code(code);
        let room_id = self
            .codes
            .get(&code)
            .map(|entry| *entry.value())
            .ok_or(RoomError::NotFound)?;
        self.get_room(room_id)
    }

    /// Join a room. Idempotent: a returning member is marked connected and
    /// the current snapshot is returned.
    pub async fn join(
        &self,
        room_id: RoomId,
        user_id: UserId,
        display_name: &str,
    ) -> Result<RoomSnapshot, RoomError> {
        let shared = self.get_room(room_id)?;
        let mut room = shared.write().await;

        if let Some(player) = room.players.get_mut(&user_id) {
            player.is_connected = true;
            room.touch();
            return Ok(RoomSnapshot::of_room(&room));
        }

        if room.status == RoomStatus::Playing {
            return Err(RoomError::GameInProgress);
        }
        if room.players.len() >= self.max_players {
            return Err(RoomError::Full);
        }

        room.players
            .insert(user_id, Player::new(user_id, display_name, false));
        room.touch();
        tracing::info!(room_code = %room.code, %user_id, "Player joined room");
        Ok(RoomSnapshot::of_room(&room))
    }

    /// Join by code (case-insensitive).
    pub async fn join_by_code(
        &self,
        code: &str,
        user_id: UserId,
        display_name: &str,
    ) -> Result<RoomSnapshot, RoomError> {
        let shared = self.get_room_by_code(code)?;
        let room_id = shared.read().await.id;
        self.join(room_id, user_id, display_name).await
    }

    /// Remove a player; destroys the room when it empties, promotes a
    /// successor when the host leaves.
    pub async fn leave(&self, room_id: RoomId, user_id: UserId) -> Result<LeaveOutcome, RoomError> {
        let shared = self.get_room(room_id)?;
        let mut room = shared.write().await;

        let previous_host = room.host_id;
        let removed = room.remove_player(user_id).ok_or(RoomError::UserNotInRoom)?;
        room.touch();

        if room.players.is_empty() {
            let code = room.code.clone();
            drop(room);
            self.destroy(room_id, &code);
            return Ok(LeaveOutcome {
                removed,
                new_host: None,
                destroyed: true,
            });
        }

        let new_host = (room.host_id != previous_host).then_some(room.host_id);
        if let Some(host) = new_host {
            tracing::info!(room_code = %room.code, %host, "Host left; promoted successor");
        }
        Ok(LeaveOutcome {
            removed,
            new_host,
            destroyed: false,
        })
    }

    fn destroy(&self, room_id: RoomId, code: &str) {
        self.rooms.remove(&room_id);
        self.codes.remove(&normalize_room_code(code));

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.room_deleted(room_id).await {
                tracing::warn!(%room_id, error = %e, "Failed to mirror room deletion");
            }
        });
        tracing::info!(%room_id, room_code = %code, "Room destroyed");
    }

    pub async fn set_ready(
        &self,
        room_id: RoomId,
        user_id: UserId,
        ready: bool,
    ) -> Result<bool, RoomError> {
        let shared = self.get_room(room_id)?;
        let mut room = shared.write().await;
        if !room.set_ready(user_id, ready) {
            return Err(RoomError::UserNotInRoom);
        }
        room.touch();
        Ok(room.is_ready())
    }

    pub async fn set_connected(
        &self,
        room_id: RoomId,
        user_id: UserId,
        connected: bool,
    ) -> Result<(), RoomError> {
        let shared = self.get_room(room_id)?;
        let mut room = shared.write().await;
        if !room.set_connected(user_id, connected) {
            return Err(RoomError::UserNotInRoom);
        }
        Ok(())
    }

    pub async fn set_status(&self, room_id: RoomId, status: RoomStatus) -> Result<(), RoomError> {
        let shared = self.get_room(room_id)?;
        {
            let mut room = shared.write().await;
            room.status = status;
            room.touch();
        }

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.room_status_changed(room_id, status).await {
                tracing::warn!(%room_id, error = %e, "Failed to mirror room status");
            }
        });
        Ok(())
    }

    /// Thin wrapper: mark the room as playing.
    pub async fn start_game(&self, room_id: RoomId) -> Result<(), RoomError> {
        self.set_status(room_id, RoomStatus::Playing).await
    }

    /// Thin wrapper: mark the room as finished.
    pub async fn end_game(&self, room_id: RoomId) -> Result<(), RoomError> {
        self.set_status(room_id, RoomStatus::Finished).await
    }

    /// Add points to a player's cumulative score.
    pub async fn add_score(
        &self,
        room_id: RoomId,
        user_id: UserId,
        points: i32,
    ) -> Result<i32, RoomError> {
        let shared = self.get_room(room_id)?;
        let mut room = shared.write().await;
        let player = room
            .players
            .get_mut(&user_id)
            .ok_or(RoomError::UserNotInRoom)?;
        player.score += points;
        Ok(player.score)
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        let shared = self.get_room(room_id)?;
        let room = shared.read().await;
        Ok(RoomSnapshot::of_room(&room))
    }

    /// One eviction pass: collect Finished rooms and Waiting rooms idle past
    /// the timeout. Returns what was removed so the caller can tear down
    /// connections and engines.
    pub async fn sweep_once(&self, idle_timeout: chrono::Duration) -> Vec<(RoomId, String)> {
        // Snapshot the handles first; room locks must not be awaited while
        // holding map shards.
        let rooms: Vec<SharedRoom> = self
            .rooms
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut expired: Vec<(RoomId, String)> = Vec::new();
        for shared in rooms {
            let room = shared.read().await;
            if room.is_expired(idle_timeout) {
                expired.push((room.id, room.code.clone()));
            }
        }

        for (room_id, code) in &expired {
            self.destroy(*room_id, code);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Swept expired rooms");
        }
        expired
    }
}
