//! Best-effort persistence boundary.
//!
//! The core never depends on the store succeeding: every call site logs
//! failures and moves on. The in-memory implementation doubles as the test
//! backend and the default for single-process deployments.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::protocol::{GameKind, RoomId, RoomSnapshot, RoomStatus, UserId};

/// Final outcome for one player of one finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerGameResult {
    pub final_score: i32,
    pub round_scores: Vec<i32>,
}

/// One finished game as handed to the store.
#[derive(Debug, Clone)]
pub struct RecordedGame {
    pub room_id: RoomId,
    pub kind: GameKind,
    pub results: HashMap<UserId, PlayerGameResult>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Narrow persistence interface consumed by the core.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a finished game's final and per-round scores.
    async fn record_game(
        &self,
        room_id: RoomId,
        kind: GameKind,
        results: HashMap<UserId, PlayerGameResult>,
    ) -> Result<()>;

    /// Mirror of room creation. Best-effort.
    async fn room_created(&self, _room: &RoomSnapshot) -> Result<()> {
        Ok(())
    }

    /// Mirror of a room status change. Best-effort.
    async fn room_status_changed(&self, _room_id: RoomId, _status: RoomStatus) -> Result<()> {
        Ok(())
    }

    /// Mirror of room destruction. Best-effort.
    async fn room_deleted(&self, _room_id: RoomId) -> Result<()> {
        Ok(())
    }
}

/// In-memory store. Keeps everything it is given; tests inspect it.
#[derive(Default)]
pub struct MemoryStore {
    games: RwLock<Vec<RecordedGame>>,
    rooms: RwLock<HashMap<RoomId, RoomStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded_games(&self) -> Vec<RecordedGame> {
        self.games.read().await.clone()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn record_game(
        &self,
        room_id: RoomId,
        kind: GameKind,
        results: HashMap<UserId, PlayerGameResult>,
    ) -> Result<()> {
        self.games.write().await.push(RecordedGame {
            room_id,
            kind,
            results,
            recorded_at: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn room_created(&self, room: &RoomSnapshot) -> Result<()> {
        let id: RoomId = uuid::Uuid::parse_str(&room.room_id)?;
        self.rooms.write().await.insert(id, room.status);
        Ok(())
    }

    async fn room_status_changed(&self, room_id: RoomId, status: RoomStatus) -> Result<()> {
        self.rooms.write().await.insert(room_id, status);
        Ok(())
    }

    async fn room_deleted(&self, room_id: RoomId) -> Result<()> {
        self.rooms.write().await.remove(&room_id);
        Ok(())
    }
}
