//! Per-room game engines.
//!
//! Each engine owns a registry of active games keyed by room code. A game is
//! one driver task advancing a round state machine plus message handlers
//! mutating shared state under the game's lock. Timers and player events race
//! through a capacity-1 stop channel; cancellation tears the driver down.

pub mod blind_test;
pub mod category_race;
pub mod text;

use thiserror::Error;

use crate::protocol::ErrorCode;

pub use blind_test::{BlindTestEngine, BlindTestPacing, BlindTestPhase};
pub use category_race::{CategoryRaceEngine, CategoryRacePacing, RacePhase};

/// Engine-level start/stop failures surfaced to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("a game is already running in this room")]
    AlreadyRunning,
    #[error("no game is running in this room")]
    NotRunning,
    #[error("room not found")]
    RoomNotFound,
    #[error("track catalog unavailable")]
    CatalogUnavailable,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyRunning => ErrorCode::GameInProgress,
            Self::NotRunning => ErrorCode::GameNotRunning,
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::CatalogUnavailable => ErrorCode::TrackCatalogUnavailable,
        }
    }
}
