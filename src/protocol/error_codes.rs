use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling.
///
/// Carried in the `error` field of a response envelope so clients can branch
/// programmatically without parsing prose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation
    InvalidName,
    InvalidPayload,
    InvalidAnswerFormat,

    // Authorization
    NotInRoom,
    NotHost,
    SelfVoteForbidden,
    NotSubmittedYet,

    // Capacity / state
    RoomFull,
    GameInProgress,
    GameNotRunning,
    CodeExhaustion,
    PlayersNotReady,

    // Resources
    RoomNotFound,
    UserNotInRoom,
    TrackCatalogUnavailable,

    // Transport
    DecodeError,
    MessageTooLarge,
    Timeout,

    // Server
    InternalError,
}

impl ErrorCode {
    /// Human-readable description suitable for direct display.
    pub fn description(self) -> &'static str {
        match self {
            Self::InvalidName => "The room name must be between 3 and 50 characters.",
            Self::InvalidPayload => "The message payload is missing or malformed.",
            Self::InvalidAnswerFormat => "The submitted answers do not match the round's categories.",
            Self::NotInRoom => "You are not in a room. Join a room before sending game messages.",
            Self::NotHost => "Only the room host can perform this action.",
            Self::SelfVoteForbidden => "You cannot vote on your own answer.",
            Self::NotSubmittedYet => "Submit your answers before stopping the round.",
            Self::RoomFull => "The room has reached its maximum player capacity.",
            Self::GameInProgress => "A game is already in progress in this room.",
            Self::GameNotRunning => "No game is currently running in this room.",
            Self::CodeExhaustion => "No free room code could be allocated. Try again.",
            Self::PlayersNotReady => "All players must be ready before the game can start.",
            Self::RoomNotFound => "The requested room could not be found.",
            Self::UserNotInRoom => "That player is not a member of this room.",
            Self::TrackCatalogUnavailable => {
                "The music catalog is unavailable; the game could not start."
            }
            Self::DecodeError => "The message could not be decoded.",
            Self::MessageTooLarge => "The message exceeds the maximum allowed size.",
            Self::Timeout => "The connection timed out.",
            Self::InternalError => "An internal server error occurred.",
        }
    }

    /// Wire identifier, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidName => "INVALID_NAME",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::InvalidAnswerFormat => "INVALID_ANSWER_FORMAT",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::NotHost => "NOT_HOST",
            Self::SelfVoteForbidden => "SELF_VOTE_FORBIDDEN",
            Self::NotSubmittedYet => "NOT_SUBMITTED_YET",
            Self::RoomFull => "ROOM_FULL",
            Self::GameInProgress => "GAME_IN_PROGRESS",
            Self::GameNotRunning => "GAME_NOT_RUNNING",
            Self::CodeExhaustion => "CODE_EXHAUSTION",
            Self::PlayersNotReady => "PLAYERS_NOT_READY",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::UserNotInRoom => "USER_NOT_IN_ROOM",
            Self::TrackCatalogUnavailable => "TRACK_CATALOG_UNAVAILABLE",
            Self::DecodeError => "DECODE_ERROR",
            Self::MessageTooLarge => "MESSAGE_TOO_LARGE",
            Self::Timeout => "TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
