//! WebSocket message protocol: typed envelopes, payload schemas, room state,
//! error codes, and room-code generation.
//!
//! The wire format is JSON: `{"type": <tag>, "payload": <object|null>,
//! "error": <string|null>}` with a closed tag set. Decoding is type-directed;
//! unknown tags are decode errors.

pub mod envelope;
pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod room_state;
pub mod types;
pub mod validation;

pub use envelope::{ClientEnvelope, ServerEnvelope};
pub use error_codes::ErrorCode;
pub use messages::{
    scoreboard_of, AnswerDetail, ClientMessage, GameEndPayload, GameStartPayload,
    RoomSnapshot, RoundResultPayload, Scoreboard, ScoreEntry, ServerMessage,
    StartGamePayload, StopReason, VoteAnswer,
};
pub use room_codes::{
    generate_room_code, normalize_room_code, CODE_ALLOCATION_ATTEMPTS, CODE_ALPHABET,
    CODE_LENGTH,
};
pub use room_state::{
    BlindTestConfig, CategoryRaceConfig, Player, Room, RoomConfig,
};
pub use types::{ConnectionId, GameKind, RoomId, RoomStatus, Track, UserId, MAX_PLAYERS};
