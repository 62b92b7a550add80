use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::room_state::{Player, RoomConfig};
use super::types::{GameKind, RoomStatus, UserId};

/// Message types sent from client to server.
///
/// The tag set is closed: any other `type` value is a decode error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat probe. Answered with `pong` without reaching the router.
    Ping,
    /// Heartbeat response (ignored; the transport-level pong refreshes the
    /// read deadline).
    Pong,
    /// Re-join a room the user is already a member of, or join a waiting
    /// room. Idempotent for existing members.
    JoinRoom { code: String },
    /// Leave the current room for good (frees the slot).
    LeaveRoom,
    /// Toggle readiness in the lobby.
    PlayerReady { ready: bool },
    /// Host-only: start (or restart) the room's game. The payload may be `{}`.
    StartGame(StartGamePayload),
    /// Blind Test: submit a free-form answer for the current track.
    BtAnswer { answer: String },
    /// Category Race: submit the per-category answer sheet.
    SubmitAnswers { answers: HashMap<String, String> },
    /// Category Race: stop the round early (requires prior submission).
    StopRound,
    /// Category Race: cast votes, keyed `"<targetUserId>_<category>"`.
    SubmitVotes { votes: HashMap<String, bool> },
}

/// Optional per-game overrides carried by `start_game`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StartGamePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u32>,
}

/// Per-player scoreboard entry. Serialized under a stringified user id key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntry {
    pub pseudo: String,
    pub score: i32,
}

/// Cumulative scoreboard keyed by user id.
pub type Scoreboard = HashMap<UserId, ScoreEntry>;

/// Full room snapshot pushed to a joiner on register and broadcast on
/// membership or readiness changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub room_code: String,
    pub name: String,
    pub host_id: UserId,
    pub kind: GameKind,
    pub status: RoomStatus,
    pub players: Vec<Player>,
    pub config: RoomConfig,
    pub is_ready: bool,
}

impl RoomSnapshot {
    pub fn of_room(room: &super::room_state::Room) -> Self {
        let mut players: Vec<Player> = room.players.values().cloned().collect();
        players.sort_by_key(|p| (p.joined_at, p.user_id));
        Self {
            room_id: room.id.simple().to_string(),
            room_code: room.code.clone(),
            name: room.name.clone(),
            host_id: room.host_id,
            kind: room.kind,
            status: room.status,
            players,
            config: room.config.clone(),
            is_ready: room.is_ready(),
        }
    }
}

/// Build a cumulative scoreboard from the room's player set.
pub fn scoreboard_of(room: &super::room_state::Room) -> Scoreboard {
    room.players
        .values()
        .map(|p| {
            (
                p.user_id,
                ScoreEntry {
                    pseudo: p.display_name.clone(),
                    score: p.score,
                },
            )
        })
        .collect()
}

/// Payload for `game_start`, shared by both game kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStartPayload {
    pub kind: GameKind,
    pub rounds: u32,
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

/// One candidate answer shown during the Category Race voting phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteAnswer {
    pub user_id: UserId,
    pub pseudo: String,
    pub category: String,
    pub answer: String,
}

/// Why a Category Race round stopped before its deadline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    AllFilled,
    Manual,
}

/// Per-answer outcome detail in `round_result`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerDetail {
    pub user_id: UserId,
    pub pseudo: String,
    pub answer: String,
    pub valid: bool,
    pub votes_for: u32,
    pub votes_against: u32,
    pub unique: bool,
    pub points: i32,
}

/// Payload for the Category Race `round_result` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResultPayload {
    /// Points earned this round, per player.
    pub results: HashMap<UserId, i32>,
    /// Per-category answer details.
    pub details: HashMap<String, Vec<AnswerDetail>>,
    /// Cumulative scoreboard.
    pub scores: Scoreboard,
}

/// Payload for the Category Race `game_end` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEndPayload {
    /// User ids ordered best score first.
    pub rankings: Vec<UserId>,
    pub scores: Scoreboard,
    pub round_scores: HashMap<UserId, Vec<i32>>,
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Error marker; the envelope-level `error` field carries the code.
    Error,
    /// Keepalive probe (protocol-level; transport pings are separate).
    Ping,
    /// Answer to a client `ping`.
    Pong,

    // Lobby
    PlayerJoined {
        user_id: UserId,
        pseudo: String,
    },
    PlayerLeft {
        user_id: UserId,
    },
    PlayerReady {
        user_id: UserId,
        ready: bool,
    },
    RoomUpdate(Box<RoomSnapshot>),
    GameStart(GameStartPayload),
    /// Category Race final standings.
    GameEnd(Box<GameEndPayload>),

    // Blind Test
    BtPreload {
        preview_url: String,
        round: u32,
        total: u32,
    },
    BtNewRound {
        round: u32,
        total: u32,
        preview_url: String,
        duration: u64,
    },
    /// Private feedback to the answering player.
    BtResult {
        correct: bool,
        points: i32,
    },
    BtReveal {
        track_name: String,
        artist_name: String,
        album_name: String,
        image_url: String,
    },
    BtScores {
        scores: Scoreboard,
    },
    BtGameEnd {
        scores: Scoreboard,
        winner: Option<UserId>,
    },
    TimeUpdate {
        time_left: u64,
    },
    PlayerFound {
        user_id: UserId,
        points: i32,
    },

    // Category Race
    NewRound {
        round: u32,
        total: u32,
        letter: char,
        categories: Vec<String>,
        duration: u64,
    },
    PlayerSubmitted {
        user_id: UserId,
    },
    /// Private ack carrying the answers after first-letter coercion.
    AnswersSubmitted {
        answers: HashMap<String, String>,
    },
    RoundStop {
        stopped_by: UserId,
        reason: StopReason,
    },
    VotingStart {
        answers: Vec<VoteAnswer>,
        duration: u64,
        categories: Vec<String>,
    },
    /// Private ack that the votes were recorded.
    VotesSubmitted,
    VoteTimeUpdate {
        time_left: u64,
    },
    RoundResult(Box<RoundResultPayload>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_tags_are_snake_case() {
        let msg = ClientMessage::JoinRoom {
            code: "ABCD23".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "join_room");
        assert_eq!(json["payload"]["code"], "ABCD23");
    }

    #[test]
    fn unit_variants_omit_payload() {
        let json = serde_json::to_value(&ClientMessage::Ping).unwrap();
        assert_eq!(json["type"], "ping");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn unknown_tag_is_a_decode_error() {
        let err = serde_json::from_str::<ClientMessage>(r#"{"type":"frobnicate"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn start_game_accepts_empty_payload() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start_game","payload":{}}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartGame(StartGamePayload::default()));
    }

    #[test]
    fn bt_new_round_schema_matches_wire_contract() {
        let msg = ServerMessage::BtNewRound {
            round: 2,
            total: 10,
            preview_url: "https://cdn.example/p.mp3".to_string(),
            duration: 37,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "bt_new_round");
        assert_eq!(json["payload"]["round"], 2);
        assert_eq!(json["payload"]["duration"], 37);
    }

    #[test]
    fn scoreboard_keys_serialize_as_strings() {
        let mut scores = Scoreboard::new();
        scores.insert(
            42,
            ScoreEntry {
                pseudo: "Alice".to_string(),
                score: 147,
            },
        );
        let json = serde_json::to_value(&ServerMessage::BtScores { scores }).unwrap();
        assert_eq!(json["payload"]["scores"]["42"]["score"], 147);
    }

    #[test]
    fn round_trip_preserves_structure() {
        let msg = ServerMessage::NewRound {
            round: 1,
            total: 9,
            letter: 'B',
            categories: vec!["artiste".to_string()],
            duration: 60,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn stop_reason_tags() {
        assert_eq!(
            serde_json::to_string(&StopReason::AllFilled).unwrap(),
            "\"all_filled\""
        );
        assert_eq!(
            serde_json::to_string(&StopReason::Manual).unwrap(),
            "\"manual\""
        );
    }
}
