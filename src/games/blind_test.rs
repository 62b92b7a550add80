//! Blind Test engine.
//!
//! One driver task per active game walks the round sequence
//! `Preload -> Playing -> Revealing` and either advances on the 1 s ticker
//! hitting the deadline or cuts the round short when the capacity-1 stop
//! channel fires (every connected player found the track). Answer handling
//! runs under the game lock so a late answer and the reveal can never
//! interleave; the `revealed` flag turns a lost race into a no-op.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, sleep, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::catalog::TrackProvider;
use crate::hub::Hub;
use crate::protocol::{
    normalize_room_code, scoreboard_of, BlindTestConfig, GameKind, GameStartPayload,
    RoomId, ServerMessage, Track, UserId,
};
use crate::rooms::RoomManager;
use crate::store::{PlayerGameResult, Store};

use super::text;
use super::EngineError;

/// Fixed pacing of the round sequence. Tests shrink these to keep wall-clock
/// time down; production uses the defaults.
#[derive(Debug, Clone)]
pub struct BlindTestPacing {
    /// Delay between game start and the first round.
    pub start_delay: Duration,
    /// Audio warm-up window after `bt_preload`.
    pub preload_delay: Duration,
    /// Grace between "everyone found it" and the reveal.
    pub early_stop_grace: Duration,
    /// How long the reveal stays on screen before the next round.
    pub reveal_pause: Duration,
}

impl Default for BlindTestPacing {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(2),
            preload_delay: Duration::from_millis(1500),
            early_stop_grace: Duration::from_secs(1),
            reveal_pause: Duration::from_secs(4),
        }
    }
}

impl BlindTestPacing {
    /// Millisecond-scale pacing for tests.
    pub fn fast() -> Self {
        Self {
            start_delay: Duration::from_millis(10),
            preload_delay: Duration::from_millis(10),
            early_stop_grace: Duration::from_millis(10),
            reveal_pause: Duration::from_millis(10),
        }
    }
}

/// Round state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlindTestPhase {
    Preload,
    Playing,
    Revealing,
    Finished,
}

/// One player's recorded attempt for the current round.
#[derive(Debug, Clone)]
struct AnswerRecord {
    correct: bool,
    points: i32,
}

struct BlindTestState {
    room_id: RoomId,
    tracks: Vec<Track>,
    current_round: u32,
    total_rounds: u32,
    duration: u64,
    deadline: Option<Instant>,
    answers: HashMap<UserId, AnswerRecord>,
    round_points: HashMap<UserId, Vec<i32>>,
    revealed: bool,
    phase: BlindTestPhase,
    stop_round: Option<mpsc::Sender<()>>,
}

impl BlindTestState {
    fn current_track(&self) -> Option<&Track> {
        (self.current_round >= 1)
            .then(|| self.tracks.get(self.current_round as usize - 1))
            .flatten()
    }

    fn time_left(&self) -> u64 {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }
}

struct BlindTestGame {
    state: Mutex<BlindTestState>,
    cancel: CancellationToken,
}

/// Blind Test engine: one state machine per active Blind Test room.
pub struct BlindTestEngine {
    hub: Arc<Hub>,
    rooms: Arc<RoomManager>,
    catalog: Arc<dyn TrackProvider>,
    store: Arc<dyn Store>,
    games: DashMap<String, Arc<BlindTestGame>>,
    pacing: BlindTestPacing,
    shutdown: CancellationToken,
}

impl BlindTestEngine {
    pub fn new(
        hub: Arc<Hub>,
        rooms: Arc<RoomManager>,
        catalog: Arc<dyn TrackProvider>,
        store: Arc<dyn Store>,
        pacing: BlindTestPacing,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hub,
            rooms,
            catalog,
            store,
            games: DashMap::new(),
            pacing,
            shutdown,
        }
    }

    /// Whether a game is currently running in the room.
    pub fn is_running(&self, room_code: &str) -> bool {
        self.games.contains_key(&normalize_room_code(room_code))
    }

    /// Start a game. The caller (router) has already authorized the host and
    /// checked readiness. A catalog failure aborts the start; the router
    /// broadcasts the error.
    pub async fn start(
        self: &Arc<Self>,
        room_code: &str,
        config: BlindTestConfig,
    ) -> Result<(), EngineError> {
        let room_code = normalize_room_code(room_code);
        if self.games.contains_key(&room_code) {
            return Err(EngineError::AlreadyRunning);
        }

        let shared = self
            .rooms
            .get_room_by_code(&room_code)
            .map_err(|_| EngineError::RoomNotFound)?;

        let tracks = self
            .catalog
            .pick_tracks(&config.playlist, config.total_rounds as usize)
            .await
            .map_err(|e| {
                tracing::warn!(%room_code, error = %e, "Track catalog failed; aborting start");
                EngineError::CatalogUnavailable
            })?;
        if tracks.is_empty() {
            return Err(EngineError::CatalogUnavailable);
        }

        // Fewer tracks than requested shortens the game.
        let total_rounds = (tracks.len() as u32).min(config.total_rounds);

        let room_id = {
            let mut room = shared.write().await;
            room.reset_scores();
            room.id
        };
        let _ = self.rooms.start_game(room_id).await;

        let game = Arc::new(BlindTestGame {
            state: Mutex::new(BlindTestState {
                room_id,
                tracks,
                current_round: 0,
                total_rounds,
                duration: config.time_per_round,
                deadline: None,
                answers: HashMap::new(),
                round_points: HashMap::new(),
                revealed: false,
                phase: BlindTestPhase::Preload,
                stop_round: None,
            }),
            cancel: self.shutdown.child_token(),
        });
        self.games.insert(room_code.clone(), Arc::clone(&game));

        self.hub
            .broadcast(
                &room_code,
                &ServerMessage::GameStart(GameStartPayload {
                    kind: GameKind::BlindTest,
                    rounds: total_rounds,
                    duration: config.time_per_round,
                    playlist: Some(config.playlist.clone()),
                    categories: None,
                }),
            )
            .await;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run(room_code, game).await;
        });
        Ok(())
    }

    /// Cancel and drop the game for a room (room destroyed or swept).
    pub fn cancel(&self, room_code: &str) {
        if let Some((_, game)) = self.games.remove(&normalize_room_code(room_code)) {
            game.cancel.cancel();
        }
    }

    /// Driver task: one iteration per round, then the end-of-game sequence.
    async fn run(self: Arc<Self>, room_code: String, game: Arc<BlindTestGame>) {
        if !self.pause(&game, self.pacing.start_delay).await {
            return;
        }

        loop {
            // Advance to the next round, or finish.
            let round_info = {
                let mut st = game.state.lock().await;
                st.current_round += 1;
                if st.current_round > st.total_rounds {
                    None
                } else {
                    st.answers.clear();
                    st.revealed = false;
                    st.phase = BlindTestPhase::Preload;
                    st.deadline = None;
                    let round = st.current_round;
                    let total = st.total_rounds;
                    let duration = st.duration;
                    st.current_track()
                        .cloned()
                        .map(|track| (round, total, track, duration))
                }
            };
            let Some((round, total, track, duration)) = round_info else {
                break;
            };

            self.hub
                .broadcast(
                    &room_code,
                    &ServerMessage::BtPreload {
                        preview_url: track.preview_url.clone(),
                        round,
                        total,
                    },
                )
                .await;
            if !self.pause(&game, self.pacing.preload_delay).await {
                return;
            }

            // Arm the round: fresh stop channel, deadline, phase.
            let mut stop_rx = {
                let mut st = game.state.lock().await;
                let (tx, rx) = mpsc::channel(1);
                st.stop_round = Some(tx);
                st.phase = BlindTestPhase::Playing;
                st.deadline = Some(Instant::now() + Duration::from_secs(duration));
                rx
            };

            self.hub
                .broadcast(
                    &room_code,
                    &ServerMessage::BtNewRound {
                        round,
                        total,
                        preview_url: track.preview_url.clone(),
                        duration,
                    },
                )
                .await;

            // 1 s tick loop until the stop signal or the deadline.
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut stopped_early = false;
            loop {
                tokio::select! {
                    () = game.cancel.cancelled() => return,
                    _ = stop_rx.recv() => {
                        stopped_early = true;
                        break;
                    }
                    _ = ticker.tick() => {
                        let time_left = game.state.lock().await.time_left();
                        if time_left == 0 {
                            break;
                        }
                        self.hub
                            .broadcast(&room_code, &ServerMessage::TimeUpdate { time_left })
                            .await;
                    }
                }
            }

            if stopped_early && !self.pause(&game, self.pacing.early_stop_grace).await {
                return;
            }

            self.reveal(&room_code, &game).await;
            if !self.pause(&game, self.pacing.reveal_pause).await {
                return;
            }
        }

        self.end_game(&room_code, &game).await;
    }

    /// Cancellable sleep. Returns false when the game was cancelled.
    async fn pause(&self, game: &BlindTestGame, duration: Duration) -> bool {
        tokio::select! {
            () = game.cancel.cancelled() => false,
            () = sleep(duration) => true,
        }
    }

    /// Reveal the current track and the standings. Idempotent through the
    /// `revealed` flag.
    async fn reveal(&self, room_code: &str, game: &BlindTestGame) {
        let (room_id, track) = {
            let mut st = game.state.lock().await;
            if st.revealed {
                return;
            }
            st.revealed = true;
            st.phase = BlindTestPhase::Revealing;
            st.stop_round = None;
            let Some(track) = st.current_track().cloned() else {
                return;
            };
            (st.room_id, track)
        };

        let scores = match self.rooms.get_room(room_id) {
            Ok(shared) => {
                let room = shared.read().await;
                // Record this round's earnings for the per-round history.
                let mut st = game.state.lock().await;
                for user_id in room.players.keys() {
                    let earned = st
                        .answers
                        .get(user_id)
                        .filter(|a| a.correct)
                        .map_or(0, |a| a.points);
                    st.round_points.entry(*user_id).or_default().push(earned);
                }
                scoreboard_of(&room)
            }
            Err(_) => HashMap::new(),
        };

        self.hub
            .broadcast(
                room_code,
                &ServerMessage::BtReveal {
                    track_name: track.title.clone(),
                    artist_name: track.artist.clone(),
                    album_name: track.album.clone(),
                    image_url: track.image_url.clone(),
                },
            )
            .await;
        self.hub
            .broadcast(room_code, &ServerMessage::BtScores { scores })
            .await;
    }

    /// Handle a player's free-form answer. One correct attempt per round;
    /// wrong attempts may retry until the reveal.
    pub async fn submit_answer(&self, room_code: &str, user_id: UserId, answer: &str) {
        let room_code = normalize_room_code(room_code);
        let Some(game) = self.games.get(&room_code).map(|g| Arc::clone(g.value())) else {
            return;
        };

        let outcome = {
            let mut st = game.state.lock().await;
            if st.phase != BlindTestPhase::Playing || st.revealed {
                return;
            }
            if st.answers.get(&user_id).is_some_and(|a| a.correct) {
                return;
            }
            let Some(track) = st.current_track() else {
                return;
            };

            let correct = text::matches_track(answer, &track.title, &track.artist);
            let points = if correct {
                award_points(st.time_left(), st.duration)
            } else {
                0
            };
            st.answers.insert(user_id, AnswerRecord { correct, points });

            if correct {
                Some((st.room_id, points))
            } else {
                None
            }
        };

        let Some((room_id, points)) = outcome else {
            self.hub
                .send_to_user(
                    &room_code,
                    user_id,
                    &ServerMessage::BtResult {
                        correct: false,
                        points: 0,
                    },
                )
                .await;
            return;
        };

        let _ = self.rooms.add_score(room_id, user_id, points).await;

        self.hub
            .send_to_user(
                &room_code,
                user_id,
                &ServerMessage::BtResult {
                    correct: true,
                    points,
                },
            )
            .await;
        self.hub
            .broadcast(&room_code, &ServerMessage::PlayerFound { user_id, points })
            .await;

        let scores = match self.rooms.get_room(room_id) {
            Ok(shared) => scoreboard_of(&*shared.read().await),
            Err(_) => HashMap::new(),
        };
        self.hub
            .broadcast(&room_code, &ServerMessage::BtScores { scores })
            .await;

        // Cut the round short once every connected player has found it.
        let connected = match self.rooms.get_room(room_id) {
            Ok(shared) => shared.read().await.connected_users(),
            Err(_) => return,
        };
        let st = game.state.lock().await;
        let everyone_found = !connected.is_empty()
            && connected
                .iter()
                .all(|u| st.answers.get(u).is_some_and(|a| a.correct));
        if everyone_found {
            if let Some(stop) = &st.stop_round {
                let _ = stop.try_send(());
            }
        }
    }

    /// Final standings, persistence, teardown.
    async fn end_game(&self, room_code: &str, game: &BlindTestGame) {
        let (room_id, round_points) = {
            let mut st = game.state.lock().await;
            st.phase = BlindTestPhase::Finished;
            (st.room_id, std::mem::take(&mut st.round_points))
        };

        let _ = self.rooms.end_game(room_id).await;

        let (scores, results) = match self.rooms.get_room(room_id) {
            Ok(shared) => {
                let room = shared.read().await;
                let scores = scoreboard_of(&room);
                let results: HashMap<UserId, PlayerGameResult> = room
                    .players
                    .values()
                    .map(|p| {
                        (
                            p.user_id,
                            PlayerGameResult {
                                final_score: p.score,
                                round_scores: round_points
                                    .get(&p.user_id)
                                    .cloned()
                                    .unwrap_or_default(),
                            },
                        )
                    })
                    .collect();
                (scores, results)
            }
            Err(_) => (HashMap::new(), HashMap::new()),
        };

        let winner = scores
            .iter()
            .max_by_key(|(user_id, entry)| (entry.score, std::cmp::Reverse(**user_id)))
            .map(|(user_id, _)| *user_id);

        self.hub
            .broadcast(room_code, &ServerMessage::BtGameEnd { scores, winner })
            .await;

        if let Err(e) = self
            .store
            .record_game(room_id, GameKind::BlindTest, results)
            .await
        {
            tracing::warn!(%room_id, error = %e, "Failed to persist Blind Test results");
        }

        self.games.remove(&normalize_room_code(room_code));
        tracing::info!(%room_code, "Blind Test finished");
    }
}

/// Speed-weighted award: a flat 100 for finding the track plus up to 50 for
/// answering early.
fn award_points(time_left: u64, duration: u64) -> i32 {
    100 + ((50 * time_left) / duration.max(1)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_scales_with_remaining_time() {
        assert_eq!(award_points(35, 37), 147);
        assert_eq!(award_points(37, 37), 150);
        assert_eq!(award_points(0, 37), 100);
        assert_eq!(award_points(18, 37), 124);
    }

    #[test]
    fn award_survives_degenerate_duration() {
        assert_eq!(award_points(0, 0), 100);
    }

    #[test]
    fn state_indexes_current_track_one_based() {
        let tracks = vec![
            Track {
                id: "a".to_string(),
                title: "A".to_string(),
                artist: "AA".to_string(),
                album: String::new(),
                preview_url: String::new(),
                image_url: String::new(),
            },
            Track {
                id: "b".to_string(),
                title: "B".to_string(),
                artist: "BB".to_string(),
                album: String::new(),
                preview_url: String::new(),
                image_url: String::new(),
            },
        ];
        let mut st = BlindTestState {
            room_id: uuid::Uuid::new_v4(),
            tracks,
            current_round: 0,
            total_rounds: 2,
            duration: 37,
            deadline: None,
            answers: HashMap::new(),
            round_points: HashMap::new(),
            revealed: false,
            phase: BlindTestPhase::Preload,
            stop_round: None,
        };
        assert!(st.current_track().is_none());
        st.current_round = 1;
        assert_eq!(st.current_track().unwrap().id, "a");
        st.current_round = 2;
        assert_eq!(st.current_track().unwrap().id, "b");
        st.current_round = 3;
        assert!(st.current_track().is_none());
    }
}
