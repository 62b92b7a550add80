//! Category Race engine.
//!
//! Rounds walk `Answering -> Voting -> Results`; a solo game skips voting.
//! The answering window exits on the deadline, on every player submitting,
//! on a player filling every category (auto-stop), or on a manual stop from
//! a player who already submitted. Votes are write-once per
//! `(voter, target, category)` and self-votes are rejected.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, sleep, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use rand::RngExt;

use crate::hub::Hub;
use crate::protocol::{
    normalize_room_code, scoreboard_of, validation, AnswerDetail, CategoryRaceConfig,
    ErrorCode, GameEndPayload, GameKind, GameStartPayload, RoomId, RoundResultPayload,
    ServerMessage, StopReason, UserId, VoteAnswer,
};
use crate::rooms::RoomManager;
use crate::store::{PlayerGameResult, Store};

use super::text;
use super::EngineError;

/// Letter pool `A..=V`: the last four letters start too few French words to
/// be playable.
pub const LETTER_POOL: [char; 22] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', 'S', 'T', 'U', 'V',
];

/// Fixed pacing of the round sequence; tests shrink it.
#[derive(Debug, Clone)]
pub struct CategoryRacePacing {
    /// Delay between game start and the first round.
    pub start_delay: Duration,
    /// Grace after a manual stop so stragglers can finish typing.
    pub manual_stop_grace: Duration,
    /// How long the round results stay on screen.
    pub results_pause: Duration,
}

impl Default for CategoryRacePacing {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(2),
            manual_stop_grace: Duration::from_secs(3),
            results_pause: Duration::from_secs(5),
        }
    }
}

impl CategoryRacePacing {
    /// Millisecond-scale pacing for tests.
    pub fn fast() -> Self {
        Self {
            start_delay: Duration::from_millis(10),
            manual_stop_grace: Duration::from_millis(10),
            results_pause: Duration::from_millis(10),
        }
    }
}

/// Round state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    Answering,
    Voting,
    Results,
    Finished,
}

/// Why the answering window closed early.
#[derive(Debug, Clone, Copy)]
enum StopCause {
    AllSubmitted,
    AllFilled(UserId),
    Manual(UserId),
}

/// One participant's per-round sheet.
#[derive(Debug, Default, Clone)]
struct PlayerRound {
    answers: HashMap<String, String>,
    submitted: bool,
}

struct RaceState {
    room_id: RoomId,
    categories: Vec<String>,
    total_rounds: u32,
    current_round: u32,
    current_letter: char,
    used_letters: Vec<char>,
    duration: u64,
    vote_time: u64,
    players: HashMap<UserId, PlayerRound>,
    /// `category -> target -> voter -> accept`; write-once per triple.
    votes: HashMap<String, HashMap<UserId, HashMap<UserId, bool>>>,
    round_points: HashMap<UserId, Vec<i32>>,
    stopped_by: Option<UserId>,
    phase: RacePhase,
    deadline: Option<Instant>,
    stop_answering: Option<mpsc::Sender<StopCause>>,
    stop_voting: Option<mpsc::Sender<()>>,
}

impl RaceState {
    fn time_left(&self) -> u64 {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    fn pick_letter(&mut self) -> char {
        let mut available: Vec<char> = LETTER_POOL
            .iter()
            .copied()
            .filter(|c| !self.used_letters.contains(c))
            .collect();
        if available.is_empty() {
            self.used_letters.clear();
            available = LETTER_POOL.to_vec();
        }
        let mut rng = rand::rng();
        let letter = available[rng.random_range(0..available.len())];
        self.used_letters.push(letter);
        self.current_letter = letter;
        letter
    }

    /// Expected number of votes across the room: every voter judges every
    /// other player's non-empty answer, once per category.
    fn expected_votes(&self) -> usize {
        let voters = self.players.len();
        if voters < 2 {
            return 0;
        }
        self.categories
            .iter()
            .map(|cat| {
                self.players
                    .values()
                    .filter(|p| p.answers.get(cat).is_some_and(|a| !a.is_empty()))
                    .count()
                    * (voters - 1)
            })
            .sum()
    }

    fn cast_votes(&self) -> usize {
        self.votes
            .values()
            .flat_map(HashMap::values)
            .map(HashMap::len)
            .sum()
    }
}

struct RaceGame {
    state: Mutex<RaceState>,
    cancel: CancellationToken,
}

/// Category Race engine: one state machine per active Category Race room.
pub struct CategoryRaceEngine {
    hub: Arc<Hub>,
    rooms: Arc<RoomManager>,
    store: Arc<dyn Store>,
    games: DashMap<String, Arc<RaceGame>>,
    pacing: CategoryRacePacing,
    shutdown: CancellationToken,
}

impl CategoryRaceEngine {
    pub fn new(
        hub: Arc<Hub>,
        rooms: Arc<RoomManager>,
        store: Arc<dyn Store>,
        pacing: CategoryRacePacing,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hub,
            rooms,
            store,
            games: DashMap::new(),
            pacing,
            shutdown,
        }
    }

    pub fn is_running(&self, room_code: &str) -> bool {
        self.games.contains_key(&normalize_room_code(room_code))
    }

    /// Start a game; the router has already authorized the host.
    pub async fn start(
        self: &Arc<Self>,
        room_code: &str,
        config: CategoryRaceConfig,
    ) -> Result<(), EngineError> {
        let room_code = normalize_room_code(room_code);
        if self.games.contains_key(&room_code) {
            return Err(EngineError::AlreadyRunning);
        }

        let shared = self
            .rooms
            .get_room_by_code(&room_code)
            .map_err(|_| EngineError::RoomNotFound)?;
        let room_id = {
            let mut room = shared.write().await;
            room.reset_scores();
            room.id
        };
        let _ = self.rooms.start_game(room_id).await;

        let game = Arc::new(RaceGame {
            state: Mutex::new(RaceState {
                room_id,
                categories: config.categories.clone(),
                total_rounds: config.total_rounds,
                current_round: 0,
                current_letter: ' ',
                used_letters: config.used_letters.clone(),
                duration: config.time_per_round,
                vote_time: config.vote_time,
                players: HashMap::new(),
                votes: HashMap::new(),
                round_points: HashMap::new(),
                stopped_by: None,
                phase: RacePhase::Answering,
                deadline: None,
                stop_answering: None,
                stop_voting: None,
            }),
            cancel: self.shutdown.child_token(),
        });
        self.games.insert(room_code.clone(), Arc::clone(&game));

        self.hub
            .broadcast(
                &room_code,
                &ServerMessage::GameStart(GameStartPayload {
                    kind: GameKind::CategoryRace,
                    rounds: config.total_rounds,
                    duration: config.time_per_round,
                    playlist: None,
                    categories: Some(config.categories.clone()),
                }),
            )
            .await;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run(room_code, game).await;
        });
        Ok(())
    }

    pub fn cancel(&self, room_code: &str) {
        if let Some((_, game)) = self.games.remove(&normalize_room_code(room_code)) {
            game.cancel.cancel();
        }
    }

    async fn run(self: Arc<Self>, room_code: String, game: Arc<RaceGame>) {
        if !self.pause(&game, self.pacing.start_delay).await {
            return;
        }

        loop {
            let Some((round_info, stop_rx)) = self.begin_round(&game).await else {
                break;
            };
            let (round, total, letter, categories, duration) = round_info;

            self.hub
                .broadcast(
                    &room_code,
                    &ServerMessage::NewRound {
                        round,
                        total,
                        letter,
                        categories,
                        duration,
                    },
                )
                .await;

            if !self.answering_window(&room_code, &game, stop_rx).await {
                return;
            }
            if !self.voting_window(&room_code, &game).await {
                return;
            }

            let result = self.end_round(&game).await;
            self.hub
                .broadcast(&room_code, &ServerMessage::RoundResult(Box::new(result)))
                .await;
            if !self.pause(&game, self.pacing.results_pause).await {
                return;
            }
        }

        self.end_game(&room_code, &game).await;
    }

    /// Advance the round counter and reset per-round state. Returns `None`
    /// once every round has been played.
    async fn begin_round(
        &self,
        game: &RaceGame,
    ) -> Option<((u32, u32, char, Vec<String>, u64), mpsc::Receiver<StopCause>)> {
        let participants = {
            let st = game.state.lock().await;
            match self.rooms.get_room(st.room_id) {
                Ok(shared) => shared.read().await.players.keys().copied().collect::<Vec<_>>(),
                Err(_) => Vec::new(),
            }
        };

        let mut st = game.state.lock().await;
        st.current_round += 1;
        if st.current_round > st.total_rounds {
            return None;
        }

        let letter = st.pick_letter();
        st.players = participants
            .into_iter()
            .map(|user_id| (user_id, PlayerRound::default()))
            .collect();
        st.votes.clear();
        st.stopped_by = None;
        st.phase = RacePhase::Answering;
        st.deadline = Some(Instant::now() + Duration::from_secs(st.duration));
        let (tx, rx) = mpsc::channel(1);
        st.stop_answering = Some(tx);

        Some((
            (
                st.current_round,
                st.total_rounds,
                letter,
                st.categories.clone(),
                st.duration,
            ),
            rx,
        ))
    }

    /// Tick the answering window. Returns false on cancellation.
    async fn answering_window(
        &self,
        room_code: &str,
        game: &RaceGame,
        mut stop_rx: mpsc::Receiver<StopCause>,
    ) -> bool {
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = game.cancel.cancelled() => return false,
                cause = stop_rx.recv() => {
                    match cause {
                        Some(StopCause::AllSubmitted) | None => {}
                        Some(StopCause::AllFilled(user_id)) => {
                            game.state.lock().await.stopped_by = Some(user_id);
                            self.hub
                                .broadcast(room_code, &ServerMessage::RoundStop {
                                    stopped_by: user_id,
                                    reason: StopReason::AllFilled,
                                })
                                .await;
                        }
                        Some(StopCause::Manual(user_id)) => {
                            game.state.lock().await.stopped_by = Some(user_id);
                            self.hub
                                .broadcast(room_code, &ServerMessage::RoundStop {
                                    stopped_by: user_id,
                                    reason: StopReason::Manual,
                                })
                                .await;
                            if !self.pause(game, self.pacing.manual_stop_grace).await {
                                return false;
                            }
                        }
                    }
                    break;
                }
                _ = ticker.tick() => {
                    let time_left = game.state.lock().await.time_left();
                    if time_left == 0 {
                        break;
                    }
                    self.hub
                        .broadcast(room_code, &ServerMessage::TimeUpdate { time_left })
                        .await;
                }
            }
        }

        game.state.lock().await.stop_answering = None;
        true
    }

    /// Run the peer-vote phase. Solo games (and rounds with nothing to vote
    /// on) jump straight to `Results`. Returns false on cancellation.
    async fn voting_window(&self, room_code: &str, game: &RaceGame) -> bool {
        let (answers, vote_time, categories, mut stop_rx) = {
            let mut st = game.state.lock().await;

            let solo = st.players.len() < 2;
            let answers = self.answers_to_vote(&st).await;
            if solo || answers.is_empty() {
                st.phase = RacePhase::Results;
                return true;
            }

            st.phase = RacePhase::Voting;
            st.deadline = Some(Instant::now() + Duration::from_secs(st.vote_time));
            let (tx, rx) = mpsc::channel(1);
            st.stop_voting = Some(tx);
            (answers, st.vote_time, st.categories.clone(), rx)
        };

        self.hub
            .broadcast(
                room_code,
                &ServerMessage::VotingStart {
                    answers,
                    duration: vote_time,
                    categories,
                },
            )
            .await;

        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = game.cancel.cancelled() => return false,
                _ = stop_rx.recv() => break,
                _ = ticker.tick() => {
                    let time_left = game.state.lock().await.time_left();
                    if time_left == 0 {
                        break;
                    }
                    self.hub
                        .broadcast(room_code, &ServerMessage::VoteTimeUpdate { time_left })
                        .await;
                }
            }
        }

        let mut st = game.state.lock().await;
        st.stop_voting = None;
        st.phase = RacePhase::Results;
        true
    }

    /// Non-empty answers, grouped for the voting screen.
    async fn answers_to_vote(&self, st: &RaceState) -> Vec<VoteAnswer> {
        let names = self.display_names(st.room_id).await;
        let mut answers: Vec<VoteAnswer> = Vec::new();
        for category in &st.categories {
            for (user_id, sheet) in &st.players {
                let Some(answer) = sheet.answers.get(category) else {
                    continue;
                };
                if answer.is_empty() {
                    continue;
                }
                answers.push(VoteAnswer {
                    user_id: *user_id,
                    pseudo: names.get(user_id).cloned().unwrap_or_default(),
                    category: category.clone(),
                    answer: answer.clone(),
                });
            }
        }
        answers
    }

    async fn display_names(&self, room_id: RoomId) -> HashMap<UserId, String> {
        match self.rooms.get_room(room_id) {
            Ok(shared) => shared
                .read()
                .await
                .players
                .values()
                .map(|p| (p.user_id, p.display_name.clone()))
                .collect(),
            Err(_) => HashMap::new(),
        }
    }

    /// Handle a player's answer sheet. Idempotent until `submitted`.
    pub async fn submit_answers(
        &self,
        room_code: &str,
        user_id: UserId,
        answers: &HashMap<String, String>,
    ) {
        let room_code = normalize_room_code(room_code);
        let Some(game) = self.games.get(&room_code).map(|g| Arc::clone(g.value())) else {
            return;
        };

        let coerced = {
            let mut st = game.state.lock().await;
            if st.phase != RacePhase::Answering {
                return;
            }
            let letter = st.current_letter;
            let categories = st.categories.clone();

            if validation::validate_answer_categories(answers, &categories).is_err() {
                drop(st);
                self.hub
                    .send_error_to_user(&room_code, user_id, ErrorCode::InvalidAnswerFormat)
                    .await;
                return;
            }

            let Some(sheet) = st.players.get_mut(&user_id) else {
                return;
            };
            if sheet.submitted {
                return;
            }

            // Coerce: a non-empty answer must start with the round's letter.
            let mut coerced: HashMap<String, String> = HashMap::new();
            for category in &categories {
                let raw = answers.get(category).map(|a| a.trim()).unwrap_or("");
                let keep = raw
                    .chars()
                    .next()
                    .is_some_and(|c| c.to_uppercase().next() == Some(letter));
                coerced.insert(
                    category.clone(),
                    if keep { raw.to_string() } else { String::new() },
                );
            }
            sheet.answers = coerced.clone();
            sheet.submitted = true;

            let all_submitted = st.players.values().all(|p| p.submitted);
            let all_filled = st
                .categories
                .iter()
                .all(|cat| coerced.get(cat).is_some_and(|a| !a.is_empty()));

            let cause = if all_submitted {
                Some(StopCause::AllSubmitted)
            } else if all_filled {
                Some(StopCause::AllFilled(user_id))
            } else {
                None
            };
            if let (Some(cause), Some(stop)) = (cause, &st.stop_answering) {
                let _ = stop.try_send(cause);
            }
            coerced
        };

        self.hub
            .send_to_user(
                &room_code,
                user_id,
                &ServerMessage::AnswersSubmitted { answers: coerced },
            )
            .await;
        self.hub
            .broadcast(&room_code, &ServerMessage::PlayerSubmitted { user_id })
            .await;
    }

    /// Manual stop. Requires the caller to have submitted first.
    pub async fn stop_round(&self, room_code: &str, user_id: UserId) {
        let room_code = normalize_room_code(room_code);
        let Some(game) = self.games.get(&room_code).map(|g| Arc::clone(g.value())) else {
            return;
        };

        let st = game.state.lock().await;
        if st.phase != RacePhase::Answering {
            return;
        }
        let submitted = st.players.get(&user_id).is_some_and(|p| p.submitted);
        if !submitted {
            drop(st);
            self.hub
                .send_error_to_user(&room_code, user_id, ErrorCode::NotSubmittedYet)
                .await;
            return;
        }
        if let Some(stop) = &st.stop_answering {
            let _ = stop.try_send(StopCause::Manual(user_id));
        }
    }

    /// Record a batch of votes. Keys are `"<targetUserId>_<category>"`;
    /// write-once per `(voter, target, category)`.
    pub async fn submit_votes(
        &self,
        room_code: &str,
        voter: UserId,
        votes: &HashMap<String, bool>,
    ) {
        let room_code = normalize_room_code(room_code);
        let Some(game) = self.games.get(&room_code).map(|g| Arc::clone(g.value())) else {
            return;
        };

        let mut st = game.state.lock().await;
        if st.phase != RacePhase::Voting {
            return;
        }

        // Validate the whole batch before applying any of it.
        let mut parsed: Vec<(UserId, String, bool)> = Vec::with_capacity(votes.len());
        for (key, accept) in votes {
            let Some((target, category)) = parse_vote_key(key, &st.categories) else {
                drop(st);
                self.hub
                    .send_error_to_user(&room_code, voter, ErrorCode::InvalidPayload)
                    .await;
                return;
            };
            if target == voter {
                drop(st);
                self.hub
                    .send_error_to_user(&room_code, voter, ErrorCode::SelfVoteForbidden)
                    .await;
                return;
            }
            parsed.push((target, category, *accept));
        }

        for (target, category, accept) in parsed {
            // Only answers that are actually on the ballot can be voted on.
            let has_answer = st
                .players
                .get(&target)
                .and_then(|p| p.answers.get(&category))
                .is_some_and(|a| !a.is_empty());
            if !has_answer {
                continue;
            }
            st.votes
                .entry(category)
                .or_default()
                .entry(target)
                .or_default()
                .entry(voter)
                .or_insert(accept);
        }

        let done = st.cast_votes() >= st.expected_votes();
        if done {
            if let Some(stop) = &st.stop_voting {
                let _ = stop.try_send(());
            }
        }
        drop(st);

        self.hub
            .send_to_user(&room_code, voter, &ServerMessage::VotesSubmitted)
            .await;
    }

    /// Score the round: 0 for empty or voted-down answers, 2 for unique
    /// accepted answers, 1 for shared ones. Solo rounds count any non-empty
    /// answer as accepted.
    async fn end_round(&self, game: &RaceGame) -> RoundResultPayload {
        let mut st = game.state.lock().await;
        st.phase = RacePhase::Results;
        let solo = st.players.len() < 2;
        let names = self.display_names(st.room_id).await;

        let mut results: HashMap<UserId, i32> = HashMap::new();
        let mut details: HashMap<String, Vec<AnswerDetail>> = HashMap::new();

        for category in st.categories.clone() {
            // First pass: which players hold a valid answer, and its
            // normalized form for uniqueness grouping.
            let mut valid: Vec<(UserId, String, String, u32, u32)> = Vec::new();
            let mut rejected: Vec<(UserId, String, u32, u32)> = Vec::new();

            for (user_id, sheet) in &st.players {
                let answer = sheet.answers.get(&category).cloned().unwrap_or_default();
                if answer.is_empty() {
                    continue;
                }
                let (votes_for, votes_against) = if solo {
                    (0, 0)
                } else {
                    let ballots = st
                        .votes
                        .get(&category)
                        .and_then(|per_target| per_target.get(user_id));
                    match ballots {
                        Some(ballots) => {
                            let votes_for = ballots.values().filter(|v| **v).count() as u32;
                            let votes_against = ballots.len() as u32 - votes_for;
                            (votes_for, votes_against)
                        }
                        None => (0, 0),
                    }
                };

                let is_valid = if solo {
                    true
                } else {
                    votes_for + votes_against > 0 && votes_for > votes_against
                };

                if is_valid {
                    valid.push((
                        *user_id,
                        answer.clone(),
                        text::normalize(&answer),
                        votes_for,
                        votes_against,
                    ));
                } else {
                    rejected.push((*user_id, answer, votes_for, votes_against));
                }
            }

            let mut entries: Vec<AnswerDetail> = Vec::new();
            for (user_id, answer, normalized, votes_for, votes_against) in &valid {
                let unique = valid
                    .iter()
                    .filter(|(other, _, other_norm, _, _)| {
                        other != user_id && other_norm == normalized
                    })
                    .count()
                    == 0;
                let points = if unique { 2 } else { 1 };
                *results.entry(*user_id).or_default() += points;
                entries.push(AnswerDetail {
                    user_id: *user_id,
                    pseudo: names.get(user_id).cloned().unwrap_or_default(),
                    answer: answer.clone(),
                    valid: true,
                    votes_for: *votes_for,
                    votes_against: *votes_against,
                    unique,
                    points,
                });
            }
            for (user_id, answer, votes_for, votes_against) in rejected {
                results.entry(user_id).or_default();
                entries.push(AnswerDetail {
                    user_id,
                    pseudo: names.get(&user_id).cloned().unwrap_or_default(),
                    answer,
                    valid: false,
                    votes_for,
                    votes_against,
                    unique: false,
                    points: 0,
                });
            }
            details.insert(category, entries);
        }

        // Accumulate into cumulative scores and the per-round history. Every
        // participant appears in the results, if only with 0 points.
        let participants: Vec<UserId> = st.players.keys().copied().collect();
        for user_id in &participants {
            let earned = *results.entry(*user_id).or_default();
            st.round_points.entry(*user_id).or_default().push(earned);
        }
        let room_id = st.room_id;
        drop(st);

        for (user_id, earned) in &results {
            if *earned > 0 {
                let _ = self.rooms.add_score(room_id, *user_id, *earned).await;
            }
        }

        let scores = match self.rooms.get_room(room_id) {
            Ok(shared) => scoreboard_of(&*shared.read().await),
            Err(_) => HashMap::new(),
        };

        RoundResultPayload {
            results,
            details,
            scores,
        }
    }

    async fn end_game(&self, room_code: &str, game: &RaceGame) {
        let (room_id, round_points) = {
            let mut st = game.state.lock().await;
            st.phase = RacePhase::Finished;
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

        let mut rankings: Vec<UserId> = scores.keys().copied().collect();
        rankings.sort_by_key(|user_id| {
            (
                std::cmp::Reverse(scores.get(user_id).map_or(0, |e| e.score)),
                *user_id,
            )
        });

        self.hub
            .broadcast(
                room_code,
                &ServerMessage::GameEnd(Box::new(GameEndPayload {
                    rankings,
                    scores,
                    round_scores: round_points,
                })),
            )
            .await;

        if let Err(e) = self
            .store
            .record_game(room_id, GameKind::CategoryRace, results)
            .await
        {
            tracing::warn!(%room_id, error = %e, "Failed to persist Category Race results");
        }

        self.games.remove(&normalize_room_code(room_code));
        tracing::info!(%room_code, "Category Race finished");
    }

    /// Cancellable sleep. Returns false when the game was cancelled.
    async fn pause(&self, game: &RaceGame, duration: Duration) -> bool {
        tokio::select! {
            () = game.cancel.cancelled() => false,
            () = sleep(duration) => true,
        }
    }
}

/// Parse `"<targetUserId>_<category>"`. The category must be one of the
/// round's categories (categories themselves never contain `_`).
fn parse_vote_key(key: &str, categories: &[String]) -> Option<(UserId, String)> {
    let (target, category) = key.split_once('_')?;
    let target: UserId = target.parse().ok()?;
    categories
        .iter()
        .find(|c| c.as_str() == category)
        .map(|c| (target, c.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_pool_is_a_through_v() {
        assert_eq!(LETTER_POOL.len(), 22);
        assert_eq!(LETTER_POOL[0], 'A');
        assert_eq!(LETTER_POOL[21], 'V');
        assert!(!LETTER_POOL.contains(&'W'));
        assert!(!LETTER_POOL.contains(&'Z'));
    }

    #[test]
    fn vote_key_parsing() {
        let categories = vec!["artiste".to_string(), "album".to_string()];
        assert_eq!(
            parse_vote_key("42_artiste", &categories),
            Some((42, "artiste".to_string()))
        );
        assert_eq!(parse_vote_key("42_film", &categories), None);
        assert_eq!(parse_vote_key("nope_artiste", &categories), None);
        assert_eq!(parse_vote_key("42", &categories), None);
    }

    fn bare_state() -> RaceState {
        RaceState {
            room_id: uuid::Uuid::new_v4(),
            categories: vec!["artiste".to_string()],
            total_rounds: 9,
            current_round: 0,
            current_letter: ' ',
            used_letters: Vec::new(),
            duration: 60,
            vote_time: 30,
            players: HashMap::new(),
            votes: HashMap::new(),
            round_points: HashMap::new(),
            stopped_by: None,
            phase: RacePhase::Answering,
            deadline: None,
            stop_answering: None,
            stop_voting: None,
        }
    }

    #[test]
    fn letters_never_repeat_until_pool_exhausted() {
        let mut st = bare_state();
        let mut seen = Vec::new();
        for _ in 0..LETTER_POOL.len() {
            let letter = st.pick_letter();
            assert!(!seen.contains(&letter), "letter {letter} repeated early");
            seen.push(letter);
        }
        // Pool exhausted: the used list resets and letters may repeat.
        let next = st.pick_letter();
        assert!(LETTER_POOL.contains(&next));
        assert_eq!(st.used_letters.len(), 1);
    }

    #[test]
    fn expected_votes_counts_other_players_only() {
        let mut st = bare_state();
        for user_id in 1..=3 {
            let mut sheet = PlayerRound::default();
            sheet
                .answers
                .insert("artiste".to_string(), "Beyonce".to_string());
            st.players.insert(user_id, sheet);
        }
        // 3 answers, each judged by the 2 other players.
        assert_eq!(st.expected_votes(), 6);

        st.players.get_mut(&3).unwrap().answers.insert(
            "artiste".to_string(),
            String::new(),
        );
        assert_eq!(st.expected_votes(), 4);
    }
}
