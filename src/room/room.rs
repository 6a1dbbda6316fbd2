use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::replay::{ReplayVote, VoteProgress};
use super::timer::TurnTimer;
use crate::config::GameConfig;
use crate::game::{EngineEvent, Match, MatchRules, MatchStatus, Seat};
use crate::metrics::ServerMetrics;
use crate::protocol::{
    GameError, GameStatePayload, GameStatus, PieceSize, PlayerId, RoomId, RoomSummary, RoomView,
    RoomWelcome, ServerMessage, SkipReason, COLOR_PALETTE,
};

/// Handle to one client connection's bounded outbound queue. Rooms and the
/// dispatcher push with `try_send`; whoever observes an overflow declares
/// the connection unhealthy and trips `shut_down`, which ends its socket
/// loops and runs the normal disconnect path.
#[derive(Debug, Clone)]
pub struct ClientSender {
    tx: mpsc::Sender<Arc<ServerMessage>>,
    kill: CancellationToken,
}

impl ClientSender {
    pub fn new(tx: mpsc::Sender<Arc<ServerMessage>>, kill: CancellationToken) -> Self {
        Self { tx, kill }
    }

    pub fn try_send(
        &self,
        message: Arc<ServerMessage>,
    ) -> Result<(), TrySendError<Arc<ServerMessage>>> {
        self.tx.try_send(message)
    }

    /// Tear the connection down; its socket loop is watching this token.
    pub fn shut_down(&self) {
        self.kill.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Accepting joins.
    Waiting,
    /// A match runs (or just finished and a replay vote is open).
    Playing,
    /// Terminal; awaiting eviction by the lobby.
    Closed,
}

/// How a seat left: an explicit request, or the transport dropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveMode {
    Explicit,
    Disconnect,
}

/// What a leave did, for the lobby's host index bookkeeping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LeaveEffects {
    pub seat_existed: bool,
    /// `(old_host, new_host)` when the host role moved.
    pub host_transfer: Option<(PlayerId, PlayerId)>,
    pub closed: bool,
}

/// Validated creation parameters (the lobby runs the validators first).
#[derive(Debug, Clone)]
pub struct RoomOptions {
    pub name: String,
    pub capacity: u8,
    pub is_private: bool,
    pub code: Option<String>,
    pub host_nickname: String,
}

/// Everything needed to sort and filter a room in lobby listings, captured
/// under the room lock in one go.
#[derive(Debug, Clone)]
pub struct ListingSnapshot {
    pub summary: RoomSummary,
    pub created_at: DateTime<Utc>,
    /// Match start when one ran, creation time otherwise.
    pub activity_at: DateTime<Utc>,
}

struct RoomState {
    name: String,
    capacity: u8,
    is_private: bool,
    /// SHA-256 of the access code; plaintext is never stored.
    code_digest: Option<[u8; 32]>,
    host_id: PlayerId,
    expires_at: DateTime<Utc>,
    phase: RoomPhase,
    /// Ordered by join; the earliest-joined seat inherits the host role.
    seats: Vec<Seat>,
    game: Option<Match>,
    replay: Option<ReplayVote>,
    /// Bumped per vote so a stale expiry task cannot touch a newer vote.
    vote_epoch: u64,
    senders: HashMap<PlayerId, ClientSender>,
    timer: TurnTimer,
    vote_timer: Option<tokio::task::JoinHandle<()>>,
    rules: GameConfig,
}

/// One game table. The interior mutex is the serialization boundary the
/// whole design rests on: every mutation of seats, match, timers, and vote
/// happens under it, and handlers never await foreign I/O while holding it.
pub struct Room {
    pub id: RoomId,
    pub created_at: DateTime<Utc>,
    metrics: Arc<ServerMetrics>,
    /// Tells the lobby to purge this room after it closes itself (vote
    /// rejection, expiry, last seat gone).
    closed_tx: mpsc::UnboundedSender<RoomId>,
    state: Mutex<RoomState>,
}

fn code_digest(code: &str) -> [u8; 32] {
    Sha256::digest(code.as_bytes()).into()
}

impl Room {
    /// Create the room and seat the host. The host's `room-created` welcome
    /// is pushed onto `host_sender` before this returns.
    pub fn open(
        options: RoomOptions,
        host_sender: ClientSender,
        rules: GameConfig,
        metrics: Arc<ServerMetrics>,
        closed_tx: mpsc::UnboundedSender<RoomId>,
    ) -> (Arc<Self>, PlayerId) {
        let now = Utc::now();
        let host_seat = Seat::new(options.host_nickname, COLOR_PALETTE[0], true);
        let host_id = host_seat.id;

        let mut senders = HashMap::new();
        senders.insert(host_id, host_sender);

        let state = RoomState {
            name: options.name,
            capacity: options.capacity,
            is_private: options.is_private,
            code_digest: options.code.as_deref().map(code_digest),
            host_id,
            expires_at: now + chrono::Duration::milliseconds(rules.room_ttl_ms as i64),
            phase: RoomPhase::Waiting,
            seats: vec![host_seat],
            game: None,
            replay: None,
            vote_epoch: 0,
            senders,
            timer: TurnTimer::default(),
            vote_timer: None,
            rules,
        };

        let room = Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: now,
            metrics,
            closed_tx,
            state: Mutex::new(state),
        });

        {
            // Deliver the welcome through the normal fan-out path.
            let mut st = room.state.try_lock().expect("freshly created room lock");
            let view = room.view_locked(&st);
            room.send_to_locked(
                &mut st,
                host_id,
                ServerMessage::RoomCreated(Box::new(RoomWelcome {
                    player_id: host_id,
                    room: view,
                })),
            );
        }

        room.metrics.increment_rooms_created();
        tracing::info!(room_id = %room.id, %host_id, "Room created");
        (room, host_id)
    }

    /// Seat a new player. Starts the match (and resets the TTL) the moment
    /// the room reaches capacity.
    pub async fn join(
        self: &Arc<Self>,
        nickname: String,
        code: Option<&str>,
        sender: ClientSender,
    ) -> Result<PlayerId, GameError> {
        let mut st = self.state.lock().await;
        match st.phase {
            RoomPhase::Closed => return Err(GameError::RoomNotFound),
            RoomPhase::Playing => return Err(GameError::MatchInProgress),
            RoomPhase::Waiting => {}
        }
        if Utc::now() > st.expires_at {
            return Err(GameError::RoomExpired);
        }
        if st.seats.len() >= st.capacity as usize {
            return Err(GameError::RoomFull);
        }
        self.verify_code_locked(&st, code)?;

        let color = COLOR_PALETTE
            .iter()
            .find(|&&c| st.seats.iter().all(|s| s.color != c))
            .copied()
            .ok_or(GameError::ColorExhausted)?;

        let seat = Seat::new(nickname, color, false);
        let seat_id = seat.id;
        let seat_view = seat.view();
        st.seats.push(seat);
        st.senders.insert(seat_id, sender);

        let view = self.view_locked(&st);
        self.send_to_locked(
            &mut st,
            seat_id,
            ServerMessage::RoomJoined(Box::new(RoomWelcome {
                player_id: seat_id,
                room: view,
            })),
        );
        self.broadcast_except_locked(&mut st, seat_id, ServerMessage::PlayerJoined {
            player: seat_view,
        });

        tracing::info!(room_id = %self.id, player_id = %seat_id, "Player joined room");

        if st.seats.len() == st.capacity as usize {
            self.start_match_locked(&mut st, false);
        }
        Ok(seat_id)
    }

    /// Re-bind a disconnected seat to a fresh transport within the grace
    /// window. Ships a full snapshot to the new endpoint.
    pub async fn reconnect(
        self: &Arc<Self>,
        seat_id: PlayerId,
        sender: ClientSender,
    ) -> Result<PlayerId, GameError> {
        let mut st = self.state.lock().await;
        if st.phase == RoomPhase::Closed {
            return Err(GameError::RoomNotFound);
        }
        let grace_ms = st.rules.reconnect_grace_ms;
        let seat = st
            .seats
            .iter_mut()
            .find(|s| s.id == seat_id)
            .ok_or(GameError::SeatNotFound(seat_id))?;
        if seat.connected {
            return Err(GameError::AlreadyInRoom);
        }
        let lapsed = seat
            .disconnected_at
            .is_some_and(|at| Utc::now() - at > chrono::Duration::milliseconds(grace_ms as i64));
        if lapsed {
            return Err(GameError::ReconnectExpired);
        }
        seat.set_connected(true);
        st.senders.insert(seat_id, sender);

        let view = self.view_locked(&st);
        self.send_to_locked(
            &mut st,
            seat_id,
            ServerMessage::RoomJoined(Box::new(RoomWelcome {
                player_id: seat_id,
                room: view,
            })),
        );
        self.broadcast_except_locked(
            &mut st,
            seat_id,
            ServerMessage::PlayerReconnected { player_id: seat_id },
        );
        tracing::info!(room_id = %self.id, player_id = %seat_id, "Player reconnected");
        Ok(seat_id)
    }

    /// Take a seat out of the room (Waiting) or out of play (Playing).
    pub async fn leave(self: &Arc<Self>, seat_id: PlayerId, mode: LeaveMode) -> LeaveEffects {
        let mut st = self.state.lock().await;
        let mut effects = LeaveEffects::default();
        if st.phase == RoomPhase::Closed {
            return effects;
        }
        let Some(pos) = st.seats.iter().position(|s| s.id == seat_id) else {
            return effects;
        };
        effects.seat_existed = true;

        match st.phase {
            RoomPhase::Waiting => {
                // Same path for explicit leaves and dropped transports: a
                // waiting room holds no per-seat progress worth preserving.
                let seat = st.seats.remove(pos);
                st.senders.remove(&seat_id);
                self.broadcast_locked(&mut st, ServerMessage::PlayerLeft { player_id: seat_id });
                if seat.is_host {
                    if let Some(next) = st.seats.first_mut() {
                        next.set_host(true);
                        let new_host = next.id;
                        st.host_id = new_host;
                        effects.host_transfer = Some((seat_id, new_host));
                        self.broadcast_locked(
                            &mut st,
                            ServerMessage::HostTransferred {
                                new_host_id: new_host,
                            },
                        );
                        tracing::info!(room_id = %self.id, %new_host, "Host transferred");
                    }
                }
                if st.seats.is_empty() {
                    self.close_locked(&mut st, "last seat left");
                    effects.closed = true;
                }
            }
            RoomPhase::Playing => {
                st.seats[pos].set_connected(false);
                st.senders.remove(&seat_id);
                match mode {
                    LeaveMode::Explicit => {
                        let match_running = st
                            .game
                            .as_ref()
                            .is_some_and(|g| g.status == MatchStatus::Playing);
                        if match_running {
                            let mut game = st.game.take();
                            let events = game
                                .as_mut()
                                .map(|g| g.resign(&mut st.seats, seat_id))
                                .unwrap_or_default();
                            st.game = game;
                            tracing::info!(
                                room_id = %self.id,
                                player_id = %seat_id,
                                "Seat resigned mid-game"
                            );
                            self.apply_engine_events_locked(&mut st, events);
                            if self.match_running_locked(&st) {
                                let payload = self.game_payload_locked(&st);
                                self.broadcast_locked(
                                    &mut st,
                                    ServerMessage::GameUpdated {
                                        game_state: payload,
                                    },
                                );
                            }
                        } else {
                            // Match already over; the seat just drops out of
                            // the (fixed) voter set's reachable members.
                            self.broadcast_locked(
                                &mut st,
                                ServerMessage::PlayerDisconnected { player_id: seat_id },
                            );
                        }
                    }
                    LeaveMode::Disconnect => {
                        // Seat keeps its pieces and inventory; the turn
                        // timer keeps running and the skip cascade applies.
                        self.broadcast_locked(
                            &mut st,
                            ServerMessage::PlayerDisconnected { player_id: seat_id },
                        );
                        tracing::info!(room_id = %self.id, player_id = %seat_id, "Seat disconnected");
                    }
                }
            }
            RoomPhase::Closed => {}
        }
        if st.phase == RoomPhase::Closed {
            effects.closed = true;
        }
        effects
    }

    /// Validate and apply a move; all rejections leave the room untouched.
    pub async fn submit_move(
        self: &Arc<Self>,
        seat_id: PlayerId,
        cell: usize,
        size: PieceSize,
    ) -> Result<(), GameError> {
        let mut st = self.state.lock().await;
        if st.phase != RoomPhase::Playing {
            return Err(GameError::MatchNotActive);
        }
        let mut game = st.game.take().ok_or(GameError::MatchNotActive)?;
        let result = game.submit_move(&mut st.seats, seat_id, cell, size);
        st.game = Some(game);
        let events = match result {
            Ok(events) => events,
            Err(err) => {
                self.metrics.increment_moves_rejected();
                return Err(err);
            }
        };

        self.metrics.increment_moves_applied();
        let payload = self.game_payload_locked(&st);
        self.broadcast_locked(&mut st, ServerMessage::GameUpdated {
            game_state: payload,
        });
        self.apply_engine_events_locked(&mut st, events);
        Ok(())
    }

    /// Cast (or change) a replay ballot.
    pub async fn cast_replay_vote(
        self: &Arc<Self>,
        seat_id: PlayerId,
        ballot: bool,
    ) -> Result<(), GameError> {
        let mut st = self.state.lock().await;
        if st.phase == RoomPhase::Closed {
            return Err(GameError::RoomNotFound);
        }
        let vote = st.replay.as_mut().ok_or(GameError::VoteNotActive)?;
        let progress = vote.cast(seat_id, ballot)?;
        let ballots = vote.ballots();
        self.broadcast_locked(&mut st, ServerMessage::ReplayVoteUpdated {
            replay_votes: ballots,
        });

        match progress {
            VoteProgress::Pending => {}
            VoteProgress::Accepted => {
                self.metrics.increment_replays_accepted();
                if let Some(task) = st.vote_timer.take() {
                    task.abort();
                }
                st.replay = None;
                tracing::info!(room_id = %self.id, "Replay accepted; restarting match");
                self.start_match_locked(&mut st, true);
            }
            VoteProgress::Rejected => {
                self.metrics.increment_replays_rejected();
                if let Some(task) = st.vote_timer.take() {
                    task.abort();
                }
                st.replay = None;
                self.broadcast_locked(&mut st, ServerMessage::ReplayRejected);
                self.close_locked(&mut st, "replay rejected");
            }
        }
        Ok(())
    }

    /// Full authoritative snapshot.
    pub async fn snapshot(&self) -> RoomView {
        let st = self.state.lock().await;
        self.view_locked(&st)
    }

    pub async fn summary(&self) -> RoomSummary {
        let st = self.state.lock().await;
        self.summary_locked(&st)
    }

    /// Listing data for the lobby; `None` once closed or expired.
    pub async fn listing_snapshot(&self) -> Option<ListingSnapshot> {
        let st = self.state.lock().await;
        if st.phase == RoomPhase::Closed || Utc::now() > st.expires_at {
            return None;
        }
        Some(ListingSnapshot {
            summary: self.summary_locked(&st),
            created_at: self.created_at,
            activity_at: st
                .game
                .as_ref()
                .map_or(self.created_at, |g| g.started_at),
        })
    }

    pub async fn contains_seat(&self, seat_id: PlayerId) -> bool {
        let st = self.state.lock().await;
        st.seats.iter().any(|s| s.id == seat_id)
    }

    /// Expired (TTL) or self-closed; the lobby sweep evicts these.
    pub async fn should_evict(&self) -> bool {
        let st = self.state.lock().await;
        st.phase == RoomPhase::Closed || Utc::now() > st.expires_at
    }

    /// Close an expired room on eviction so its timers die with it.
    pub async fn shut_down(self: &Arc<Self>, reason: &str) {
        let mut st = self.state.lock().await;
        self.close_locked(&mut st, reason);
    }

    // ------------------------------------------------------------------
    // Timer and vote callbacks (re-enter through the lock)
    // ------------------------------------------------------------------

    async fn on_turn_timeout(self: Arc<Self>, seat_id: PlayerId, epoch: u64) {
        let mut st = self.state.lock().await;
        if st.phase != RoomPhase::Playing {
            return;
        }
        let Some(game) = st.game.as_ref() else {
            return;
        };
        if !game.timeout_is_current(seat_id, epoch) {
            tracing::debug!(room_id = %self.id, %seat_id, epoch, "Ignoring stale turn timeout");
            return;
        }
        tracing::info!(room_id = %self.id, %seat_id, "Turn timed out");
        let mut game = st.game.take();
        let events = game
            .as_mut()
            .map(|g| g.force_skip(&mut st.seats, SkipReason::Timeout))
            .unwrap_or_default();
        st.game = game;
        self.apply_engine_events_locked(&mut st, events);
    }

    async fn on_tick(self: Arc<Self>) {
        let mut st = self.state.lock().await;
        if st.phase != RoomPhase::Playing {
            return;
        }
        let Some(game) = st.game.as_ref() else {
            return;
        };
        if game.status != MatchStatus::Playing {
            return;
        }
        let update = ServerMessage::TimerUpdate {
            turn_time_left: game.remaining_ms() / 1000,
            current_player_id: game.current_seat,
        };
        self.broadcast_locked(&mut st, update);
    }

    async fn on_vote_deadline(self: Arc<Self>, epoch: u64) {
        let mut st = self.state.lock().await;
        let Some(vote) = st.replay.as_ref() else {
            return;
        };
        if vote.epoch != epoch || vote.is_complete() {
            return;
        }
        tracing::info!(room_id = %self.id, "Replay vote expired");
        self.metrics.increment_replays_expired();
        st.replay = None;
        st.vote_timer = None;
        self.broadcast_locked(&mut st, ServerMessage::ReplayTimeout);
        self.close_locked(&mut st, "replay vote expired");
    }

    // ------------------------------------------------------------------
    // Locked helpers
    // ------------------------------------------------------------------

    fn verify_code_locked(&self, st: &RoomState, provided: Option<&str>) -> Result<(), GameError> {
        match (&st.code_digest, provided) {
            (None, _) => Ok(()),
            (Some(expected), Some(code)) => {
                // Constant-time, case-sensitive comparison of digests.
                let provided = code_digest(code);
                if bool::from(provided[..].ct_eq(&expected[..])) {
                    Ok(())
                } else {
                    Err(GameError::InvalidAccessCode)
                }
            }
            (Some(_), None) => Err(GameError::InvalidAccessCode),
        }
    }

    fn match_running_locked(&self, st: &RoomState) -> bool {
        st.phase == RoomPhase::Playing
            && st
                .game
                .as_ref()
                .is_some_and(|g| g.status == MatchStatus::Playing)
    }

    /// (Re)start a match over the current seats: fresh board, fresh
    /// inventories, random starter, TTL pushed out.
    fn start_match_locked(self: &Arc<Self>, st: &mut RoomState, is_replay: bool) {
        let rules = MatchRules {
            turn_timeout_ms: st.rules.turn_timeout_ms,
            skip_limit: st.rules.consecutive_skip_limit,
        };
        let (game, events) = Match::new(&mut st.seats, rules);
        st.game = Some(game);
        st.phase = RoomPhase::Playing;
        st.expires_at = Utc::now() + chrono::Duration::milliseconds(st.rules.room_ttl_ms as i64);
        self.metrics.increment_matches_started();
        tracing::info!(room_id = %self.id, is_replay, "Match started");

        let payload = self.game_payload_locked(st);
        let announcement = if is_replay {
            ServerMessage::GameRestarted {
                game_state: payload,
            }
        } else {
            ServerMessage::GameStarted {
                game_state: payload,
            }
        };
        self.broadcast_locked(st, announcement);

        // ~1 Hz countdown loop for the lifetime of this match.
        let token = CancellationToken::new();
        st.timer.set_tick(token.clone());
        let room = Arc::clone(self);
        let tick = st.rules.timer_tick();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + tick;
            let mut interval = tokio::time::interval_at(start, tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => room.clone().on_tick().await,
                }
            }
        });

        self.apply_engine_events_locked(st, events);
    }

    /// Translate engine events to wire messages in order, then settle the
    /// clock: rearm the one-shot while playing, tear everything down and
    /// open the replay vote on a terminal transition.
    fn apply_engine_events_locked(self: &Arc<Self>, st: &mut RoomState, events: Vec<EngineEvent>) {
        let mut finished = false;
        for event in events {
            match event {
                EngineEvent::TurnStarted { .. } => {}
                EngineEvent::TurnSkipped { seat_id, reason } => {
                    self.metrics.increment_turns_skipped();
                    let payload = self.game_payload_locked(st);
                    self.broadcast_locked(st, ServerMessage::TurnSkipped {
                        skipped_player_id: seat_id,
                        reason,
                        game_state: payload,
                    });
                }
                EngineEvent::SeatEliminated { seat_id } => {
                    self.metrics.increment_seats_eliminated();
                    self.broadcast_locked(st, ServerMessage::PlayerEliminated { player_id: seat_id });
                }
                EngineEvent::Finished { winner_id, is_draw } => {
                    finished = true;
                    self.metrics.increment_matches_finished();
                    let payload = self.game_payload_locked(st);
                    self.broadcast_locked(st, ServerMessage::GameEnded {
                        winner_id,
                        is_draw,
                        game_state: payload,
                    });
                }
            }
        }

        if finished {
            st.timer.cancel_all();
            self.open_replay_vote_locked(st);
        } else if self.match_running_locked(st) {
            self.arm_turn_timer_locked(st);
        }
    }

    fn arm_turn_timer_locked(self: &Arc<Self>, st: &mut RoomState) {
        let Some(game) = st.game.as_ref() else {
            return;
        };
        let Some(seat_id) = game.current_seat else {
            return;
        };
        let epoch = game.turn_epoch;
        let delay = std::time::Duration::from_millis(game.remaining_ms());
        let room = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            room.on_turn_timeout(seat_id, epoch).await;
        });
        st.timer.arm_deadline(task);
    }

    /// Open the post-match vote among the seats connected right now. With
    /// nobody connected there is nobody to ask: the room closes instead.
    fn open_replay_vote_locked(self: &Arc<Self>, st: &mut RoomState) {
        let voters: SmallVec<[PlayerId; 4]> = st
            .seats
            .iter()
            .filter(|s| s.connected)
            .map(|s| s.id)
            .collect();
        if voters.is_empty() {
            self.close_locked(st, "no connected seats after match");
            return;
        }
        st.vote_epoch += 1;
        let epoch = st.vote_epoch;
        let vote = ReplayVote::open(voters, st.rules.replay_vote_window_ms, epoch);
        self.broadcast_locked(st, ServerMessage::ReplayVotingStarted {
            replay_deadline: vote.deadline_ms(),
            replay_votes: vote.ballots(),
        });
        tracing::info!(room_id = %self.id, voters = vote.voter_count(), "Replay vote opened");
        st.replay = Some(vote);

        let room = Arc::clone(self);
        let window = st.rules.replay_vote_window();
        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            room.on_vote_deadline(epoch).await;
        });
        if let Some(old) = st.vote_timer.replace(task) {
            old.abort();
        }
    }

    fn close_locked(&self, st: &mut RoomState, reason: &str) {
        if st.phase == RoomPhase::Closed {
            return;
        }
        st.phase = RoomPhase::Closed;
        st.timer.cancel_all();
        if let Some(task) = st.vote_timer.take() {
            task.abort();
        }
        st.replay = None;
        self.metrics.increment_rooms_closed();
        let _ = self.closed_tx.send(self.id);
        tracing::info!(room_id = %self.id, reason, "Room closed");
    }

    fn status_locked(&self, st: &RoomState) -> GameStatus {
        match st.phase {
            RoomPhase::Waiting => GameStatus::Waiting,
            RoomPhase::Playing => match st.game.as_ref().map(|g| g.status) {
                Some(MatchStatus::Playing) => GameStatus::Playing,
                _ => GameStatus::Finished,
            },
            RoomPhase::Closed => GameStatus::Finished,
        }
    }

    fn game_payload_locked(&self, st: &RoomState) -> GameStatePayload {
        let status = self.status_locked(st);
        match st.game.as_ref() {
            Some(game) => GameStatePayload {
                board: game.board.cells,
                players: st.seats.iter().map(Seat::view).collect(),
                current_player_id: game.current_seat,
                status,
                winner_id: game.winner_id,
                is_draw: game.is_draw,
                started_at: Some(game.started_at.timestamp_millis()),
                finished_at: game.finished_at.map(|t| t.timestamp_millis()),
                turn_time_left: game.remaining_ms() / 1000,
            },
            None => GameStatePayload {
                board: Default::default(),
                players: st.seats.iter().map(Seat::view).collect(),
                current_player_id: None,
                status,
                winner_id: None,
                is_draw: false,
                started_at: None,
                finished_at: None,
                turn_time_left: 0,
            },
        }
    }

    fn view_locked(&self, st: &RoomState) -> RoomView {
        RoomView {
            room_id: self.id,
            name: st.name.clone(),
            capacity: st.capacity,
            is_private: st.is_private,
            host_id: st.host_id,
            expires_at: st.expires_at.timestamp_millis(),
            game: self.game_payload_locked(st),
        }
    }

    fn summary_locked(&self, st: &RoomState) -> RoomSummary {
        RoomSummary {
            id: self.id,
            name: st.name.clone(),
            player_count: st.seats.len(),
            capacity: st.capacity,
            is_private: st.is_private,
            status: self.status_locked(st),
        }
    }

    // ------------------------------------------------------------------
    // Fan-out. `try_send` only: a connection whose queue overflows is
    // dropped here, which closes its channel and lets the socket task run
    // the normal disconnect path. Rooms never wait for slow clients.
    // ------------------------------------------------------------------

    fn broadcast_locked(&self, st: &mut RoomState, message: ServerMessage) {
        let message = Arc::new(message);
        let metrics = &self.metrics;
        let room_id = self.id;
        st.senders.retain(|player_id, tx| {
            match tx.try_send(Arc::clone(&message)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    metrics.increment_messages_dropped();
                    tracing::warn!(
                        %room_id,
                        %player_id,
                        "Outbound queue overflow; dropping connection"
                    );
                    tx.shut_down();
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }

    fn broadcast_except_locked(
        &self,
        st: &mut RoomState,
        except: PlayerId,
        message: ServerMessage,
    ) {
        let message = Arc::new(message);
        let metrics = &self.metrics;
        let room_id = self.id;
        st.senders.retain(|player_id, tx| {
            if *player_id == except {
                return true;
            }
            match tx.try_send(Arc::clone(&message)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    metrics.increment_messages_dropped();
                    tracing::warn!(
                        %room_id,
                        %player_id,
                        "Outbound queue overflow; dropping connection"
                    );
                    tx.shut_down();
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }

    fn send_to_locked(&self, st: &mut RoomState, player_id: PlayerId, message: ServerMessage) {
        let Some(tx) = st.senders.get(&player_id).cloned() else {
            return;
        };
        match tx.try_send(Arc::new(message)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.metrics.increment_messages_dropped();
                tx.shut_down();
                st.senders.remove(&player_id);
            }
            Err(TrySendError::Closed(_)) => {
                st.senders.remove(&player_id);
            }
        }
    }
}
