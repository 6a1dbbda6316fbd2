use arrayvec::ArrayVec;
use chrono::{DateTime, Utc};
use rand::RngExt;

use super::board::Board;
use super::seat::Seat;
use crate::protocol::{GameError, PieceSize, PlayerId, SkipReason};

/// Rule knobs a match is constructed with (taken from config).
#[derive(Debug, Clone, Copy)]
pub struct MatchRules {
    pub turn_timeout_ms: u64,
    /// A seat is eliminated when its skip streak reaches this value.
    pub skip_limit: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            turn_timeout_ms: 60_000,
            skip_limit: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Playing,
    Finished,
}

/// Engine-level events, emitted in the exact order things happened. The room
/// maps these onto wire messages; their order is the total order clients
/// observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    TurnStarted {
        seat_id: PlayerId,
    },
    TurnSkipped {
        seat_id: PlayerId,
        reason: SkipReason,
    },
    SeatEliminated {
        seat_id: PlayerId,
    },
    Finished {
        winner_id: Option<PlayerId>,
        is_draw: bool,
    },
}

/// One match. Owned by a room; seat records stay with the room and are
/// passed into every call, so the engine never holds references across
/// await points.
#[derive(Debug)]
pub struct Match {
    pub board: Board,
    /// Join-order snapshot of the seats taken at match start. Disconnects
    /// and eliminations never reorder it.
    seat_order: ArrayVec<PlayerId, 4>,
    pub current_seat: Option<PlayerId>,
    pub status: MatchStatus,
    pub winner_id: Option<PlayerId>,
    pub is_draw: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub turn_started_at: Option<DateTime<Utc>>,
    pub turn_deadline: Option<DateTime<Utc>>,
    /// Bumped on every `current_seat` change; timeout messages carry the
    /// epoch they were armed for and are ignored on mismatch.
    pub turn_epoch: u64,
    rules: MatchRules,
}

fn seat_index(seats: &[Seat], id: PlayerId) -> Option<usize> {
    seats.iter().position(|s| s.id == id)
}

impl Match {
    /// Start a match over the given seats with a uniformly random starter.
    /// Resets every seat's inventory, skip streak, and elimination flag.
    pub fn new(seats: &mut [Seat], rules: MatchRules) -> (Self, Vec<EngineEvent>) {
        let starter = rand::rng().random_range(0..seats.len());
        Self::with_starter(seats, starter, rules)
    }

    /// Deterministic variant used by tests and replays of known games.
    pub fn with_starter(
        seats: &mut [Seat],
        starter: usize,
        rules: MatchRules,
    ) -> (Self, Vec<EngineEvent>) {
        let mut seat_order = ArrayVec::new();
        for seat in seats.iter_mut() {
            seat.reset_for_match();
            seat_order.push(seat.id);
        }

        let mut game = Self {
            board: Board::default(),
            seat_order,
            current_seat: None,
            status: MatchStatus::Playing,
            winner_id: None,
            is_draw: false,
            started_at: Utc::now(),
            finished_at: None,
            turn_started_at: None,
            turn_deadline: None,
            turn_epoch: 0,
            rules,
        };

        let mut events = Vec::new();
        let starter_id = game.seat_order[starter % game.seat_order.len()];
        game.set_current(Some(starter_id));
        if seats[seat_index(seats, starter_id).unwrap_or(0)].is_active() {
            game.begin_turn(starter_id, &mut events);
        } else {
            // The drawn starter is disconnected (possible on replay); hand
            // the turn straight to the next active seat.
            game.advance_turn(seats, &mut events);
        }
        (game, events)
    }

    pub fn rules(&self) -> MatchRules {
        self.rules
    }

    /// Milliseconds left on the active turn, zero once the deadline passed
    /// or no turn is live.
    pub fn remaining_ms(&self) -> u64 {
        self.turn_deadline
            .map(|deadline| {
                (deadline - Utc::now())
                    .num_milliseconds()
                    .try_into()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Validate and apply a move for `seat_id`. On any rejection the board,
    /// inventories, and turn state are untouched.
    pub fn submit_move(
        &mut self,
        seats: &mut [Seat],
        seat_id: PlayerId,
        cell: usize,
        size: PieceSize,
    ) -> Result<Vec<EngineEvent>, GameError> {
        if self.status != MatchStatus::Playing {
            return Err(GameError::MatchNotActive);
        }
        if self.current_seat != Some(seat_id) {
            return Err(GameError::NotYourTurn);
        }
        // Moves landing after the deadline lose to the timeout already in
        // flight for this epoch.
        if self
            .turn_deadline
            .is_some_and(|deadline| Utc::now() > deadline)
        {
            return Err(GameError::NotYourTurn);
        }
        let idx = seat_index(seats, seat_id).ok_or(GameError::SeatNotFound(seat_id))?;
        if seats[idx].is_eliminated {
            return Err(GameError::SeatEliminated);
        }
        if seats[idx].inventory.count(size) == 0 {
            return Err(GameError::OutOfPieces(size));
        }
        let color = seats[idx].color;
        let next_board = self.board.with_move(cell, size, color)?;

        // Committed from here on.
        self.board = next_board;
        seats[idx].use_piece(size)?;
        seats[idx].reset_skips();

        let mut events = Vec::new();
        if self.board.has_win(color) {
            self.finish(Some(seat_id), false, &mut events);
        } else if self.no_active_seat_can_move(seats) {
            self.finish(None, true, &mut events);
        } else {
            self.advance_turn(seats, &mut events);
        }
        Ok(events)
    }

    /// Skip the current seat (timeout, or explicit leave while holding the
    /// turn) and advance. A no-op once the match is finished.
    pub fn force_skip(&mut self, seats: &mut [Seat], reason: SkipReason) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.status != MatchStatus::Playing {
            return events;
        }
        let Some(current) = self.current_seat else {
            return events;
        };
        if let Some(idx) = seat_index(seats, current) {
            self.skip_seat(seats, idx, reason, &mut events);
        }
        if self.status == MatchStatus::Playing {
            self.advance_turn(seats, &mut events);
        }
        events
    }

    /// Explicit leave during play: the seat is eliminated and its placed
    /// pieces stay on the board. When the leaver holds the turn it is
    /// skipped first so the turn advances cleanly before the forfeit check.
    pub fn resign(&mut self, seats: &mut [Seat], seat_id: PlayerId) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.status != MatchStatus::Playing {
            return events;
        }
        if self.current_seat == Some(seat_id) {
            events.extend(self.force_skip(seats, SkipReason::Leave));
        }
        if let Some(idx) = seat_index(seats, seat_id) {
            if !seats[idx].is_eliminated {
                seats[idx].eliminate();
                events.push(EngineEvent::SeatEliminated { seat_id });
            }
        }
        if self.status == MatchStatus::Playing {
            if self.finish_if_decided(seats, &mut events) {
                return events;
            }
            if self
                .current_seat
                .and_then(|cur| seat_index(seats, cur))
                .is_some_and(|idx| !seats[idx].is_active())
            {
                self.advance_turn(seats, &mut events);
            } else if self.no_active_seat_can_move(seats) {
                self.finish(None, true, &mut events);
            }
        }
        events
    }

    /// Whether a timeout message armed for (`seat_id`, `epoch`) still refers
    /// to the live turn.
    pub fn timeout_is_current(&self, seat_id: PlayerId, epoch: u64) -> bool {
        self.status == MatchStatus::Playing
            && self.current_seat == Some(seat_id)
            && self.turn_epoch == epoch
    }

    fn set_current(&mut self, seat: Option<PlayerId>) {
        self.current_seat = seat;
        self.turn_epoch += 1;
    }

    fn begin_turn(&mut self, seat_id: PlayerId, events: &mut Vec<EngineEvent>) {
        let now = Utc::now();
        self.turn_started_at = Some(now);
        self.turn_deadline =
            Some(now + chrono::Duration::milliseconds(self.rules.turn_timeout_ms as i64));
        events.push(EngineEvent::TurnStarted { seat_id });
    }

    fn skip_seat(
        &mut self,
        seats: &mut [Seat],
        idx: usize,
        reason: SkipReason,
        events: &mut Vec<EngineEvent>,
    ) {
        let newly_eliminated = seats[idx].register_skip(self.rules.skip_limit);
        events.push(EngineEvent::TurnSkipped {
            seat_id: seats[idx].id,
            reason,
        });
        if newly_eliminated {
            events.push(EngineEvent::SeatEliminated {
                seat_id: seats[idx].id,
            });
        }
    }

    /// Finish the match if at most one seat is still uneliminated. Returns
    /// true when it did.
    fn finish_if_decided(&mut self, seats: &[Seat], events: &mut Vec<EngineEvent>) -> bool {
        let mut uneliminated = seats.iter().filter(|s| !s.is_eliminated);
        let first = uneliminated.next().map(|s| s.id);
        if uneliminated.next().is_some() {
            return false;
        }
        self.finish(first, first.is_none(), events);
        true
    }

    fn no_active_seat_can_move(&self, seats: &[Seat]) -> bool {
        !seats
            .iter()
            .any(|s| s.is_active() && self.board.any_legal_move(&s.inventory))
    }

    /// Hand the turn to the next active seat after the current one, skipping
    /// seats with no legal move along the way. Re-evaluates the global draw
    /// condition before every hop so a fully stuck table drains to a draw
    /// instead of inflating skip streaks.
    fn advance_turn(&mut self, seats: &mut [Seat], events: &mut Vec<EngineEvent>) {
        loop {
            if self.status != MatchStatus::Playing {
                return;
            }
            if self.finish_if_decided(seats, events) {
                return;
            }
            if !seats.iter().any(Seat::is_active) {
                // Nobody can take a turn; more than one seat survives, so
                // nobody wins either.
                self.finish(None, true, events);
                return;
            }
            if self.no_active_seat_can_move(seats) {
                self.finish(None, true, events);
                return;
            }
            let Some((idx, next_id)) = self.next_active_after_current(seats) else {
                self.finish(None, true, events);
                return;
            };
            self.set_current(Some(next_id));
            if self.board.any_legal_move(&seats[idx].inventory) {
                self.begin_turn(next_id, events);
                return;
            }
            self.skip_seat(seats, idx, SkipReason::NoLegalMoves, events);
        }
    }

    fn next_active_after_current(&self, seats: &[Seat]) -> Option<(usize, PlayerId)> {
        let len = self.seat_order.len();
        let start = self
            .current_seat
            .and_then(|cur| self.seat_order.iter().position(|&id| id == cur))
            .map_or(0, |pos| pos + 1);
        for offset in 0..len {
            let id = self.seat_order[(start + offset) % len];
            if let Some(idx) = seat_index(seats, id) {
                if seats[idx].is_active() {
                    return Some((idx, id));
                }
            }
        }
        None
    }

    fn finish(
        &mut self,
        winner_id: Option<PlayerId>,
        is_draw: bool,
        events: &mut Vec<EngineEvent>,
    ) {
        self.status = MatchStatus::Finished;
        self.winner_id = winner_id;
        self.is_draw = is_draw;
        self.finished_at = Some(Utc::now());
        self.turn_deadline = None;
        self.turn_started_at = None;
        self.set_current(None);
        events.push(EngineEvent::Finished { winner_id, is_draw });
    }
}
