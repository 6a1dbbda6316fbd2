use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters, updated lock-free from any task and served as a
/// JSON snapshot on `/metrics` (and folded into `/health`).
#[derive(Debug, Default)]
pub struct ServerMetrics {
    active_connections: AtomicU64,
    connections_total: AtomicU64,
    rooms_created: AtomicU64,
    rooms_closed: AtomicU64,
    rooms_expired: AtomicU64,
    matches_started: AtomicU64,
    matches_finished: AtomicU64,
    moves_applied: AtomicU64,
    moves_rejected: AtomicU64,
    turns_skipped: AtomicU64,
    seats_eliminated: AtomicU64,
    replays_accepted: AtomicU64,
    replays_rejected: AtomicU64,
    replays_expired: AtomicU64,
    messages_dropped: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub active_connections: u64,
    pub connections_total: u64,
    pub rooms_created: u64,
    pub rooms_closed: u64,
    pub rooms_expired: u64,
    pub matches_started: u64,
    pub matches_finished: u64,
    pub moves_applied: u64,
    pub moves_rejected: u64,
    pub turns_skipped: u64,
    pub seats_eliminated: u64,
    pub replays_accepted: u64,
    pub replays_rejected: u64,
    pub replays_expired: u64,
    pub messages_dropped: u64,
}

macro_rules! counter {
    ($inc:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // Saturating: unregister can race a failed register in tests.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    counter!(increment_rooms_created, rooms_created);
    counter!(increment_rooms_closed, rooms_closed);
    counter!(increment_rooms_expired, rooms_expired);
    counter!(increment_matches_started, matches_started);
    counter!(increment_matches_finished, matches_finished);
    counter!(increment_moves_applied, moves_applied);
    counter!(increment_moves_rejected, moves_rejected);
    counter!(increment_turns_skipped, turns_skipped);
    counter!(increment_seats_eliminated, seats_eliminated);
    counter!(increment_replays_accepted, replays_accepted);
    counter!(increment_replays_rejected, replays_rejected);
    counter!(increment_replays_expired, replays_expired);
    counter!(increment_messages_dropped, messages_dropped);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            rooms_closed: self.rooms_closed.load(Ordering::Relaxed),
            rooms_expired: self.rooms_expired.load(Ordering::Relaxed),
            matches_started: self.matches_started.load(Ordering::Relaxed),
            matches_finished: self.matches_finished.load(Ordering::Relaxed),
            moves_applied: self.moves_applied.load(Ordering::Relaxed),
            moves_rejected: self.moves_rejected.load(Ordering::Relaxed),
            turns_skipped: self.turns_skipped.load(Ordering::Relaxed),
            seats_eliminated: self.seats_eliminated.load(Ordering::Relaxed),
            replays_accepted: self.replays_accepted.load(Ordering::Relaxed),
            replays_rejected: self.replays_rejected.load(Ordering::Relaxed),
            replays_expired: self.replays_expired.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_active_connections();
        metrics.increment_rooms_created();
        metrics.increment_moves_applied();
        metrics.increment_moves_applied();

        let snap = metrics.snapshot();
        assert_eq!(snap.active_connections, 1);
        assert_eq!(snap.connections_total, 2);
        assert_eq!(snap.rooms_created, 1);
        assert_eq!(snap.moves_applied, 2);
    }

    #[test]
    fn active_connections_never_underflow() {
        let metrics = ServerMetrics::new();
        metrics.decrement_active_connections();
        assert_eq!(metrics.snapshot().active_connections, 0);
    }
}
