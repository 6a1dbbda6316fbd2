use chrono::{DateTime, Utc};
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::protocol::{GameError, PlayerId, ReplayVotes};

/// How a ballot moved the vote forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteProgress {
    /// Ballots are still outstanding.
    Pending,
    /// Every voter said yes.
    Accepted,
    /// Every voter has spoken and at least one said no.
    Rejected,
}

/// A post-match replay vote. The voter set is frozen at the instant the vote
/// opens: seats connecting or disconnecting afterwards neither gain nor lose
/// a ballot.
#[derive(Debug)]
pub struct ReplayVote {
    voters: SmallVec<[PlayerId; 4]>,
    votes: HashMap<PlayerId, bool>,
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Distinguishes successive votes in one room so a stale expiry timer
    /// cannot touch a newer vote.
    pub epoch: u64,
}

impl ReplayVote {
    pub fn open(voters: SmallVec<[PlayerId; 4]>, window_ms: u64, epoch: u64) -> Self {
        let opened_at = Utc::now();
        Self {
            voters,
            votes: HashMap::new(),
            opened_at,
            deadline: opened_at + chrono::Duration::milliseconds(window_ms as i64),
            epoch,
        }
    }

    /// Record (or change) a ballot. Re-casting the same value is accepted
    /// silently; the tally is evaluated as soon as every voter has spoken.
    pub fn cast(&mut self, seat_id: PlayerId, vote: bool) -> Result<VoteProgress, GameError> {
        if !self.voters.contains(&seat_id) {
            return Err(GameError::NotAVoter);
        }
        if Utc::now() > self.deadline {
            return Err(GameError::VoteClosed);
        }
        self.votes.insert(seat_id, vote);
        Ok(self.progress())
    }

    fn progress(&self) -> VoteProgress {
        if self.votes.len() < self.voters.len() {
            return VoteProgress::Pending;
        }
        if self.votes.values().all(|&v| v) {
            VoteProgress::Accepted
        } else {
            VoteProgress::Rejected
        }
    }

    pub fn is_complete(&self) -> bool {
        self.votes.len() == self.voters.len()
    }

    /// Ballot board for the wire: every voter keyed, `None` until they cast.
    pub fn ballots(&self) -> ReplayVotes {
        self.voters
            .iter()
            .map(|&id| (id, self.votes.get(&id).copied()))
            .collect()
    }

    pub fn deadline_ms(&self) -> i64 {
        self.deadline.timestamp_millis()
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn vote_of(n: usize) -> (ReplayVote, Vec<PlayerId>) {
        let ids: Vec<PlayerId> = (0..n).map(|_| Uuid::new_v4()).collect();
        let vote = ReplayVote::open(ids.iter().copied().collect(), 30_000, 1);
        (vote, ids)
    }

    #[test]
    fn unanimous_yes_accepts_on_last_ballot() {
        let (mut vote, ids) = vote_of(3);
        assert_eq!(vote.cast(ids[0], true).unwrap(), VoteProgress::Pending);
        assert_eq!(vote.cast(ids[1], true).unwrap(), VoteProgress::Pending);
        assert_eq!(vote.cast(ids[2], true).unwrap(), VoteProgress::Accepted);
    }

    #[test]
    fn one_no_rejects_as_soon_as_all_spoke() {
        let (mut vote, ids) = vote_of(3);
        vote.cast(ids[0], false).unwrap();
        vote.cast(ids[1], true).unwrap();
        // Rejection waits for the last outstanding ballot.
        assert!(!vote.is_complete());
        assert_eq!(vote.cast(ids[2], true).unwrap(), VoteProgress::Rejected);
    }

    #[test]
    fn recasting_is_idempotent_and_changes_are_allowed() {
        let (mut vote, ids) = vote_of(2);
        vote.cast(ids[0], true).unwrap();
        assert_eq!(vote.cast(ids[0], true).unwrap(), VoteProgress::Pending);
        // Changing a ballot before the window closes is allowed.
        vote.cast(ids[0], false).unwrap();
        assert_eq!(vote.cast(ids[1], true).unwrap(), VoteProgress::Rejected);
    }

    #[test]
    fn outsiders_cannot_vote() {
        let (mut vote, _) = vote_of(2);
        assert_eq!(vote.cast(Uuid::new_v4(), true), Err(GameError::NotAVoter));
    }

    #[test]
    fn late_seats_do_not_join_the_voter_set() {
        let (vote, ids) = vote_of(2);
        let ballots = vote.ballots();
        assert_eq!(ballots.len(), 2);
        assert!(ids.iter().all(|id| ballots.contains_key(id)));
    }

    #[test]
    fn casting_after_the_deadline_fails() {
        let ids: SmallVec<[PlayerId; 4]> = std::iter::repeat_with(Uuid::new_v4).take(2).collect();
        let first = ids[0];
        let mut vote = ReplayVote::open(ids, 0, 1);
        vote.deadline = Utc::now() - chrono::Duration::milliseconds(1);
        assert_eq!(vote.cast(first, true), Err(GameError::VoteClosed));
    }

    #[test]
    fn ballots_expose_missing_votes_as_null() {
        let (mut vote, ids) = vote_of(2);
        vote.cast(ids[0], true).unwrap();
        let ballots = vote.ballots();
        assert_eq!(ballots.get(&ids[0]), Some(&Some(true)));
        assert_eq!(ballots.get(&ids[1]), Some(&None));
        let json = serde_json::to_value(&ballots).unwrap();
        assert_eq!(json[ids[1].to_string()], serde_json::Value::Null);
    }
}
