use crate::sse::models::VoteEvent;
use std::collections::HashSet;

/// Client-side view of the votes cast in one voting.
///
/// Events are kept in arrival order and deduplicated by id, so a reconnect
/// that replays history cannot inflate the tally. The reported total is the
/// larger of the server's authoritative count (once `preload_complete` has
/// been seen) and the number of distinct events observed.
#[derive(Debug, Clone, Default)]
pub struct VoteAggregator {
    votes: Vec<VoteEvent>,
    seen: HashSet<i64>,
    authoritative: Option<u64>,
}

impl VoteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` unless a vote with the same id was already observed.
    /// Returns whether it was inserted.
    pub fn append_vote(&mut self, event: VoteEvent) -> bool {
        if !self.seen.insert(event.id) {
            return false;
        }
        self.votes.push(event);
        true
    }

    /// Records the server's authoritative count. The event sequence is left
    /// alone: votes cast before this client connected are not replayed one by
    /// one. A lower count than one already seen (a replayed preload after a
    /// reconnect) does not shrink the total; only `reset` does.
    pub fn reconcile_total(&mut self, authoritative_count: u64) {
        let count = self
            .authoritative
            .map_or(authoritative_count, |current| current.max(authoritative_count));
        self.authoritative = Some(count);
    }

    pub fn reset(&mut self) {
        self.votes.clear();
        self.seen.clear();
        self.authoritative = None;
    }

    pub fn votes(&self) -> &[VoteEvent] {
        &self.votes
    }

    pub fn total_count(&self) -> u64 {
        let observed = self.votes.len() as u64;
        self.authoritative.map_or(observed, |count| count.max(observed))
    }

    /// Whether the total has been confirmed by the server.
    pub fn is_authoritative(&self) -> bool {
        self.authoritative.is_some()
    }

    pub fn contains(&self, vote_id: i64) -> bool {
        self.seen.contains(&vote_id)
    }
}
