use std::collections::BTreeMap;
use vnc_types::{Address, Hash32, Vote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    Duplicate,
    /// The voter's earlier vote of the same kind for another hash was dropped.
    Replaced,
}

/// Votes for a single height: one approval and one rejection per voter.
///
/// Votes may arrive before the candidate they refer to; they are kept and
/// counted once the candidate hash is known. A newer vote of the same kind
/// replaces the older one, so a voter never holds more than two entries.
#[derive(Debug, Default)]
pub struct VoteCollector {
    votes: BTreeMap<(Address, bool), Vote>,
}

impl VoteCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, vote: Vote) -> VoteOutcome {
        let key = (vote.voter.clone(), vote.approve);
        let hash = vote.block_hash;
        match self.votes.insert(key, vote) {
            None => VoteOutcome::Recorded,
            Some(previous) if previous.block_hash == hash => VoteOutcome::Duplicate,
            Some(_) => VoteOutcome::Replaced,
        }
    }

    /// Distinct approving voters for `hash` that satisfy `eligible`.
    pub fn approvals_for(&self, hash: &Hash32, eligible: impl Fn(&Address) -> bool) -> usize {
        self.votes
            .values()
            .filter(|vote| vote.approve && vote.block_hash == *hash && eligible(&vote.voter))
            .count()
    }

    pub fn rejections_for(&self, hash: &Hash32) -> usize {
        self.votes
            .values()
            .filter(|vote| !vote.approve && vote.block_hash == *hash)
            .count()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}
