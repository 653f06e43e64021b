use std::fmt;
use vnc_ledger::LedgerView;
use vnc_types::{Address, Block, Hash32, Receipt};

use crate::assembler::RejectedTransaction;
use crate::votes::VoteCollector;

/// Engine state for the current height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoundPhase {
    #[default]
    Idle,
    Proposing,
    Collecting,
    Finalizing,
    Committed,
    Aborted,
}

impl RoundPhase {
    /// Phases in which no round holds speculative state.
    pub fn is_between_rounds(self) -> bool {
        matches!(self, Self::Idle | Self::Committed | Self::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Proposing => "proposing",
            Self::Collecting => "collecting",
            Self::Finalizing => "finalizing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate block with the speculative state it produces.
#[derive(Debug)]
pub struct Candidate {
    pub block: Block,
    pub view: LedgerView,
    pub receipts: Vec<Receipt>,
    pub rejected: Vec<RejectedTransaction>,
    /// Mempool reservations taken by the local proposer.
    pub reserved: Vec<Hash32>,
}

impl Candidate {
    pub fn hash(&self) -> Hash32 {
        self.block.hash
    }
}

#[derive(Debug)]
pub struct ConsensusRound {
    pub height: u64,
    pub proposer: Address,
    pub started_at_ms: u64,
    pub deadline_ms: u64,
    pub candidate: Option<Candidate>,
    pub votes: VoteCollector,
}

impl ConsensusRound {
    pub fn new(height: u64, proposer: Address, now_ms: u64, timeout_ms: u64) -> Self {
        Self {
            height,
            proposer,
            started_at_ms: now_ms,
            deadline_ms: now_ms.saturating_add(timeout_ms),
            candidate: None,
            votes: VoteCollector::new(),
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }

    pub fn candidate_hash(&self) -> Option<Hash32> {
        self.candidate.as_ref().map(Candidate::hash)
    }
}
