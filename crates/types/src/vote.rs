use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::hash::Hash32;

const VOTE_DOMAIN: &[u8] = b"vnc/vote/v1";

/// A validator's verdict on the candidate block at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: Address,
    pub height: u64,
    pub block_hash: Hash32,
    pub approve: bool,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl Vote {
    pub fn new(voter: Address, height: u64, block_hash: Hash32, approve: bool) -> Self {
        Self {
            voter,
            height,
            block_hash,
            approve,
            signature: Vec::new(),
        }
    }

    /// Bytes the voter signs. Binding the chain id and height keeps a vote
    /// from being replayed on another chain or round.
    pub fn signing_bytes(&self, chain_id: u64) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(VOTE_DOMAIN);
        hasher.update(&chain_id.to_be_bytes());
        hasher.update(&self.height.to_be_bytes());
        hasher.update(&self.block_hash);
        hasher.update(&[u8::from(self.approve)]);
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_bytes_bind_every_field() {
        let vote = Vote::new(Address::from("v1"), 5, [7u8; 32], true);
        let base = vote.signing_bytes(20250);

        assert_ne!(base, vote.signing_bytes(1));

        let mut other = vote.clone();
        other.height = 6;
        assert_ne!(base, other.signing_bytes(20250));

        let mut reject = vote.clone();
        reject.approve = false;
        assert_ne!(base, reject.signing_bytes(20250));

        let mut foreign = vote;
        foreign.block_hash = [8u8; 32];
        assert_ne!(base, foreign.signing_bytes(20250));
    }
}
