use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::hash::{merkle_root, Hash32, ZERO_HASH};
use crate::transaction::{update_len_prefixed, Transaction};

const BLOCK_DOMAIN: &[u8] = b"vnc/block/v1";

/// Fields covered by the block hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: u64,
    /// Strictly increasing; genesis is height 0, the first produced block is 1
    pub height: u64,
    pub parent_hash: Hash32,
    /// Unix time in milliseconds
    pub timestamp_ms: u64,
    pub proposer: Address,
    /// Merkle root of the ordered transaction hashes
    pub tx_root: Hash32,
    /// Ledger digest after applying the block
    pub state_root: Hash32,
    pub gas_used: u64,
    pub gas_limit: u64,
}

impl BlockHeader {
    /// Digest over the canonical header encoding.
    pub fn compute_hash(&self) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(BLOCK_DOMAIN);
        hasher.update(&self.chain_id.to_be_bytes());
        hasher.update(&self.height.to_be_bytes());
        hasher.update(&self.parent_hash);
        hasher.update(&self.timestamp_ms.to_be_bytes());
        update_len_prefixed(&mut hasher, self.proposer.as_bytes());
        hasher.update(&self.tx_root);
        hasher.update(&self.state_root);
        hasher.update(&self.gas_used.to_be_bytes());
        hasher.update(&self.gas_limit.to_be_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// A block: header, its hash, ordered transactions and the proposer signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub hash: Hash32,
    pub transactions: Vec<Transaction>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl Block {
    /// Build an unsigned block; the hash is derived from the header.
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        let hash = header.compute_hash();
        Self {
            header,
            hash,
            transactions,
            signature: Vec::new(),
        }
    }

    /// Height-0 anchor block. It has no proposer and no transactions.
    pub fn genesis(chain_id: u64, state_root: Hash32, timestamp_ms: u64, gas_limit: u64) -> Self {
        Self::new(
            BlockHeader {
                chain_id,
                height: 0,
                parent_hash: ZERO_HASH,
                timestamp_ms,
                proposer: Address::default(),
                tx_root: ZERO_HASH,
                state_root,
                gas_used: 0,
                gas_limit,
            },
            Vec::new(),
        )
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn parent_hash(&self) -> &Hash32 {
        &self.header.parent_hash
    }

    pub fn proposer(&self) -> &Address {
        &self.header.proposer
    }

    pub fn tx_hashes(&self) -> Vec<Hash32> {
        self.transactions.iter().map(|tx| tx.hash).collect()
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.header.compute_hash()
    }

    /// `true` when `tx_root` matches the carried transactions.
    pub fn has_valid_tx_root(&self) -> bool {
        self.header.tx_root == merkle_root(&self.tx_hashes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            chain_id: 20250,
            height: 1,
            parent_hash: [1u8; 32],
            timestamp_ms: 1_700_000_000_000,
            proposer: Address::from("validator-a"),
            tx_root: ZERO_HASH,
            state_root: [2u8; 32],
            gas_used: 0,
            gas_limit: 30_000_000,
        }
    }

    #[test]
    fn block_hash_follows_header() {
        let block = Block::new(sample_header(), Vec::new());
        assert!(block.has_valid_hash());
        assert!(block.has_valid_tx_root());

        let mut header = sample_header();
        header.timestamp_ms += 1;
        assert_ne!(Block::new(header, Vec::new()).hash, block.hash);
    }

    #[test]
    fn chain_id_separates_hashes() {
        let mut other = sample_header();
        other.chain_id = 1;
        assert_ne!(other.compute_hash(), sample_header().compute_hash());
    }

    #[test]
    fn tx_root_detects_reordering() {
        let t1 = Transaction::new(Address::from("a"), Address::from("b"), Amount::from(1), 0);
        let t2 = Transaction::new(Address::from("a"), Address::from("b"), Amount::from(1), 1);
        let mut header = sample_header();
        header.tx_root = merkle_root(&[t1.hash, t2.hash]);
        let mut block = Block::new(header, vec![t1, t2]);
        assert!(block.has_valid_tx_root());
        block.transactions.reverse();
        assert!(!block.has_valid_tx_root());
    }

    #[test]
    fn genesis_is_anchored_on_zero_parent() {
        let genesis = Block::genesis(20250, [3u8; 32], 0, 30_000_000);
        assert_eq!(genesis.height(), 0);
        assert_eq!(genesis.parent_hash(), &ZERO_HASH);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.has_valid_hash());
    }

    #[test]
    fn json_roundtrip_for_storage() {
        let block = Block::new(sample_header(), Vec::new());
        let json = serde_json::to_vec(&block).unwrap();
        let back: Block = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, block);
    }
}
