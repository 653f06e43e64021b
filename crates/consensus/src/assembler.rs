//! Deterministic block assembly and re-derivation.
//!
//! The same inputs and pre-state always produce the same block hash, so a
//! follower verifies a proposal by assembling it again and comparing hashes.

use tracing::debug;
use vnc_crypto::{verify_block_signature, verify_transaction, SignatureVerifier};
use vnc_ledger::LedgerView;
use vnc_types::{
    hash_hex, merkle_root, short_hex, Address, Block, BlockHeader, Hash32, Receipt, Transaction,
    BASE_TX_GAS,
};

use crate::error::{BlockError, ValidationError};

#[derive(Debug, Clone)]
pub struct AssemblyInput {
    pub chain_id: u64,
    pub height: u64,
    pub parent_hash: Hash32,
    pub timestamp_ms: u64,
    pub proposer: Address,
    pub gas_limit: u64,
    /// Candidate transactions in proposal order.
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTransaction {
    pub hash: Hash32,
    pub error: ValidationError,
}

/// Unsigned block plus the speculative state it leaves behind.
#[derive(Debug)]
pub struct AssembledBlock {
    pub block: Block,
    pub view: LedgerView,
    pub receipts: Vec<Receipt>,
    pub rejected: Vec<RejectedTransaction>,
}

pub fn assemble(
    input: AssemblyInput,
    mut view: LedgerView,
    verifier: &dyn SignatureVerifier,
) -> AssembledBlock {
    let mut included = Vec::with_capacity(input.transactions.len());
    let mut receipts = Vec::with_capacity(input.transactions.len());
    let mut rejected = Vec::new();
    let mut gas_used = 0u64;

    for tx in input.transactions {
        match apply_transaction(&mut view, &tx, gas_used, input.gas_limit, verifier) {
            Ok(gas) => {
                receipts.push(Receipt {
                    tx_hash: tx.hash,
                    height: input.height,
                    index: included.len() as u32,
                    gas_used: gas,
                });
                gas_used += gas;
                included.push(tx);
            }
            Err(error) => {
                debug!("skipping tx {}: {}", short_hex(&tx.hash), error);
                rejected.push(RejectedTransaction {
                    hash: tx.hash,
                    error,
                });
            }
        }
    }

    let tx_hashes: Vec<Hash32> = included.iter().map(|tx| tx.hash).collect();
    let header = BlockHeader {
        chain_id: input.chain_id,
        height: input.height,
        parent_hash: input.parent_hash,
        timestamp_ms: input.timestamp_ms,
        proposer: input.proposer,
        tx_root: merkle_root(&tx_hashes),
        state_root: view.state_digest(),
        gas_used,
        gas_limit: input.gas_limit,
    };

    AssembledBlock {
        block: Block::new(header, included),
        view,
        receipts,
        rejected,
    }
}

/// Checks one transaction and applies it; returns the gas it consumed.
fn apply_transaction(
    view: &mut LedgerView,
    tx: &Transaction,
    gas_used: u64,
    gas_limit: u64,
    verifier: &dyn SignatureVerifier,
) -> Result<u64, ValidationError> {
    if !tx.has_valid_hash() {
        return Err(ValidationError::InvalidHash);
    }
    if !verify_transaction(verifier, tx) {
        return Err(ValidationError::InvalidSignature(tx.from.clone()));
    }
    if tx.gas_limit < BASE_TX_GAS {
        return Err(ValidationError::IntrinsicGas {
            gas_limit: tx.gas_limit,
            required: BASE_TX_GAS,
        });
    }
    if gas_used.saturating_add(BASE_TX_GAS) > gas_limit {
        return Err(ValidationError::BlockGasExhausted);
    }
    view.apply_transfer(&tx.from, &tx.to, &tx.value, tx.nonce)?;
    Ok(BASE_TX_GAS)
}

/// What a follower expects of the next block.
#[derive(Debug, Clone)]
pub struct BlockContext {
    pub chain_id: u64,
    pub height: u64,
    pub parent_hash: Hash32,
    pub parent_timestamp_ms: u64,
    pub gas_limit: u64,
    pub expected_proposer: Address,
}

/// Verify a received block against `context` by re-deriving it from `view`.
pub fn verify_block(
    block: &Block,
    context: &BlockContext,
    view: LedgerView,
    verifier: &dyn SignatureVerifier,
) -> Result<AssembledBlock, BlockError> {
    let header = &block.header;
    if header.chain_id != context.chain_id {
        return Err(BlockError::ChainIdMismatch {
            expected: context.chain_id,
            got: header.chain_id,
        });
    }
    if header.height != context.height {
        return Err(BlockError::UnexpectedHeight {
            expected: context.height,
            got: header.height,
        });
    }
    if header.parent_hash != context.parent_hash {
        return Err(BlockError::ParentMismatch);
    }
    if header.timestamp_ms < context.parent_timestamp_ms {
        return Err(BlockError::TimestampRegression {
            parent: context.parent_timestamp_ms,
            got: header.timestamp_ms,
        });
    }
    if header.gas_limit != context.gas_limit {
        return Err(BlockError::GasLimitMismatch {
            expected: context.gas_limit,
            got: header.gas_limit,
        });
    }
    if header.proposer != context.expected_proposer {
        return Err(BlockError::UnexpectedProposer {
            expected: context.expected_proposer.clone(),
            got: header.proposer.clone(),
        });
    }
    if !verify_block_signature(verifier, block) {
        return Err(BlockError::InvalidSignature);
    }

    let input = AssemblyInput {
        chain_id: header.chain_id,
        height: header.height,
        parent_hash: header.parent_hash,
        timestamp_ms: header.timestamp_ms,
        proposer: header.proposer.clone(),
        gas_limit: header.gas_limit,
        transactions: block.transactions.clone(),
    };
    let mut assembled = assemble(input, view, verifier);
    if assembled.block.hash != block.hash {
        return Err(BlockError::HashMismatch {
            expected: hash_hex(&assembled.block.hash),
            got: hash_hex(&block.hash),
        });
    }
    assembled.block.signature = block.signature.clone();
    Ok(assembled)
}
