//! Signing and verification of the consensus message types.

use vnc_types::{Block, Transaction, Vote};

use crate::{SignatureVerifier, Signer};

/// Sign the transaction hash. The caller is responsible for `tx.from`
/// matching the signer's address.
pub fn sign_transaction(mut tx: Transaction, signer: &dyn Signer) -> Transaction {
    tx.signature = signer.sign(&tx.hash);
    tx
}

pub fn verify_transaction(verifier: &dyn SignatureVerifier, tx: &Transaction) -> bool {
    tx.has_valid_hash() && verifier.verify(&tx.from, &tx.hash, &tx.signature)
}

pub fn sign_block(mut block: Block, signer: &dyn Signer) -> Block {
    block.signature = signer.sign(&block.hash);
    block
}

/// Proposer signature over the block hash.
pub fn verify_block_signature(verifier: &dyn SignatureVerifier, block: &Block) -> bool {
    verifier.verify(&block.header.proposer, &block.hash, &block.signature)
}

pub fn sign_vote(mut vote: Vote, signer: &dyn Signer, chain_id: u64) -> Vote {
    vote.signature = signer.sign(&vote.signing_bytes(chain_id));
    vote
}

pub fn verify_vote(verifier: &dyn SignatureVerifier, vote: &Vote, chain_id: u64) -> bool {
    verifier.verify(&vote.voter, &vote.signing_bytes(chain_id), &vote.signature)
}
