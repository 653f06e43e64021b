use thiserror::Error;
use vnc_ledger::LedgerError;
use vnc_mempool::MempoolError;
use vnc_storage::StorageError;
use vnc_types::{Address, Amount};

use crate::config::ConfigError;

/// Why a transaction was left out of a candidate block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction hash does not match its contents")]
    InvalidHash,
    #[error("invalid signature from {0}")]
    InvalidSignature(Address),
    #[error("gas limit {gas_limit} below intrinsic cost {required}")]
    IntrinsicGas { gas_limit: u64, required: u64 },
    #[error("block gas budget exhausted")]
    BlockGasExhausted,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ValidationError {
    /// Permanent failures can never succeed in a later block.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::InvalidHash | Self::InvalidSignature(_) | Self::IntrinsicGas { .. } => true,
            Self::BlockGasExhausted => false,
            Self::Ledger(err) => err.is_permanent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("stake {provided} below minimum {required}")]
    InsufficientStake { required: Amount, provided: Amount },
    #[error("validator set is full ({max} active)")]
    RegistrySaturated { max: usize },
    #[error("validator {0} is already registered")]
    AlreadyRegistered(Address),
    #[error("commission {0} bps exceeds 10000")]
    InvalidCommission(u32),
    #[error("unknown validator {0}")]
    UnknownValidator(Address),
}

/// A received block failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("unexpected height: expected {expected}, got {got}")]
    UnexpectedHeight { expected: u64, got: u64 },
    #[error("parent hash does not match the chain tip")]
    ParentMismatch,
    #[error("chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch { expected: u64, got: u64 },
    #[error("timestamp {got} precedes parent timestamp {parent}")]
    TimestampRegression { parent: u64, got: u64 },
    #[error("gas limit mismatch: expected {expected}, got {got}")]
    GasLimitMismatch { expected: u64, got: u64 },
    #[error("unexpected proposer {got}, expected {expected}")]
    UnexpectedProposer { expected: Address, got: Address },
    #[error("invalid proposer signature")]
    InvalidSignature,
    #[error("block hash mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: String, got: String },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode {kind} payload: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to encode payload: {0}")]
    Encode(#[source] bincode::Error),
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("no active validators")]
    NoActiveValidators,
    #[error("round {height} timed out with {approvals}/{quorum} approvals")]
    QuorumTimeout {
        height: u64,
        approvals: usize,
        quorum: usize,
    },
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("registration rejected: {0}")]
    Registration(#[from] RegistrationError),
    #[error("block rejected: {0}")]
    Block(#[from] BlockError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("mempool rejected transaction: {0}")]
    Mempool(#[from] MempoolError),
    #[error("transaction rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("round in progress at height {0}")]
    RoundInProgress(u64),
    #[error("stored state root does not match block {height}")]
    StateRootMismatch { height: u64 },
    #[error("engine stopped")]
    EngineStopped,
}

impl ConsensusError {
    /// Transient errors are recovered by the engine itself on a later tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::QuorumTimeout { .. }
                | Self::Block(_)
                | Self::Codec(_)
                | Self::Mempool(_)
                | Self::Validation(_)
                | Self::RoundInProgress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_nonce_is_permanent_but_insufficient_funds_is_not() {
        let stale = ValidationError::Ledger(LedgerError::NonceMismatch {
            address: Address::from("alice"),
            expected: 3,
            got: 1,
        });
        assert!(stale.is_permanent());

        let future = ValidationError::Ledger(LedgerError::NonceMismatch {
            address: Address::from("alice"),
            expected: 3,
            got: 5,
        });
        assert!(!future.is_permanent());

        let broke = ValidationError::Ledger(LedgerError::InsufficientFunds {
            address: Address::from("alice"),
            balance: Amount::zero(),
            required: Amount::from(1),
        });
        assert!(!broke.is_permanent());
        assert!(!ValidationError::BlockGasExhausted.is_permanent());
        assert!(ValidationError::InvalidHash.is_permanent());
    }

    #[test]
    fn storage_and_empty_set_are_surfaced() {
        let storage = ConsensusError::from(StorageError::Unavailable("disk".into()));
        assert!(!storage.is_transient());
        assert!(!ConsensusError::NoActiveValidators.is_transient());
        assert!(ConsensusError::QuorumTimeout {
            height: 5,
            approvals: 2,
            quorum: 3
        }
        .is_transient());
    }
}
