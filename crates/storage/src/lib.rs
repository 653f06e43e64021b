//! Durable storage collaborator.
//!
//! The consensus engine only needs keyed `put`/`get` per namespace; it writes
//! exclusively when a block commits. Values are JSON documents, keys are
//! namespace-specific (see [`keys`]).

use std::fmt;

mod batch;
mod memory;
mod sled_store;
mod typed;

pub use batch::WriteBatch;
pub use memory::MemoryStorage;
pub use sled_store::SledStorage;
pub use typed::{keys, StorageExt};

/// Logical partitions of the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    Block,
    Transaction,
    State,
    Validator,
    Metadata,
    Receipt,
}

impl Namespace {
    pub const ALL: [Namespace; 6] = [
        Namespace::Block,
        Namespace::Transaction,
        Namespace::State,
        Namespace::Validator,
        Namespace::Metadata,
        Namespace::Receipt,
    ];

    /// Position in [`Namespace::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Namespace::Block => "block",
            Namespace::Transaction => "tx",
            Namespace::State => "state",
            Namespace::Validator => "validator",
            Namespace::Metadata => "meta",
            Namespace::Receipt => "receipt",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{namespace}/{key} not found")]
    NotFound { namespace: Namespace, key: String },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn not_found(namespace: Namespace, key: &[u8]) -> Self {
        StorageError::NotFound {
            namespace,
            key: printable_key(key),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

fn printable_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if s.chars().all(|c| !c.is_control()) => s.to_string(),
        _ => hex::encode(key),
    }
}

/// Key/value contract every backend implements.
pub trait Storage: Send + Sync {
    fn put(&self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] when the key is absent.
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Vec<u8>, StorageError>;

    /// All entries of a namespace in ascending key order.
    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Apply every write of `batch` or none of them.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    fn flush(&self) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_keys_are_readable() {
        let err = StorageError::not_found(Namespace::Metadata, b"latest_height");
        assert_eq!(err.to_string(), "meta/latest_height not found");
        assert!(err.is_not_found());

        let err = StorageError::not_found(Namespace::Block, &7u64.to_be_bytes());
        assert_eq!(err.to_string(), "block/0000000000000007 not found");
    }

    #[test]
    fn index_matches_all_order() {
        for (position, namespace) in Namespace::ALL.iter().enumerate() {
            assert_eq!(namespace.index(), position);
        }
    }
}
