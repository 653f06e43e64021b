use sled::transaction::{ConflictableTransactionResult, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;

use crate::{Namespace, Storage, StorageError, WriteBatch};

/// Sled-backed implementation, one tree per namespace.
pub struct SledStorage {
    db: Db,
    blocks: Tree,
    transactions: Tree,
    state: Tree,
    validators: Tree,
    metadata: Tree,
    receipts: Tree,
}

impl SledStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Throwaway database removed when dropped.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let blocks = db.open_tree(Namespace::Block.name())?;
        let transactions = db.open_tree(Namespace::Transaction.name())?;
        let state = db.open_tree(Namespace::State.name())?;
        let validators = db.open_tree(Namespace::Validator.name())?;
        let metadata = db.open_tree(Namespace::Metadata.name())?;
        let receipts = db.open_tree(Namespace::Receipt.name())?;
        tracing::debug!("opened sled storage");

        Ok(Self {
            db,
            blocks,
            transactions,
            state,
            validators,
            metadata,
            receipts,
        })
    }

    fn tree(&self, namespace: Namespace) -> &Tree {
        match namespace {
            Namespace::Block => &self.blocks,
            Namespace::Transaction => &self.transactions,
            Namespace::State => &self.state,
            Namespace::Validator => &self.validators,
            Namespace::Metadata => &self.metadata,
            Namespace::Receipt => &self.receipts,
        }
    }
}

impl Storage for SledStorage {
    fn put(&self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.tree(namespace).insert(key, value)?;
        Ok(())
    }

    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.tree(namespace)
            .get(key)?
            .map(|v| v.to_vec())
            .ok_or_else(|| StorageError::not_found(namespace, key))
    }

    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        self.tree(namespace)
            .iter()
            .map(|entry| {
                let (k, v) = entry?;
                Ok((k.to_vec(), v.to_vec()))
            })
            .collect()
    }

    /// Runs as one sled transaction over every namespace tree.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        let trees: Vec<&Tree> = Namespace::ALL.iter().map(|ns| self.tree(*ns)).collect();
        trees
            .as_slice()
            .transaction(|views| -> ConflictableTransactionResult<(), ()> {
                for (namespace, key, value) in batch.iter() {
                    views[namespace.index()].insert(key, value)?;
                }
                Ok(())
            })
            .map_err(|err| match err {
                TransactionError::Storage(err) => StorageError::Database(err),
                TransactionError::Abort(()) => {
                    StorageError::Unavailable("write batch aborted".to_string())
                }
            })
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}
