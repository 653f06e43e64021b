use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::{Namespace, Storage, StorageError, WriteBatch};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory backend for tests and ephemeral nodes.
///
/// Clones share the same underlying map, so a test can hand one clone to an
/// engine and inspect or reuse the other after the engine is dropped.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    trees: Arc<RwLock<HashMap<Namespace, Tree>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, namespace: Namespace) -> usize {
        self.trees
            .read()
            .get(&namespace)
            .map(|tree| tree.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.trees.read().values().all(|tree| tree.is_empty())
    }
}

impl Storage for MemoryStorage {
    fn put(&self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.trees
            .write()
            .entry(namespace)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.trees
            .read()
            .get(&namespace)
            .and_then(|tree| tree.get(key).cloned())
            .ok_or_else(|| StorageError::not_found(namespace, key))
    }

    fn scan(&self, namespace: Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .trees
            .read()
            .get(&namespace)
            .map(|tree| tree.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    /// One write lock covers the whole batch.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut trees = self.trees.write();
        for (namespace, key, value) in batch.into_ops() {
            trees.entry(namespace).or_default().insert(key, value);
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
