use serde::Serialize;
use vnc_types::{hash_hex, Account, Address, Block, Hash32, Receipt, Transaction};

use crate::typed::keys;
use crate::{Namespace, StorageError};

/// Writes that [`Storage::write_batch`](crate::Storage::write_batch) applies
/// all-or-nothing, possibly spanning several namespaces.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<(Namespace, Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, namespace: Namespace, key: &[u8], value: Vec<u8>) {
        self.ops.push((namespace, key.to_vec(), value));
    }

    pub fn put_json<T: Serialize>(
        &mut self,
        namespace: Namespace,
        key: &[u8],
        value: &T,
    ) -> Result<(), StorageError> {
        let data = serde_json::to_vec(value)?;
        self.put(namespace, key, data);
        Ok(())
    }

    pub fn store_block(&mut self, block: &Block) -> Result<(), StorageError> {
        self.put_json(Namespace::Block, &keys::block(block.height()), block)
    }

    pub fn store_transaction(&mut self, tx: &Transaction) -> Result<(), StorageError> {
        self.put_json(Namespace::Transaction, &keys::by_hash(&tx.hash), tx)
    }

    pub fn store_receipt(&mut self, receipt: &Receipt) -> Result<(), StorageError> {
        self.put_json(Namespace::Receipt, &keys::by_hash(&receipt.tx_hash), receipt)
    }

    pub fn store_account(&mut self, account: &Account) -> Result<(), StorageError> {
        self.put_json(Namespace::State, &keys::by_address(&account.address), account)
    }

    pub fn store_validator<V: Serialize>(
        &mut self,
        address: &Address,
        record: &V,
    ) -> Result<(), StorageError> {
        self.put_json(Namespace::Validator, &keys::by_address(address), record)
    }

    pub fn set_chain_tip(&mut self, height: u64, hash: &Hash32) -> Result<(), StorageError> {
        self.put_json(Namespace::Metadata, keys::LATEST_HASH, &hash_hex(hash))?;
        self.put_json(Namespace::Metadata, keys::LATEST_HEIGHT, &height)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn touches(&self, namespace: Namespace) -> bool {
        self.ops.iter().any(|(ns, _, _)| *ns == namespace)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Namespace, &[u8], &[u8])> {
        self.ops
            .iter()
            .map(|(ns, key, value)| (*ns, key.as_slice(), value.as_slice()))
    }

    pub fn into_ops(self) -> Vec<(Namespace, Vec<u8>, Vec<u8>)> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStorage, Storage, StorageExt};
    use vnc_types::{Amount, ZERO_HASH};

    #[test]
    fn batch_spans_namespaces_in_order() {
        let mut batch = WriteBatch::new();
        batch
            .store_account(&Account::new(Address::from("alice"), Amount::from(5)))
            .unwrap();
        batch.set_chain_tip(3, &[1u8; 32]).unwrap();

        assert_eq!(batch.len(), 3);
        assert!(batch.touches(Namespace::State));
        assert!(batch.touches(Namespace::Metadata));
        assert!(!batch.touches(Namespace::Block));
        let order: Vec<Namespace> = batch.iter().map(|(ns, _, _)| ns).collect();
        assert_eq!(order, vec![Namespace::State, Namespace::Metadata, Namespace::Metadata]);
    }

    #[test]
    fn memory_backend_applies_the_whole_batch() {
        let store = MemoryStorage::new();
        let genesis = Block::genesis(1, ZERO_HASH, 0, 30_000_000);
        let mut batch = WriteBatch::new();
        batch.store_block(&genesis).unwrap();
        batch.set_chain_tip(0, &genesis.hash).unwrap();

        store.write_batch(batch).unwrap();
        assert_eq!(store.get_block(0).unwrap(), Some(genesis.clone()));
        assert_eq!(store.latest_height().unwrap(), Some(0));
        assert_eq!(store.latest_hash().unwrap(), Some(genesis.hash));
    }
}
