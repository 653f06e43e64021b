use serde::de::DeserializeOwned;
use serde::Serialize;
use vnc_types::{hash_hex, Account, Address, Block, Hash32, Receipt, Transaction};

use crate::{Namespace, Storage, StorageError};

/// Key layout per namespace.
pub mod keys {
    use vnc_types::{hash_hex, Address, Hash32};

    pub const LATEST_HEIGHT: &[u8] = b"latest_height";
    pub const LATEST_HASH: &[u8] = b"latest_hash";

    /// Big-endian so block keys scan in height order.
    pub fn block(height: u64) -> [u8; 8] {
        height.to_be_bytes()
    }

    pub fn by_hash(hash: &Hash32) -> Vec<u8> {
        hash_hex(hash).into_bytes()
    }

    pub fn by_address(address: &Address) -> Vec<u8> {
        address.as_bytes().to_vec()
    }
}

/// Typed JSON helpers over any [`Storage`] backend.
pub trait StorageExt: Storage {
    fn put_json<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &[u8],
        value: &T,
    ) -> Result<(), StorageError> {
        let data = serde_json::to_vec(value)?;
        self.put(namespace, key, &data)
    }

    /// `Ok(None)` when the key is absent.
    fn get_json<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        match self.get(namespace, key) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, namespace: Namespace) -> Result<Vec<T>, StorageError> {
        self.scan(namespace)?
            .into_iter()
            .map(|(_, v)| serde_json::from_slice(&v).map_err(StorageError::from))
            .collect()
    }

    fn store_block(&self, block: &Block) -> Result<(), StorageError> {
        self.put_json(Namespace::Block, &keys::block(block.height()), block)
    }

    fn get_block(&self, height: u64) -> Result<Option<Block>, StorageError> {
        self.get_json(Namespace::Block, &keys::block(height))
    }

    fn store_transaction(&self, tx: &Transaction) -> Result<(), StorageError> {
        self.put_json(Namespace::Transaction, &keys::by_hash(&tx.hash), tx)
    }

    fn get_transaction(&self, hash: &Hash32) -> Result<Option<Transaction>, StorageError> {
        self.get_json(Namespace::Transaction, &keys::by_hash(hash))
    }

    fn store_receipt(&self, receipt: &Receipt) -> Result<(), StorageError> {
        self.put_json(Namespace::Receipt, &keys::by_hash(&receipt.tx_hash), receipt)
    }

    fn get_receipt(&self, hash: &Hash32) -> Result<Option<Receipt>, StorageError> {
        self.get_json(Namespace::Receipt, &keys::by_hash(hash))
    }

    fn store_account(&self, account: &Account) -> Result<(), StorageError> {
        self.put_json(Namespace::State, &keys::by_address(&account.address), account)
    }

    fn get_account(&self, address: &Address) -> Result<Option<Account>, StorageError> {
        self.get_json(Namespace::State, &keys::by_address(address))
    }

    fn all_accounts(&self) -> Result<Vec<Account>, StorageError> {
        self.scan_json(Namespace::State)
    }

    /// Validator records are owned by the consensus crate; storage only knows
    /// they are keyed by address.
    fn store_validator<V: Serialize>(&self, address: &Address, record: &V) -> Result<(), StorageError> {
        self.put_json(Namespace::Validator, &keys::by_address(address), record)
    }

    fn all_validators<V: DeserializeOwned>(&self) -> Result<Vec<V>, StorageError> {
        self.scan_json(Namespace::Validator)
    }

    /// Writes the tip hash, then the height. The height is the commit marker
    /// and must be the final write of a block.
    fn set_chain_tip(&self, height: u64, hash: &Hash32) -> Result<(), StorageError> {
        self.put_json(Namespace::Metadata, keys::LATEST_HASH, &hash_hex(hash))?;
        self.put_json(Namespace::Metadata, keys::LATEST_HEIGHT, &height)
    }

    fn latest_height(&self) -> Result<Option<u64>, StorageError> {
        self.get_json(Namespace::Metadata, keys::LATEST_HEIGHT)
    }

    fn latest_hash(&self) -> Result<Option<Hash32>, StorageError> {
        let stored: Option<String> = self.get_json(Namespace::Metadata, keys::LATEST_HASH)?;
        Ok(stored.as_deref().and_then(vnc_types::parse_hash_hex))
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}
