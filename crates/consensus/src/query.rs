//! Read-only accessors over committed chain state.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vnc_ledger::{Ledger, LedgerState};
use vnc_mempool::{Mempool, MempoolStats};
use vnc_storage::{Storage, StorageError, StorageExt};
use vnc_types::{Account, Address, Amount, Block, Hash32, Transaction};

use crate::registry::{Validator, ValidatorRegistry};

/// Latest committed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    pub height: u64,
    pub hash: Hash32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    /// `confirmations` counts the including block itself.
    Included {
        height: u64,
        confirmations: u64,
        finalized: bool,
    },
    Unknown,
}

/// Cheap to clone; safe to hand to RPC handlers on other tasks.
#[derive(Clone)]
pub struct ChainQuery {
    pub(crate) tip: Arc<RwLock<ChainTip>>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) mempool: Arc<Mempool>,
    pub(crate) registry: Arc<RwLock<ValidatorRegistry>>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) finality_blocks: u64,
}

impl ChainQuery {
    pub fn current_height(&self) -> u64 {
        self.tip.read().height
    }

    pub fn latest_block_hash(&self) -> Hash32 {
        self.tip.read().hash
    }

    pub fn chain_tip(&self) -> ChainTip {
        *self.tip.read()
    }

    pub fn block(&self, height: u64) -> Result<Option<Block>, StorageError> {
        if height > self.current_height() {
            return Ok(None);
        }
        self.storage.get_block(height)
    }

    pub fn validator(&self, address: &Address) -> Option<Validator> {
        self.registry.read().get(address).cloned()
    }

    pub fn active_validators(&self) -> Vec<Validator> {
        self.registry
            .read()
            .active_set()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn active_validator_count(&self) -> usize {
        self.registry.read().active_count()
    }

    /// Tip and account state taken from the same commit.
    pub fn state_at_tip(&self) -> (ChainTip, Arc<LedgerState>) {
        let tip = self.tip.read();
        (*tip, self.ledger.snapshot())
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.ledger.balance(address)
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.ledger.nonce(address)
    }

    pub fn account(&self, address: &Address) -> Option<Account> {
        self.ledger.account(address)
    }

    pub fn mempool_stats(&self) -> MempoolStats {
        self.mempool.stats()
    }

    /// Committed transaction by hash, falling back to the mempool.
    pub fn transaction(&self, hash: &Hash32) -> Result<Option<Transaction>, StorageError> {
        if let Some(tx) = self.storage.get_transaction(hash)? {
            return Ok(Some(tx));
        }
        Ok(self.mempool.get(hash))
    }

    pub fn transaction_status(&self, hash: &Hash32) -> Result<TxStatus, StorageError> {
        if let Some(receipt) = self.storage.get_receipt(hash)? {
            let tip = self.current_height();
            // receipts are written before the tip marker moves
            if receipt.height <= tip {
                let confirmations = tip - receipt.height + 1;
                return Ok(TxStatus::Included {
                    height: receipt.height,
                    confirmations,
                    finalized: confirmations >= self.finality_blocks,
                });
            }
        }
        if self.mempool.contains(hash) {
            return Ok(TxStatus::Pending);
        }
        Ok(TxStatus::Unknown)
    }
}
