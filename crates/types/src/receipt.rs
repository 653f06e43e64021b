use serde::{Deserialize, Serialize};

use crate::hash::Hash32;

/// Inclusion record for a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction the receipt corresponds to.
    pub tx_hash: Hash32,
    /// Height of the block that included it.
    pub height: u64,
    /// Position within the block's transaction list.
    pub index: u32,
    /// Metered gas consumption.
    pub gas_used: u64,
}
