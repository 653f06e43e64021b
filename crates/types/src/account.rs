use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;

/// Balance and replay counter for one address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub balance: Amount,
    pub nonce: u64,
}

impl Account {
    pub fn new(address: Address, balance: Amount) -> Self {
        Self {
            address,
            balance,
            nonce: 0,
        }
    }

    /// Zero balance and zero nonce: indistinguishable from an unknown address.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0
    }
}
