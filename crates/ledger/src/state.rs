use std::collections::BTreeMap;
use vnc_types::{Account, Address, Amount, Hash32};

const STATE_DOMAIN: &[u8] = b"vnc/state/v1";

/// Immutable account set, ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    accounts: BTreeMap<Address, Account>,
}

impl LedgerState {
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let accounts = accounts
            .into_iter()
            .filter(|account| !account.is_empty())
            .map(|account| (account.address.clone(), account))
            .collect();
        Self { accounts }
    }

    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.get(address)
            .map(|account| account.balance.clone())
            .unwrap_or_default()
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.get(address).map(|account| account.nonce).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts in ascending address order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn total_supply(&self) -> Amount {
        self.accounts.values().map(|account| &account.balance).sum()
    }

    /// New state with `changes` applied on top; empty accounts are dropped.
    pub(crate) fn with_changes<'a>(&self, changes: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut accounts = self.accounts.clone();
        for account in changes {
            if account.is_empty() {
                accounts.remove(&account.address);
            } else {
                accounts.insert(account.address.clone(), account.clone());
            }
        }
        Self { accounts }
    }

    /// Deterministic digest over every non-empty account in address order.
    pub fn digest(&self) -> Hash32 {
        digest_accounts(self.accounts.values())
    }
}

pub(crate) fn digest_accounts<'a>(accounts: impl Iterator<Item = &'a Account>) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(STATE_DOMAIN);
    for account in accounts.filter(|account| !account.is_empty()) {
        let address = account.address.as_bytes();
        let balance = account.balance.to_bytes_be();
        hasher.update(&(address.len() as u64).to_be_bytes());
        hasher.update(address);
        hasher.update(&(balance.len() as u64).to_be_bytes());
        hasher.update(&balance);
        hasher.update(&account.nonce.to_be_bytes());
    }
    *hasher.finalize().as_bytes()
}
