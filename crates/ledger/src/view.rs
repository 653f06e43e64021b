use std::collections::BTreeMap;
use std::sync::Arc;
use vnc_types::{Account, Address, Amount, Hash32};

use crate::state::{digest_accounts, LedgerState};
use crate::LedgerError;

/// Copy-on-write overlay over a committed [`LedgerState`].
///
/// Every write records the overlay's previous entry in a journal so
/// [`LedgerView::transact`] can undo exactly the writes of a failed closure.
#[derive(Debug)]
pub struct LedgerView {
    base: Arc<LedgerState>,
    dirty: BTreeMap<Address, Account>,
    journal: Vec<(Address, Option<Account>)>,
}

impl LedgerView {
    pub fn new(base: Arc<LedgerState>) -> Self {
        Self {
            base,
            dirty: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    pub(crate) fn base(&self) -> &Arc<LedgerState> {
        &self.base
    }

    /// Current account, default-initialised for unknown addresses.
    pub fn account(&self, address: &Address) -> Account {
        self.dirty
            .get(address)
            .or_else(|| self.base.get(address))
            .cloned()
            .unwrap_or_else(|| Account::new(address.clone(), Amount::zero()))
    }

    pub fn get_balance(&self, address: &Address) -> Amount {
        match self.dirty.get(address) {
            Some(account) => account.balance.clone(),
            None => self.base.balance(address),
        }
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        match self.dirty.get(address) {
            Some(account) => account.nonce,
            None => self.base.nonce(address),
        }
    }

    fn write(&mut self, account: Account) {
        let previous = self.dirty.insert(account.address.clone(), account.clone());
        self.journal.push((account.address, previous));
    }

    pub fn credit(&mut self, address: &Address, amount: &Amount) {
        let mut account = self.account(address);
        account.balance += amount;
        self.write(account);
    }

    pub fn debit(&mut self, address: &Address, amount: &Amount) -> Result<(), LedgerError> {
        let mut account = self.account(address);
        let Some(remaining) = account.balance.checked_sub(amount) else {
            return Err(LedgerError::InsufficientFunds {
                address: address.clone(),
                balance: account.balance,
                required: amount.clone(),
            });
        };
        account.balance = remaining;
        self.write(account);
        Ok(())
    }

    pub fn increment_nonce(&mut self, address: &Address) {
        let mut account = self.account(address);
        account.nonce += 1;
        self.write(account);
    }

    /// Run `f`; if it fails, roll back every write it made and return the error.
    pub fn transact<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
        let mark = self.journal.len();
        let result = f(self);
        if result.is_err() {
            self.rollback_to(mark);
        }
        result
    }

    fn rollback_to(&mut self, mark: usize) {
        while self.journal.len() > mark {
            let Some((address, previous)) = self.journal.pop() else {
                break;
            };
            match previous {
                Some(account) => {
                    self.dirty.insert(address, account);
                }
                None => {
                    self.dirty.remove(&address);
                }
            }
        }
    }

    /// Nonce check, debit, credit and nonce increment as one unit.
    pub fn apply_transfer(
        &mut self,
        from: &Address,
        to: &Address,
        value: &Amount,
        nonce: u64,
    ) -> Result<(), LedgerError> {
        self.transact(|view| {
            let expected = view.nonce(from);
            if nonce != expected {
                return Err(LedgerError::NonceMismatch {
                    address: from.clone(),
                    expected,
                    got: nonce,
                });
            }
            view.debit(from, value)?;
            view.credit(to, value);
            view.increment_nonce(from);
            Ok(())
        })
    }

    /// Digest of base + overlay, identical to what committing would produce.
    pub fn state_digest(&self) -> Hash32 {
        if self.dirty.is_empty() {
            return self.base.digest();
        }
        let merged = self.merged();
        digest_accounts(merged.values().copied())
    }

    fn merged(&self) -> BTreeMap<&Address, &Account> {
        let mut merged: BTreeMap<&Address, &Account> = self
            .base
            .accounts()
            .map(|account| (&account.address, account))
            .collect();
        for (address, account) in &self.dirty {
            merged.insert(address, account);
        }
        merged
    }

    /// Accounts written through this view, in address order.
    pub fn changed_accounts(&self) -> Vec<Account> {
        self.dirty.values().cloned().collect()
    }

    pub fn changed_len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }

    pub(crate) fn into_state(self) -> LedgerState {
        self.base.with_changes(self.dirty.values())
    }
}
