//! Account ledger: balances, nonces and the state digest.
//!
//! Committed state is an immutable [`LedgerState`] published behind an
//! `RwLock<Arc<_>>`. Block assembly works on a [`LedgerView`], a
//! copy-on-write overlay that is either committed wholesale or dropped.

use parking_lot::RwLock;
use std::sync::Arc;
use vnc_types::{Account, Address, Amount, Hash32};

mod state;
mod view;

pub use state::LedgerState;
pub use view::LedgerView;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds for {address}: balance {balance}, required {required}")]
    InsufficientFunds {
        address: Address,
        balance: Amount,
        required: Amount,
    },
    #[error("nonce mismatch for {address}: expected {expected}, got {got}")]
    NonceMismatch {
        address: Address,
        expected: u64,
        got: u64,
    },
    #[error("ledger changed since the view was taken")]
    StaleView,
}

impl LedgerError {
    /// A transaction failing with this error can never succeed later.
    pub fn is_permanent(&self) -> bool {
        matches!(self, LedgerError::NonceMismatch { expected, got, .. } if got < expected)
    }
}

/// Committed account state.
pub struct Ledger {
    current: RwLock<Arc<LedgerState>>,
}

impl Ledger {
    pub fn new(state: LedgerState) -> Self {
        Self {
            current: RwLock::new(Arc::new(state)),
        }
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self::new(LedgerState::from_accounts(accounts))
    }

    /// Cheap handle to the current committed state.
    pub fn snapshot(&self) -> Arc<LedgerState> {
        self.current.read().clone()
    }

    /// Zero for unknown addresses.
    pub fn balance(&self, address: &Address) -> Amount {
        self.snapshot().balance(address)
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.snapshot().nonce(address)
    }

    pub fn account(&self, address: &Address) -> Option<Account> {
        self.snapshot().get(address).cloned()
    }

    pub fn state_digest(&self) -> Hash32 {
        self.snapshot().digest()
    }

    /// Start a speculative view over the current snapshot.
    pub fn speculate(&self) -> LedgerView {
        LedgerView::new(self.snapshot())
    }

    /// Publish the view's writes as the new committed state.
    pub fn commit(&self, view: LedgerView) -> Result<Arc<LedgerState>, LedgerError> {
        let mut current = self.current.write();
        if !Arc::ptr_eq(&*current, view.base()) {
            return Err(LedgerError::StaleView);
        }
        let changed = view.changed_len();
        let next = Arc::new(view.into_state());
        *current = next.clone();
        tracing::debug!(changed, accounts = next.len(), "ledger snapshot committed");
        Ok(next)
    }

    /// Replace the committed state, used when restoring from storage.
    pub fn reset(&self, state: LedgerState) {
        *self.current.write() = Arc::new(state);
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(name: &str) -> Address {
        Address::from(name)
    }

    fn funded() -> Ledger {
        Ledger::from_accounts([Account::new(addr("alice"), Amount::from(100))])
    }

    #[test]
    fn unknown_address_reads_as_zero() {
        let ledger = Ledger::default();
        assert_eq!(ledger.balance(&addr("ghost")), Amount::zero());
        assert_eq!(ledger.nonce(&addr("ghost")), 0);
        assert!(ledger.account(&addr("ghost")).is_none());
    }

    #[test]
    fn commit_publishes_view() {
        let ledger = funded();
        let mut view = ledger.speculate();
        view.apply_transfer(&addr("alice"), &addr("bob"), &Amount::from(40), 0)
            .unwrap();
        assert_eq!(ledger.balance(&addr("bob")), Amount::zero());

        ledger.commit(view).unwrap();
        assert_eq!(ledger.balance(&addr("alice")), Amount::from(60));
        assert_eq!(ledger.balance(&addr("bob")), Amount::from(40));
        assert_eq!(ledger.nonce(&addr("alice")), 1);
    }

    #[test]
    fn dropped_view_leaves_state_untouched() {
        let ledger = funded();
        let before = ledger.state_digest();
        {
            let mut view = ledger.speculate();
            view.credit(&addr("bob"), &Amount::from(5));
            assert_ne!(view.state_digest(), before);
        }
        assert_eq!(ledger.state_digest(), before);
    }

    #[test]
    fn stale_view_is_refused() {
        let ledger = funded();
        let first = ledger.speculate();
        let mut second = ledger.speculate();
        second.credit(&addr("bob"), &Amount::from(1));
        ledger.commit(second).unwrap();
        assert_eq!(ledger.commit(first).unwrap_err(), LedgerError::StaleView);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let ledger = funded();
        let snapshot = ledger.snapshot();
        let mut view = ledger.speculate();
        view.credit(&addr("alice"), &Amount::from(1));
        ledger.commit(view).unwrap();
        assert_eq!(snapshot.balance(&addr("alice")), Amount::from(100));
        assert_eq!(ledger.balance(&addr("alice")), Amount::from(101));
    }

    #[test]
    fn stale_nonce_is_permanent_future_nonce_is_not() {
        let stale = LedgerError::NonceMismatch {
            address: addr("a"),
            expected: 3,
            got: 1,
        };
        let future = LedgerError::NonceMismatch {
            address: addr("a"),
            expected: 3,
            got: 5,
        };
        assert!(stale.is_permanent());
        assert!(!future.is_permanent());
    }
}
