use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use vnc_mempool::{Mempool, MempoolError};
use vnc_types::{Address, Amount, Hash32, Transaction};

fn build(sender: u8, nonce: u64, gas_price: u64) -> Transaction {
    Transaction::new(
        Address::from(format!("s{sender}")),
        Address::from("sink"),
        Amount::from(1),
        nonce,
    )
    .with_gas(gas_price, 21_000)
}

fn entries() -> impl Strategy<Value = Vec<(u8, u64, u64)>> {
    prop::collection::vec((0u8..6, 0u64..6, 1u64..20), 0..60)
}

fn fill(pool: &Mempool, entries: &[(u8, u64, u64)]) {
    for (sender, nonce, price) in entries {
        let _ = pool.admit(build(*sender, *nonce, *price));
    }
}

proptest! {
    #[test]
    fn selection_is_deterministic(entries in entries(), limit in 0usize..40) {
        let a = Mempool::new(1_000);
        let b = Mempool::new(1_000);
        fill(&a, &entries);
        fill(&b, &entries);
        let left: Vec<Hash32> = a.select(limit).iter().map(|tx| tx.hash).collect();
        let right: Vec<Hash32> = b.select(limit).iter().map(|tx| tx.hash).collect();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn selected_nonces_are_consecutive_per_sender(entries in entries()) {
        let pool = Mempool::new(1_000);
        fill(&pool, &entries);
        let mut last: HashMap<Address, u64> = HashMap::new();
        for tx in pool.select(usize::MAX) {
            if let Some(prev) = last.get(&tx.from) {
                prop_assert_eq!(tx.nonce, prev + 1);
            }
            last.insert(tx.from.clone(), tx.nonce);
        }
    }

    #[test]
    fn reserved_transactions_are_never_selected_twice(entries in entries(), first in 0usize..20) {
        let pool = Mempool::new(1_000);
        fill(&pool, &entries);
        let mut seen: HashSet<Hash32> = HashSet::new();
        for tx in pool.select(first).into_iter().chain(pool.select(usize::MAX)) {
            prop_assert!(seen.insert(tx.hash));
        }
        prop_assert_eq!(pool.stats().reserved, seen.len());
    }

    #[test]
    fn second_admission_of_same_hash_is_duplicate(sender in 0u8..4, nonce in 0u64..4, price in 1u64..10) {
        let pool = Mempool::new(10);
        let tx = build(sender, nonce, price);
        prop_assert!(pool.admit(tx.clone()).is_ok());
        let duplicate = matches!(pool.admit(tx), Err(MempoolError::DuplicateTransaction(_)));
        prop_assert!(duplicate);
        prop_assert_eq!(pool.len(), 1);
    }
}
