//! # VNC Mempool
//!
//! Staging area for admitted, unconfirmed transactions.
//!
//! ## Features
//! - **Gas-price prioritization** with arrival-order and hash tie-breaks
//! - **Nonce ordering**: a sender's transactions are selected in consecutive order
//! - **Reservations**: selected transactions stay out of later selections
//!   until released (round aborted) or removed (committed)
//! - **Automatic expiration** after a configurable TTL
//! - **Size limits** with lowest-price eviction
//!
//! All state sits behind a single lock, so admission and selection serialize
//! against each other while every critical section stays short.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};
use vnc_types::{hash_hex, Address, Hash32, Transaction};

/// Default time a transaction may wait before eviction.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction {0} already in mempool")]
    DuplicateTransaction(String),
    #[error("sender {sender} already has nonce {nonce} pending at an equal or higher gas price")]
    NonceConflict { sender: Address, nonce: u64 },
    #[error("mempool full ({capacity} transactions)")]
    PoolFull { capacity: usize },
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// Transaction metadata
#[derive(Debug, Clone)]
struct TransactionMeta {
    transaction: Transaction,
    added_at: Instant,
    sequence: u64,
}

/// Candidate for block inclusion, ordered so the heap pops the best first.
#[derive(Clone, Debug, PartialEq, Eq)]
struct BlockCandidate {
    gas_price: u64,
    sequence: u64,
    sender: Address,
    nonce: u64,
    tx_hash: Hash32,
}

impl Ord for BlockCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gas_price
            .cmp(&other.gas_price)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.tx_hash.cmp(&self.tx_hash))
    }
}

impl PartialOrd for BlockCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct PoolState {
    transactions: HashMap<Hash32, TransactionMeta>,
    sender_nonces: HashMap<Address, BTreeMap<u64, Hash32>>,
    reserved: HashSet<Hash32>,
    next_sequence: u64,
}

impl PoolState {
    fn remove_entry(&mut self, hash: &Hash32) -> Option<TransactionMeta> {
        let meta = self.transactions.remove(hash)?;
        self.reserved.remove(hash);
        let sender = &meta.transaction.from;
        if let Some(nonces) = self.sender_nonces.get_mut(sender) {
            nonces.remove(&meta.transaction.nonce);
            if nonces.is_empty() {
                self.sender_nonces.remove(sender);
            }
        }
        Some(meta)
    }

    fn evict_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let expired: Vec<Hash32> = self
            .transactions
            .iter()
            .filter(|(hash, meta)| {
                !self.reserved.contains(*hash) && now.saturating_duration_since(meta.added_at) > ttl
            })
            .map(|(hash, _)| *hash)
            .collect();
        for hash in &expired {
            self.remove_entry(hash);
        }
        expired.len()
    }

    /// Drop the cheapest unreserved transaction if it pays strictly less than
    /// `gas_price`. Among equals the most recent arrival goes first.
    fn make_space(&mut self, gas_price: u64) -> bool {
        let victim = self
            .transactions
            .iter()
            .filter(|(hash, _)| !self.reserved.contains(*hash))
            .min_by(|(_, a), (_, b)| {
                a.transaction
                    .gas_price
                    .cmp(&b.transaction.gas_price)
                    .then_with(|| b.sequence.cmp(&a.sequence))
            })
            .map(|(hash, meta)| (*hash, meta.transaction.gas_price));

        match victim {
            Some((hash, price)) if price < gas_price => {
                self.remove_entry(&hash);
                tracing::debug!(tx = %hash_hex(&hash), "evicted cheaper transaction to make space");
                true
            }
            _ => false,
        }
    }
}

/// Thread-safe, gas-price-prioritized, nonce-ordered mempool
pub struct Mempool {
    state: RwLock<PoolState>,
    capacity: usize,
    ttl: Duration,
}

impl Mempool {
    pub fn new(capacity: usize) -> Self {
        Self::with_ttl(capacity, DEFAULT_TTL)
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: RwLock::new(PoolState::default()),
            capacity,
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a transaction to the pool.
    pub fn admit(&self, tx: Transaction) -> Result<(), MempoolError> {
        self.admit_at(tx, Instant::now())
    }

    fn admit_at(&self, tx: Transaction, now: Instant) -> Result<(), MempoolError> {
        if !tx.has_valid_hash() {
            return Err(MempoolError::InvalidTransaction(format!(
                "hash {} does not match contents",
                hash_hex(&tx.hash)
            )));
        }

        let mut state = self.state.write();
        state.evict_expired(now, self.ttl);

        if state.transactions.contains_key(&tx.hash) {
            return Err(MempoolError::DuplicateTransaction(hash_hex(&tx.hash)));
        }

        let existing = state
            .sender_nonces
            .get(&tx.from)
            .and_then(|nonces| nonces.get(&tx.nonce))
            .copied();
        if let Some(existing_hash) = existing {
            let replaceable = !state.reserved.contains(&existing_hash)
                && state
                    .transactions
                    .get(&existing_hash)
                    .map(|meta| tx.gas_price > meta.transaction.gas_price)
                    .unwrap_or(true);
            if !replaceable {
                return Err(MempoolError::NonceConflict {
                    sender: tx.from.clone(),
                    nonce: tx.nonce,
                });
            }
            state.remove_entry(&existing_hash);
            tracing::debug!(
                replaced = %hash_hex(&existing_hash),
                by = %hash_hex(&tx.hash),
                "replaced pending transaction with higher gas price"
            );
        }

        if state.transactions.len() >= self.capacity && !state.make_space(tx.gas_price) {
            return Err(MempoolError::PoolFull {
                capacity: self.capacity,
            });
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state
            .sender_nonces
            .entry(tx.from.clone())
            .or_default()
            .insert(tx.nonce, tx.hash);
        tracing::debug!(tx = %hash_hex(&tx.hash), sender = %tx.from.short(), nonce = tx.nonce, "admitted transaction");
        state.transactions.insert(
            tx.hash,
            TransactionMeta {
                transaction: tx,
                added_at: now,
                sequence,
            },
        );
        Ok(())
    }

    /// Pick up to `limit` unreserved transactions for a block and reserve them.
    ///
    /// Highest gas price first, then earliest arrival, then lowest hash. A
    /// sender's next nonce only becomes eligible once its predecessor was
    /// picked in the same batch.
    pub fn select(&self, limit: usize) -> Vec<Transaction> {
        if limit == 0 {
            return Vec::new();
        }

        let mut state = self.state.write();
        let mut heap = BinaryHeap::new();
        let mut per_sender: HashMap<Address, Vec<(u64, Hash32)>> = HashMap::new();
        let mut next_index: HashMap<Address, usize> = HashMap::new();

        for (sender, nonces) in state.sender_nonces.iter() {
            let entries: Vec<(u64, Hash32)> = nonces
                .iter()
                .filter(|(_, hash)| !state.reserved.contains(*hash))
                .map(|(&nonce, hash)| (nonce, *hash))
                .collect();
            if let Some(&(nonce, tx_hash)) = entries.first() {
                if let Some(meta) = state.transactions.get(&tx_hash) {
                    heap.push(BlockCandidate {
                        gas_price: meta.transaction.gas_price,
                        sequence: meta.sequence,
                        sender: sender.clone(),
                        nonce,
                        tx_hash,
                    });
                    next_index.insert(sender.clone(), 1);
                    per_sender.insert(sender.clone(), entries);
                }
            }
        }

        let mut selected = Vec::new();
        while selected.len() < limit {
            let Some(candidate) = heap.pop() else { break };
            let Some(meta) = state.transactions.get(&candidate.tx_hash) else {
                continue;
            };
            selected.push(meta.transaction.clone());

            let (Some(entries), Some(idx)) = (
                per_sender.get(&candidate.sender),
                next_index.get_mut(&candidate.sender),
            ) else {
                continue;
            };
            if let Some(&(next_nonce, next_hash)) = entries.get(*idx) {
                if Some(next_nonce) == candidate.nonce.checked_add(1) {
                    if let Some(next_meta) = state.transactions.get(&next_hash) {
                        heap.push(BlockCandidate {
                            gas_price: next_meta.transaction.gas_price,
                            sequence: next_meta.sequence,
                            sender: candidate.sender.clone(),
                            nonce: next_nonce,
                            tx_hash: next_hash,
                        });
                        *idx += 1;
                    }
                }
            }
        }

        for tx in &selected {
            state.reserved.insert(tx.hash);
        }
        selected
    }

    /// Make reserved transactions eligible for selection again.
    pub fn release(&self, hashes: &[Hash32]) {
        let mut state = self.state.write();
        for hash in hashes {
            state.reserved.remove(hash);
        }
    }

    /// Drop transactions (included in a committed block or permanently invalid).
    pub fn remove(&self, hashes: &[Hash32]) -> usize {
        let mut state = self.state.write();
        hashes
            .iter()
            .filter(|hash| state.remove_entry(hash).is_some())
            .count()
    }

    /// Evict unreserved transactions older than the TTL.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let evicted = self.state.write().evict_expired(now, self.ttl);
        if evicted > 0 {
            tracing::debug!(evicted, "expired transactions evicted");
        }
        evicted
    }

    pub fn contains(&self, hash: &Hash32) -> bool {
        self.state.read().transactions.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash32) -> Option<Transaction> {
        self.state
            .read()
            .transactions
            .get(hash)
            .map(|meta| meta.transaction.clone())
    }

    pub fn is_reserved(&self, hash: &Hash32) -> bool {
        self.state.read().reserved.contains(hash)
    }

    /// Pending transactions of one sender in nonce order.
    pub fn sender_transactions(&self, sender: &Address) -> Vec<Transaction> {
        let state = self.state.read();
        state
            .sender_nonces
            .get(sender)
            .map(|nonces| {
                nonces
                    .values()
                    .filter_map(|hash| state.transactions.get(hash))
                    .map(|meta| meta.transaction.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.state.read().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect mempool diagnostics
    pub fn stats(&self) -> MempoolStats {
        let state = self.state.read();
        let now = Instant::now();
        MempoolStats {
            size: state.transactions.len(),
            reserved: state.reserved.len(),
            senders: state.sender_nonces.len(),
            oldest_age: state
                .transactions
                .values()
                .map(|meta| now.saturating_duration_since(meta.added_at))
                .max(),
        }
    }
}

/// Mempool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolStats {
    pub size: usize,
    pub reserved: usize,
    pub senders: usize,
    pub oldest_age: Option<Duration>,
}
