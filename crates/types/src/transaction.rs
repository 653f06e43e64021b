use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::hash::Hash32;

/// Gas charged for every included transaction.
pub const BASE_TX_GAS: u64 = 21_000;

/// Gas price assigned by [`Transaction::new`].
pub const DEFAULT_GAS_PRICE: u64 = 1;

const TX_DOMAIN: &[u8] = b"vnc/tx/v1";

/// A value transfer between two accounts.
///
/// The hash covers every field except `hash` and `signature`; the signature
/// covers the hash. Builders recompute the hash, so a transaction is
/// immutable once signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content digest (BLAKE3)
    pub hash: Hash32,
    pub from: Address,
    pub to: Address,
    pub value: Amount,
    /// Must equal the sender's ledger nonce when applied
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Opaque; checked by the signature capability only
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Create an unsigned transfer with the default gas parameters.
    pub fn new(from: Address, to: Address, value: Amount, nonce: u64) -> Self {
        let mut tx = Self {
            hash: [0u8; 32],
            from,
            to,
            value,
            nonce,
            gas_price: DEFAULT_GAS_PRICE,
            gas_limit: BASE_TX_GAS,
            payload: Vec::new(),
            signature: Vec::new(),
        };
        tx.hash = tx.compute_hash();
        tx
    }

    pub fn with_gas(mut self, gas_price: u64, gas_limit: u64) -> Self {
        self.gas_price = gas_price;
        self.gas_limit = gas_limit;
        self.rehash();
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self.rehash();
        self
    }

    fn rehash(&mut self) {
        self.hash = self.compute_hash();
        self.signature.clear();
    }

    /// Digest over the canonical field encoding.
    pub fn compute_hash(&self) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(TX_DOMAIN);
        update_len_prefixed(&mut hasher, self.from.as_bytes());
        update_len_prefixed(&mut hasher, self.to.as_bytes());
        update_len_prefixed(&mut hasher, &self.value.to_bytes_be());
        hasher.update(&self.nonce.to_be_bytes());
        hasher.update(&self.gas_price.to_be_bytes());
        hasher.update(&self.gas_limit.to_be_bytes());
        update_len_prefixed(&mut hasher, &self.payload);
        *hasher.finalize().as_bytes()
    }

    /// `true` when the stored hash matches the content.
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

pub(crate) fn update_len_prefixed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(nonce: u64) -> Transaction {
        Transaction::new(Address::from("alice"), Address::from("bob"), Amount::from(10), nonce)
    }

    #[test]
    fn new_transaction_has_consistent_hash() {
        let tx = transfer(0);
        assert!(tx.has_valid_hash());
        assert_eq!(tx.gas_limit, BASE_TX_GAS);
        assert_eq!(tx.gas_price, DEFAULT_GAS_PRICE);
        assert!(!tx.is_signed());
    }

    #[test]
    fn every_field_feeds_the_hash() {
        let base = transfer(0);
        assert_ne!(base.hash, transfer(1).hash);
        assert_ne!(base.hash, base.clone().with_gas(2, BASE_TX_GAS).hash);
        assert_ne!(base.hash, base.clone().with_payload(vec![1]).hash);

        let mut tampered = base.clone();
        tampered.value = Amount::from(11);
        assert!(!tampered.has_valid_hash());
    }

    #[test]
    fn signature_is_not_hashed() {
        let mut tx = transfer(3);
        let before = tx.hash;
        tx.signature = vec![9u8; 64];
        assert_eq!(tx.compute_hash(), before);
    }

    #[test]
    fn builders_drop_stale_signatures() {
        let mut tx = transfer(0);
        tx.signature = vec![1u8; 64];
        let tx = tx.with_gas(5, 30_000);
        assert!(!tx.is_signed());
        assert!(tx.has_valid_hash());
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = Transaction::new(Address::from("ab"), Address::from("c"), Amount::from(1), 0);
        let b = Transaction::new(Address::from("a"), Address::from("bc"), Amount::from(1), 0);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn bincode_roundtrip_keeps_hash_valid() {
        let tx = transfer(7).with_payload(b"memo".to_vec());
        let bytes = bincode::serialize(&tx).unwrap();
        let back: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, tx);
        assert!(back.has_valid_hash());
    }
}
