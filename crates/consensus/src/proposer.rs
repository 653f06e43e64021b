//! Proposer selection strategies.

use num_bigint::BigUint;
use num_traits::Zero;
use vnc_types::{Address, Amount, Hash32};

use crate::config::ProposerPolicy;
use crate::registry::Validator;

const SEED_DOMAIN: &[u8] = b"vnc/proposer/v1";

/// Picks the proposer for a height. Every node must derive the same answer
/// from the same active set, height and seed (the parent block hash).
pub trait ProposerStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `active` is sorted by address.
    fn select(&self, active: &[&Validator], height: u64, seed: &Hash32) -> Option<Address>;
}

/// `active[height % n]`
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl ProposerStrategy for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(&self, active: &[&Validator], height: u64, _seed: &Hash32) -> Option<Address> {
        if active.is_empty() {
            return None;
        }
        let index = (height % active.len() as u64) as usize;
        Some(active[index].address.clone())
    }
}

/// Lottery over cumulative voting power, drawn from BLAKE3(seed || height).
#[derive(Debug, Default, Clone, Copy)]
pub struct StakeWeighted;

impl StakeWeighted {
    fn draw(seed: &Hash32, height: u64) -> BigUint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SEED_DOMAIN);
        hasher.update(seed);
        hasher.update(&height.to_be_bytes());
        BigUint::from_bytes_be(hasher.finalize().as_bytes())
    }
}

impl ProposerStrategy for StakeWeighted {
    fn name(&self) -> &'static str {
        "stake_weighted"
    }

    fn select(&self, active: &[&Validator], height: u64, seed: &Hash32) -> Option<Address> {
        let powers: Vec<Amount> = active.iter().map(|v| v.voting_power()).collect();
        let total: Amount = powers.iter().sum();
        if total.is_zero() {
            return RoundRobin.select(active, height, seed);
        }

        let target = Self::draw(seed, height) % total.as_biguint();
        let mut cumulative = BigUint::zero();
        for (validator, power) in active.iter().zip(&powers) {
            cumulative += power.as_biguint();
            if target < cumulative {
                return Some(validator.address.clone());
            }
        }
        active.last().map(|v| v.address.clone())
    }
}

pub fn strategy_for(policy: ProposerPolicy) -> Box<dyn ProposerStrategy> {
    match policy {
        ProposerPolicy::RoundRobin => Box::new(RoundRobin),
        ProposerPolicy::StakeWeighted => Box::new(StakeWeighted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Commission;
    use std::collections::HashMap;
    use vnc_types::hash_bytes;

    fn validator(name: &str, stake: u64) -> Validator {
        Validator {
            address: Address::from(name),
            stake: Amount::from(stake),
            delegated: Amount::zero(),
            commission: Commission::default(),
            active: true,
            blocks_produced: 0,
            blocks_missed: 0,
            slashed: Amount::zero(),
            registered_at: 0,
        }
    }

    #[test]
    fn round_robin_indexes_by_height() {
        let set = [validator("a", 1), validator("b", 1), validator("c", 1)];
        let active: Vec<&Validator> = set.iter().collect();
        let seed = [0u8; 32];
        let picks: Vec<String> = (0..6)
            .map(|h| RoundRobin.select(&active, h, &seed).unwrap().to_string())
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
        assert!(RoundRobin.select(&[], 1, &seed).is_none());
    }

    #[test]
    fn stake_weighted_is_deterministic() {
        let set = [validator("a", 10), validator("b", 20), validator("c", 30)];
        let active: Vec<&Validator> = set.iter().collect();
        for height in 0..50u64 {
            let seed = hash_bytes(&height.to_le_bytes());
            assert_eq!(
                StakeWeighted.select(&active, height, &seed),
                StakeWeighted.select(&active, height, &seed)
            );
        }
    }

    #[test]
    fn stake_weighted_is_proportional() {
        let set = [validator("a", 1), validator("b", 3)];
        let active: Vec<&Validator> = set.iter().collect();
        let mut counts: HashMap<String, u32> = HashMap::new();
        for height in 0..4_000u64 {
            let seed = hash_bytes(&height.to_be_bytes());
            let pick = StakeWeighted.select(&active, height, &seed).unwrap();
            *counts.entry(pick.to_string()).or_default() += 1;
        }
        let a = counts["a"];
        let b = counts["b"];
        assert_eq!(a + b, 4_000);
        // expected 1000 / 3000
        assert!((850..=1150).contains(&a), "a picked {a} times");
        assert!(b > 2 * a);
    }

    #[test]
    fn zero_power_falls_back_to_round_robin() {
        let set = [validator("a", 0), validator("b", 0)];
        let active: Vec<&Validator> = set.iter().collect();
        let seed = [7u8; 32];
        assert_eq!(
            StakeWeighted.select(&active, 3, &seed),
            Some(Address::from("b"))
        );
    }
}
