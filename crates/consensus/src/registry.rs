//! Validator registry for DPoS-BFT.
//!
//! Validators are never removed, only deactivated, so their produced/missed
//! history survives re-registration. Iteration order is address order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};
use vnc_types::{Address, Amount};

use crate::config::{quorum_size, ConsensusConfig};
use crate::error::RegistrationError;

/// Upper bound for commission, 100% in basis points.
pub const MAX_COMMISSION_BPS: u16 = 10_000;

/// Validator commission in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commission(u16);

impl Commission {
    pub fn from_bps(bps: u32) -> Result<Self, RegistrationError> {
        if bps > u32::from(MAX_COMMISSION_BPS) {
            return Err(RegistrationError::InvalidCommission(bps));
        }
        Ok(Self(bps as u16))
    }

    pub fn bps(self) -> u16 {
        self.0
    }
}

/// Validator record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub stake: Amount,
    #[serde(default)]
    pub delegated: Amount,
    pub commission: Commission,
    pub active: bool,
    pub blocks_produced: u64,
    pub blocks_missed: u64,
    #[serde(default)]
    pub slashed: Amount,
    /// Chain height at first registration.
    pub registered_at: u64,
}

impl Validator {
    pub fn voting_power(&self) -> Amount {
        &self.stake + &self.delegated
    }
}

/// Registered validators plus the admission rules for joining the active set.
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    validators: BTreeMap<Address, Validator>,
    min_stake: Amount,
    max_validators: usize,
    quorum_numerator: u64,
    quorum_denominator: u64,
    dirty: BTreeSet<Address>,
}

impl ValidatorRegistry {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            validators: BTreeMap::new(),
            min_stake: config.min_validator_stake.clone(),
            max_validators: config.max_validators,
            quorum_numerator: config.quorum_numerator,
            quorum_denominator: config.quorum_denominator,
            dirty: BTreeSet::new(),
        }
    }

    /// Rebuild from persisted records without re-running admission checks.
    pub fn restore(config: &ConsensusConfig, validators: impl IntoIterator<Item = Validator>) -> Self {
        let mut registry = Self::new(config);
        for validator in validators {
            registry
                .validators
                .insert(validator.address.clone(), validator);
        }
        registry
    }

    pub fn register(
        &mut self,
        address: Address,
        stake: Amount,
        commission_bps: u32,
        height: u64,
    ) -> Result<&Validator, RegistrationError> {
        if self.is_active(&address) {
            return Err(RegistrationError::AlreadyRegistered(address));
        }
        let commission = Commission::from_bps(commission_bps)?;
        if stake < self.min_stake {
            return Err(RegistrationError::InsufficientStake {
                required: self.min_stake.clone(),
                provided: stake,
            });
        }
        if self.active_count() >= self.max_validators {
            return Err(RegistrationError::RegistrySaturated {
                max: self.max_validators,
            });
        }

        info!(
            "registering validator {} with stake {} ({} bps)",
            address.short(),
            stake,
            commission.bps()
        );
        self.dirty.insert(address.clone());
        let validator = self
            .validators
            .entry(address.clone())
            .or_insert_with(|| Validator {
                address,
                stake: Amount::zero(),
                delegated: Amount::zero(),
                commission,
                active: false,
                blocks_produced: 0,
                blocks_missed: 0,
                slashed: Amount::zero(),
                registered_at: height,
            });
        validator.stake = stake;
        validator.commission = commission;
        validator.active = true;
        Ok(validator)
    }

    pub fn deactivate(&mut self, address: &Address) -> Result<(), RegistrationError> {
        let validator = self.get_mut(address)?;
        if validator.active {
            validator.active = false;
            info!("deactivated validator {}", address.short());
            self.dirty.insert(address.clone());
        }
        Ok(())
    }

    /// Burn `amount` of stake. Returns `true` when the validator dropped out
    /// of the active set as a result.
    pub fn slash(&mut self, address: &Address, amount: &Amount) -> Result<bool, RegistrationError> {
        let min_stake = self.min_stake.clone();
        let validator = self.get_mut(address)?;
        let burned = if validator.stake < *amount {
            validator.stake.clone()
        } else {
            amount.clone()
        };
        validator.stake = validator.stake.saturating_sub(&burned);
        validator.slashed += &burned;

        let deactivated = validator.active && validator.stake < min_stake;
        if deactivated {
            validator.active = false;
        }
        warn!(
            "slashed validator {} by {}, remaining stake {}",
            address.short(),
            burned,
            validator.stake
        );
        self.dirty.insert(address.clone());
        Ok(deactivated)
    }

    pub fn delegate(&mut self, address: &Address, amount: &Amount) -> Result<(), RegistrationError> {
        let validator = self.get_mut(address)?;
        validator.delegated += amount;
        self.dirty.insert(address.clone());
        Ok(())
    }

    fn get_mut(&mut self, address: &Address) -> Result<&mut Validator, RegistrationError> {
        self.validators
            .get_mut(address)
            .ok_or_else(|| RegistrationError::UnknownValidator(address.clone()))
    }

    /// Active validators sorted by address.
    pub fn active_set(&self) -> Vec<&Validator> {
        self.validators.values().filter(|v| v.active).collect()
    }

    pub fn active_count(&self) -> usize {
        self.validators.values().filter(|v| v.active).count()
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.validators.get(address).is_some_and(|v| v.active)
    }

    pub fn get(&self, address: &Address) -> Option<&Validator> {
        self.validators.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn quorum_size(&self) -> usize {
        quorum_size(
            self.active_count(),
            self.quorum_numerator,
            self.quorum_denominator,
        )
    }

    pub fn record_produced(&mut self, address: &Address) {
        if let Some(validator) = self.validators.get_mut(address) {
            validator.blocks_produced += 1;
            self.dirty.insert(address.clone());
        }
    }

    pub fn record_missed(&mut self, address: &Address) {
        if let Some(validator) = self.validators.get_mut(address) {
            validator.blocks_missed += 1;
            self.dirty.insert(address.clone());
        }
    }

    /// Records that must be written for a commit by `proposer`: every
    /// modified validator plus the proposer with its produced count bumped.
    pub fn commit_records(&self, proposer: &Address) -> Vec<Validator> {
        let mut records: Vec<Validator> = self
            .dirty
            .iter()
            .filter(|address| *address != proposer)
            .filter_map(|address| self.validators.get(address).cloned())
            .collect();
        if let Some(validator) = self.validators.get(proposer) {
            let mut record = validator.clone();
            record.blocks_produced += 1;
            records.push(record);
        }
        records
    }

    /// Modified validators not yet persisted.
    pub fn dirty_records(&self) -> Vec<Validator> {
        self.dirty
            .iter()
            .filter_map(|address| self.validators.get(address).cloned())
            .collect()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}
