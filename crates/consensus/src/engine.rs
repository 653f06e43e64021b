//! DPoS-BFT round state machine.
//!
//! The engine is driven synchronously: [`ConsensusEngine::tick`] on the block
//! timer, [`ConsensusEngine::on_receive`] for gossip. Nothing here spawns
//! tasks or sleeps; see [`crate::driver`] for the async wrapper.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vnc_crypto::{
    sign_block, sign_vote, verify_transaction, verify_vote, Ed25519Verifier, SignatureVerifier,
    Signer,
};
use vnc_ledger::{Ledger, LedgerState};
use vnc_mempool::Mempool;
use vnc_storage::{keys, MemoryStorage, Namespace, Storage, StorageError, StorageExt, WriteBatch};
use vnc_types::{
    short_hex, Account, Address, Amount, Block, Hash32, Transaction, Vote, BASE_TX_GAS,
};

use crate::assembler::{assemble, verify_block, AssemblyInput, BlockContext};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConsensusConfig, GenesisConfig};
use crate::error::{ConsensusError, ValidationError};
use crate::proposer::{strategy_for, ProposerStrategy};
use crate::query::{ChainQuery, ChainTip};
use crate::registry::{Validator, ValidatorRegistry};
use crate::round::{Candidate, ConsensusRound, RoundPhase};
use crate::transport::{decode, encode, MessageKind, NoopTransport, Transport};
use crate::votes::VoteOutcome;

/// Wires the engine's collaborators. Anything not set falls back to an
/// in-memory, single-node default.
pub struct EngineBuilder {
    config: ConsensusConfig,
    signer: Arc<dyn Signer>,
    storage: Option<Arc<dyn Storage>>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    genesis: GenesisConfig,
}

impl EngineBuilder {
    pub fn new(config: ConsensusConfig, signer: Arc<dyn Signer>) -> Self {
        Self {
            config,
            signer,
            storage: None,
            verifier: None,
            transport: None,
            clock: None,
            genesis: GenesisConfig::default(),
        }
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Applied only when storage holds no chain yet.
    pub fn genesis(mut self, genesis: GenesisConfig) -> Self {
        self.genesis = genesis;
        self
    }

    pub fn build(self) -> Result<ConsensusEngine, ConsensusError> {
        self.config.validate()?;
        let storage: Arc<dyn Storage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(MemoryStorage::new()),
        };
        let verifier: Arc<dyn SignatureVerifier> = match self.verifier {
            Some(verifier) => verifier,
            None => Arc::new(Ed25519Verifier),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(NoopTransport),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let (state, registry, tip) = match storage.latest_height()? {
            Some(height) => restore(&self.config, storage.as_ref(), height)?,
            None => init_genesis(&self.config, &self.genesis, storage.as_ref())?,
        };

        let address = self.signer.address();
        let mempool = Arc::new(Mempool::with_ttl(
            self.config.mempool_capacity,
            self.config.mempool_ttl(),
        ));
        metrics::gauge!("consensus_height").set(tip.height as f64);

        Ok(ConsensusEngine {
            strategy: strategy_for(self.config.proposer_policy),
            config: self.config,
            signer: self.signer,
            verifier,
            storage,
            transport,
            clock,
            ledger: Arc::new(Ledger::new(state)),
            mempool,
            registry: Arc::new(RwLock::new(registry)),
            tip: Arc::new(RwLock::new(tip)),
            phase: RoundPhase::Idle,
            round: None,
            address,
        })
    }
}

fn restore(
    config: &ConsensusConfig,
    storage: &dyn Storage,
    height: u64,
) -> Result<(LedgerState, ValidatorRegistry, ChainTip), ConsensusError> {
    let block = storage
        .get_block(height)?
        .ok_or_else(|| StorageError::not_found(Namespace::Block, &keys::block(height)))?;
    let state = LedgerState::from_accounts(storage.all_accounts()?);
    if state.digest() != block.header.state_root {
        return Err(ConsensusError::StateRootMismatch { height });
    }
    let validators: Vec<Validator> = storage.all_validators()?;
    let registry = ValidatorRegistry::restore(config, validators);

    info!(
        "resuming from block {} ({}), {} accounts, {} validators",
        height,
        short_hex(&block.hash),
        state.len(),
        registry.len()
    );
    let tip = ChainTip {
        height,
        hash: block.hash,
        timestamp_ms: block.header.timestamp_ms,
    };
    Ok((state, registry, tip))
}

fn init_genesis(
    config: &ConsensusConfig,
    genesis: &GenesisConfig,
    storage: &dyn Storage,
) -> Result<(LedgerState, ValidatorRegistry, ChainTip), ConsensusError> {
    let mut registry = ValidatorRegistry::new(config);
    for validator in &genesis.validators {
        registry.register(
            validator.address.clone(),
            validator.stake.clone(),
            validator.commission_bps,
            0,
        )?;
    }
    let state = LedgerState::from_accounts(
        genesis
            .allocations
            .iter()
            .map(|a| Account::new(a.address.clone(), a.balance.clone())),
    );
    let block = Block::genesis(
        config.chain_id,
        state.digest(),
        genesis.timestamp_ms,
        config.block_gas_limit,
    );

    let mut batch = WriteBatch::new();
    batch.store_block(&block)?;
    for account in state.accounts() {
        batch.store_account(account)?;
    }
    for validator in registry.dirty_records() {
        batch.store_validator(&validator.address, &validator)?;
    }
    batch.set_chain_tip(0, &block.hash)?;
    storage.write_batch(batch)?;
    storage.flush()?;
    registry.clear_dirty();

    info!(
        "initialised genesis {} with {} accounts and {} validators",
        short_hex(&block.hash),
        state.len(),
        registry.active_count()
    );
    let tip = ChainTip {
        height: 0,
        hash: block.hash,
        timestamp_ms: block.header.timestamp_ms,
    };
    Ok((state, registry, tip))
}

/// Signature, hash and intrinsic-gas checks followed by mempool admission.
pub(crate) fn admit_transaction(
    mempool: &Mempool,
    verifier: &dyn SignatureVerifier,
    tx: Transaction,
) -> Result<Hash32, ConsensusError> {
    if !tx.has_valid_hash() {
        return Err(ValidationError::InvalidHash.into());
    }
    if !verify_transaction(verifier, &tx) {
        return Err(ValidationError::InvalidSignature(tx.from.clone()).into());
    }
    if tx.gas_limit < BASE_TX_GAS {
        return Err(ValidationError::IntrinsicGas {
            gas_limit: tx.gas_limit,
            required: BASE_TX_GAS,
        }
        .into());
    }
    let hash = tx.hash;
    mempool.admit(tx)?;
    metrics::gauge!("mempool_size").set(mempool.len() as f64);
    Ok(hash)
}

pub struct ConsensusEngine {
    config: ConsensusConfig,
    signer: Arc<dyn Signer>,
    pub(crate) verifier: Arc<dyn SignatureVerifier>,
    storage: Arc<dyn Storage>,
    pub(crate) transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    ledger: Arc<Ledger>,
    pub(crate) mempool: Arc<Mempool>,
    registry: Arc<RwLock<ValidatorRegistry>>,
    tip: Arc<RwLock<ChainTip>>,
    strategy: Box<dyn ProposerStrategy>,
    phase: RoundPhase,
    round: Option<ConsensusRound>,
    address: Address,
}

impl ConsensusEngine {
    pub fn builder(config: ConsensusConfig, signer: Arc<dyn Signer>) -> EngineBuilder {
        EngineBuilder::new(config, signer)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Height of the latest committed block.
    pub fn height(&self) -> u64 {
        self.tip.read().height
    }

    pub fn chain_tip(&self) -> ChainTip {
        *self.tip.read()
    }

    pub fn round(&self) -> Option<&ConsensusRound> {
        self.round.as_ref()
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Approvals from active validators for the current candidate.
    pub fn candidate_approvals(&self) -> Option<usize> {
        let round = self.round.as_ref()?;
        let hash = round.candidate_hash()?;
        let registry = self.registry.read();
        Some(round.votes.approvals_for(&hash, |voter| registry.is_active(voter)))
    }

    pub fn query(&self) -> ChainQuery {
        ChainQuery {
            tip: self.tip.clone(),
            ledger: self.ledger.clone(),
            mempool: self.mempool.clone(),
            registry: self.registry.clone(),
            storage: self.storage.clone(),
            finality_blocks: self.config.finality_blocks,
        }
    }

    /// Block-timer entry point.
    pub fn tick(&mut self) -> Result<(), ConsensusError> {
        let now = self.clock.now_ms();
        match self.phase {
            RoundPhase::Idle | RoundPhase::Committed | RoundPhase::Aborted => self.start_round(now),
            RoundPhase::Proposing | RoundPhase::Collecting => {
                let expired = self.round.as_ref().map_or(true, |r| r.is_expired(now));
                if expired {
                    self.abort()
                } else {
                    Ok(())
                }
            }
            RoundPhase::Finalizing => self.finalize(),
        }
    }

    /// Gossip entry point.
    pub fn on_receive(&mut self, kind: MessageKind, payload: &[u8]) -> Result<(), ConsensusError> {
        match kind {
            MessageKind::Block => self.handle_block(decode(kind, payload)?),
            MessageKind::Vote => self.handle_vote(decode(kind, payload)?),
            MessageKind::Transaction => self.handle_transaction(decode(kind, payload)?).map(|_| ()),
        }
    }

    /// Admit a transaction received from a peer. It is not re-broadcast.
    pub fn handle_transaction(&mut self, tx: Transaction) -> Result<Hash32, ConsensusError> {
        let hash = admit_transaction(&self.mempool, self.verifier.as_ref(), tx)?;
        debug!("admitted tx {}", short_hex(&hash));
        Ok(hash)
    }

    fn start_round(&mut self, now: u64) -> Result<(), ConsensusError> {
        let evicted = self.mempool.evict_expired();
        if evicted > 0 {
            debug!("evicted {} expired transactions", evicted);
        }
        let proposer = self.open_round(now)?;
        if proposer == self.address {
            self.propose(now)?;
        }
        self.try_finalize()
    }

    fn open_round(&mut self, now: u64) -> Result<Address, ConsensusError> {
        let tip = *self.tip.read();
        let height = tip.height + 1;
        let proposer = {
            let registry = self.registry.read();
            let active = registry.active_set();
            self.strategy.select(&active, height, &tip.hash)
        };
        let Some(proposer) = proposer else {
            return Err(ConsensusError::NoActiveValidators);
        };

        debug!("round {} opened, proposer {}", height, proposer.short());
        self.round = Some(ConsensusRound::new(
            height,
            proposer.clone(),
            now,
            self.config.round_timeout_ms(),
        ));
        self.phase = RoundPhase::Collecting;
        Ok(proposer)
    }

    /// Gossip for the next height arrived before this node's tick. The
    /// selected proposer still assembles its own block for the round.
    fn open_round_on_ingress(&mut self) -> Result<(), ConsensusError> {
        let now = self.clock.now_ms();
        let proposer = self.open_round(now)?;
        if proposer == self.address {
            self.propose(now)?;
            return self.try_finalize();
        }
        Ok(())
    }

    fn propose(&mut self, now: u64) -> Result<(), ConsensusError> {
        self.phase = RoundPhase::Proposing;
        let tip = *self.tip.read();
        let transactions = self.mempool.select(self.config.max_transactions_per_block);
        let reserved: Vec<Hash32> = transactions.iter().map(|tx| tx.hash).collect();

        let input = AssemblyInput {
            chain_id: self.config.chain_id,
            height: tip.height + 1,
            parent_hash: tip.hash,
            timestamp_ms: now.max(tip.timestamp_ms),
            proposer: self.address.clone(),
            gas_limit: self.config.block_gas_limit,
            transactions,
        };
        let assembled = assemble(input, self.ledger.speculate(), self.verifier.as_ref());
        let block = sign_block(assembled.block, self.signer.as_ref());
        self.phase = RoundPhase::Collecting;

        let payload = match encode(&block) {
            Ok(payload) => payload,
            Err(err) => {
                self.mempool.release(&reserved);
                return Err(err.into());
            }
        };

        info!(
            "proposing block {} at height {} with {} txs ({} skipped)",
            short_hex(&block.hash),
            block.height(),
            block.transactions.len(),
            assembled.rejected.len()
        );
        let (height, hash) = (block.height(), block.hash);
        if let Some(round) = self.round.as_mut() {
            round.candidate = Some(Candidate {
                block,
                view: assembled.view,
                receipts: assembled.receipts,
                rejected: assembled.rejected,
                reserved,
            });
        }
        self.transport.broadcast(MessageKind::Block, payload);
        self.cast_vote(height, hash, true);
        Ok(())
    }

    /// Sign, record and broadcast a vote if this node is an active validator.
    fn cast_vote(&mut self, height: u64, block_hash: Hash32, approve: bool) {
        if !self.registry.read().is_active(&self.address) {
            return;
        }
        let vote = sign_vote(
            Vote::new(self.address.clone(), height, block_hash, approve),
            self.signer.as_ref(),
            self.config.chain_id,
        );
        match encode(&vote) {
            Ok(payload) => self.transport.broadcast(MessageKind::Vote, payload),
            Err(err) => warn!("failed to encode vote: {}", err),
        }
        if let Some(round) = self.round.as_mut() {
            round.votes.record(vote);
        }
    }

    pub fn handle_block(&mut self, block: Block) -> Result<(), ConsensusError> {
        let tip = *self.tip.read();
        let height = block.height();
        if height <= tip.height {
            debug!("ignoring block {} for committed height {}", short_hex(&block.hash), height);
            return Ok(());
        }
        if height > tip.height + 1 {
            debug!("ignoring block {} ahead of tip {}", height, tip.height);
            return Ok(());
        }
        if self.round.is_none() {
            self.open_round_on_ingress()?;
        }

        let context = match self.round.as_ref() {
            Some(round) => {
                if let Some(existing) = round.candidate_hash() {
                    if existing != block.hash {
                        warn!(
                            "ignoring conflicting block {} at height {}, already have {}",
                            short_hex(&block.hash),
                            height,
                            short_hex(&existing)
                        );
                    }
                    return Ok(());
                }
                BlockContext {
                    chain_id: self.config.chain_id,
                    height: round.height,
                    parent_hash: tip.hash,
                    parent_timestamp_ms: tip.timestamp_ms,
                    gas_limit: self.config.block_gas_limit,
                    expected_proposer: round.proposer.clone(),
                }
            }
            None => return Ok(()),
        };

        match verify_block(&block, &context, self.ledger.speculate(), self.verifier.as_ref()) {
            Ok(assembled) => {
                debug!(
                    "accepted block {} at height {} from {}",
                    short_hex(&block.hash),
                    height,
                    block.proposer().short()
                );
                if let Some(round) = self.round.as_mut() {
                    round.candidate = Some(Candidate {
                        block: assembled.block,
                        view: assembled.view,
                        receipts: assembled.receipts,
                        rejected: assembled.rejected,
                        reserved: Vec::new(),
                    });
                }
                self.cast_vote(height, block.hash, true);
                self.try_finalize()
            }
            Err(err) => {
                warn!(
                    "rejecting block {} at height {}: {}",
                    short_hex(&block.hash),
                    height,
                    err
                );
                self.cast_vote(height, block.hash, false);
                Err(err.into())
            }
        }
    }

    pub fn handle_vote(&mut self, vote: Vote) -> Result<(), ConsensusError> {
        let tip_height = self.tip.read().height;
        if vote.height <= tip_height {
            debug!("discarding late vote from {} for height {}", vote.voter.short(), vote.height);
            return Ok(());
        }
        if vote.height > tip_height + 1 {
            debug!("ignoring vote for future height {}", vote.height);
            return Ok(());
        }
        if !self.registry.read().is_active(&vote.voter) {
            debug!("ignoring vote from inactive validator {}", vote.voter.short());
            return Ok(());
        }
        if !verify_vote(self.verifier.as_ref(), &vote, self.config.chain_id) {
            warn!("invalid vote signature from {}", vote.voter.short());
            return Ok(());
        }
        metrics::counter!("consensus_votes_received").increment(1);

        if self.round.is_none() {
            self.open_round_on_ingress()?;
        }
        if let Some(round) = self.round.as_mut() {
            let voter = vote.voter.clone();
            match round.votes.record(vote) {
                VoteOutcome::Recorded => {}
                VoteOutcome::Duplicate => {
                    debug!("duplicate vote from {}", voter.short());
                    return Ok(());
                }
                VoteOutcome::Replaced => {
                    debug!("{} changed its vote at height {}", voter.short(), round.height);
                }
            }
        }
        self.try_finalize()
    }

    fn try_finalize(&mut self) -> Result<(), ConsensusError> {
        if self.phase != RoundPhase::Collecting {
            return Ok(());
        }
        let Some(round) = self.round.as_ref() else {
            return Ok(());
        };
        let Some(hash) = round.candidate_hash() else {
            return Ok(());
        };
        let (approvals, quorum) = {
            let registry = self.registry.read();
            (
                round.votes.approvals_for(&hash, |voter| registry.is_active(voter)),
                registry.quorum_size(),
            )
        };
        if approvals < quorum {
            return Ok(());
        }
        debug!(
            "quorum reached for {} at height {} ({}/{})",
            short_hex(&hash),
            round.height,
            approvals,
            quorum
        );
        self.phase = RoundPhase::Finalizing;
        self.finalize()
    }

    /// One atomic batch per block: either the block, its state and the tip
    /// marker are all durable, or none of them are.
    fn persist(&self, round: &ConsensusRound, candidate: &Candidate) -> Result<(), StorageError> {
        let block = &candidate.block;
        let mut batch = WriteBatch::new();
        batch.store_block(block)?;
        for tx in &block.transactions {
            batch.store_transaction(tx)?;
        }
        for receipt in &candidate.receipts {
            batch.store_receipt(receipt)?;
        }
        for account in candidate.view.changed_accounts() {
            batch.store_account(&account)?;
        }
        for validator in self.registry.read().commit_records(&round.proposer) {
            batch.store_validator(&validator.address, &validator)?;
        }
        batch.set_chain_tip(block.height(), &block.hash)?;
        self.storage.write_batch(batch)?;
        self.storage.flush()
    }

    fn finalize(&mut self) -> Result<(), ConsensusError> {
        let persisted = match self.round.as_ref() {
            Some(round) => match round.candidate.as_ref() {
                Some(candidate) => self.persist(round, candidate),
                None => {
                    self.phase = RoundPhase::Collecting;
                    return Ok(());
                }
            },
            None => {
                self.phase = RoundPhase::Idle;
                return Ok(());
            }
        };
        if let Err(err) = persisted {
            error!("failed to persist block at height {}: {}", self.height() + 1, err);
            return Err(err.into());
        }

        let Some(round) = self.round.take() else {
            return Ok(());
        };
        let Some(candidate) = round.candidate else {
            return Ok(());
        };

        let block = candidate.block;
        {
            // Readers pair the tip with the ledger snapshot under the tip
            // lock, so both move inside one write section.
            let mut tip = self.tip.write();
            if let Err(err) = self.ledger.commit(candidate.view) {
                error!("ledger moved during round {}: {}; reloading from storage", round.height, err);
                match self.storage.all_accounts() {
                    Ok(accounts) => self.ledger.reset(LedgerState::from_accounts(accounts)),
                    Err(err) => error!("failed to reload accounts: {}", err),
                }
            }
            *tip = ChainTip {
                height: block.height(),
                hash: block.hash,
                timestamp_ms: block.header.timestamp_ms,
            };
        }

        let mut dropped = block.tx_hashes();
        dropped.extend(
            candidate
                .rejected
                .iter()
                .filter(|rejected| rejected.error.is_permanent())
                .map(|rejected| rejected.hash),
        );
        self.mempool.remove(&dropped);
        self.mempool.release(&candidate.reserved);

        {
            let mut registry = self.registry.write();
            registry.record_produced(&round.proposer);
            registry.clear_dirty();
        }
        self.phase = RoundPhase::Committed;

        metrics::counter!("consensus_rounds_committed").increment(1);
        metrics::gauge!("consensus_height").set(block.height() as f64);
        metrics::gauge!("mempool_size").set(self.mempool.len() as f64);
        info!(
            "committed block {} at height {} with {} txs, proposer {}",
            short_hex(&block.hash),
            block.height(),
            block.transactions.len(),
            round.proposer.short()
        );
        Ok(())
    }

    fn abort(&mut self) -> Result<(), ConsensusError> {
        let Some(round) = self.round.take() else {
            self.phase = RoundPhase::Aborted;
            return Ok(());
        };
        let quorum = self.registry.read().quorum_size();
        let approvals = self.candidate_approvals_in(&round);
        if let Some(candidate) = &round.candidate {
            self.mempool.release(&candidate.reserved);
        }
        self.registry.write().record_missed(&round.proposer);
        self.phase = RoundPhase::Aborted;

        metrics::counter!("consensus_rounds_aborted").increment(1);
        warn!(
            "round {} aborted with {}/{} approvals, proposer {} missed",
            round.height,
            approvals,
            quorum,
            round.proposer.short()
        );
        Err(ConsensusError::QuorumTimeout {
            height: round.height,
            approvals,
            quorum,
        })
    }

    fn candidate_approvals_in(&self, round: &ConsensusRound) -> usize {
        let Some(hash) = round.candidate_hash() else {
            return 0;
        };
        let registry = self.registry.read();
        round.votes.approvals_for(&hash, |voter| registry.is_active(voter))
    }

    fn ensure_between_rounds(&self) -> Result<(), ConsensusError> {
        if self.phase.is_between_rounds() {
            Ok(())
        } else {
            Err(ConsensusError::RoundInProgress(self.height() + 1))
        }
    }

    fn persist_registry(&self) -> Result<(), ConsensusError> {
        let mut registry = self.registry.write();
        let mut batch = WriteBatch::new();
        for validator in registry.dirty_records() {
            batch.store_validator(&validator.address, &validator)?;
        }
        self.storage.write_batch(batch)?;
        self.storage.flush()?;
        registry.clear_dirty();
        Ok(())
    }

    pub fn register_validator(
        &mut self,
        address: Address,
        stake: Amount,
        commission_bps: u32,
    ) -> Result<Validator, ConsensusError> {
        self.ensure_between_rounds()?;
        let height = self.height();
        let validator = self
            .registry
            .write()
            .register(address, stake, commission_bps, height)?
            .clone();
        self.persist_registry()?;
        Ok(validator)
    }

    pub fn deactivate_validator(&mut self, address: &Address) -> Result<(), ConsensusError> {
        self.ensure_between_rounds()?;
        self.registry.write().deactivate(address)?;
        self.persist_registry()
    }

    /// Returns `true` when the slash removed the validator from the active set.
    pub fn slash_validator(&mut self, address: &Address, amount: &Amount) -> Result<bool, ConsensusError> {
        self.ensure_between_rounds()?;
        let deactivated = self.registry.write().slash(address, amount)?;
        self.persist_registry()?;
        Ok(deactivated)
    }

    pub fn delegate(&mut self, address: &Address, amount: &Amount) -> Result<(), ConsensusError> {
        self.ensure_between_rounds()?;
        self.registry.write().delegate(address, amount)?;
        self.persist_registry()
    }

    pub fn is_between_rounds(&self) -> bool {
        self.phase.is_between_rounds()
    }
}
