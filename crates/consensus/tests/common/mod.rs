#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use vnc_consensus::{
    ConsensusConfig, ConsensusEngine, GenesisAllocation, GenesisConfig, GenesisValidator,
    ManualClock, MessageKind, Transport,
};
use vnc_crypto::{sign_transaction, KeyPair, Signer};
use vnc_storage::{MemoryStorage, Storage};
use vnc_types::{Address, Amount, Transaction};

pub const START_MS: u64 = 1_700_000_000_000;
pub const VALIDATOR_STAKE: u64 = 5_000;
pub const USER_BALANCE: u64 = 1_000_000;

/// Captures broadcasts so a test decides who receives them.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(MessageKind, Vec<u8>)>>,
}

impl RecordingTransport {
    pub fn drain(&self) -> Vec<(MessageKind, Vec<u8>)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Transport for RecordingTransport {
    fn broadcast(&self, kind: MessageKind, payload: Vec<u8>) {
        self.sent.lock().push((kind, payload));
    }
}

pub struct TestNode {
    pub key: Arc<KeyPair>,
    pub engine: ConsensusEngine,
    pub outbox: Arc<RecordingTransport>,
    pub storage: MemoryStorage,
}

/// Validators sorted by address, so node `i` is round-robin slot `i`.
pub struct Network {
    pub nodes: Vec<TestNode>,
    pub clock: ManualClock,
    pub config: ConsensusConfig,
    pub genesis: GenesisConfig,
    pub users: Vec<Arc<KeyPair>>,
}

pub fn config() -> ConsensusConfig {
    ConsensusConfig {
        chain_id: 77,
        block_interval_ms: 1_000,
        round_timeout_ms: Some(2_000),
        min_validator_stake: Amount::from(1_000),
        ..Default::default()
    }
}

pub fn validator_keys(count: usize) -> Vec<Arc<KeyPair>> {
    let mut keys: Vec<Arc<KeyPair>> = (0..count)
        .map(|i| Arc::new(KeyPair::from_seed([i as u8 + 1; 32])))
        .collect();
    keys.sort_by_key(|key| key.address());
    keys
}

pub fn user_keys(count: usize) -> Vec<Arc<KeyPair>> {
    (0..count)
        .map(|i| Arc::new(KeyPair::from_seed([100 + i as u8; 32])))
        .collect()
}

pub fn genesis_for(validators: &[Arc<KeyPair>], users: &[Arc<KeyPair>]) -> GenesisConfig {
    GenesisConfig {
        timestamp_ms: START_MS - 10_000,
        allocations: users
            .iter()
            .map(|key| GenesisAllocation {
                address: key.address(),
                balance: Amount::from(USER_BALANCE),
            })
            .collect(),
        validators: validators
            .iter()
            .map(|key| GenesisValidator {
                address: key.address(),
                stake: Amount::from(VALIDATOR_STAKE),
                commission_bps: 500,
            })
            .collect(),
    }
}

impl Network {
    pub fn new(validators: usize) -> Self {
        Self::with_config(validators, config())
    }

    pub fn with_config(validators: usize, config: ConsensusConfig) -> Self {
        let keys = validator_keys(validators);
        let users = user_keys(3);
        let genesis = genesis_for(&keys, &users);
        let clock = ManualClock::new(START_MS);

        let nodes = keys
            .into_iter()
            .map(|key| {
                let outbox = Arc::new(RecordingTransport::default());
                let storage = MemoryStorage::new();
                let engine = ConsensusEngine::builder(config.clone(), key.clone())
                    .storage(Arc::new(storage.clone()))
                    .transport(outbox.clone())
                    .clock(Arc::new(clock.clone()))
                    .genesis(genesis.clone())
                    .build()
                    .expect("engine builds");
                TestNode {
                    key,
                    engine,
                    outbox,
                    storage,
                }
            })
            .collect();

        Self {
            nodes,
            clock,
            config,
            genesis,
            users,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn address(&self, index: usize) -> Address {
        self.nodes[index].key.address()
    }

    pub fn proposer_for(&self, height: u64) -> usize {
        (height % self.nodes.len() as u64) as usize
    }

    /// Send `from`'s pending broadcasts to `to` only.
    pub fn deliver(&mut self, from: usize, to: &[usize]) {
        let messages = self.nodes[from].outbox.drain();
        for (kind, payload) in messages {
            for &target in to {
                let _ = self.nodes[target].engine.on_receive(kind, &payload);
            }
        }
    }

    /// Deliver every broadcast to every other node until the network is quiet.
    pub fn pump(&mut self) {
        loop {
            let mut delivered = false;
            for from in 0..self.nodes.len() {
                let messages = self.nodes[from].outbox.drain();
                for (kind, payload) in messages {
                    delivered = true;
                    for to in (0..self.nodes.len()).filter(|to| *to != from) {
                        let _ = self.nodes[to].engine.on_receive(kind, &payload);
                    }
                }
            }
            if !delivered {
                break;
            }
        }
    }

    /// Have the round-robin proposer of the next height propose, then gossip.
    pub fn run_height(&mut self) -> u64 {
        let height = self.nodes[0].engine.height() + 1;
        let proposer = self.proposer_for(height);
        self.clock.advance(self.config.block_interval_ms);
        self.nodes[proposer]
            .engine
            .tick()
            .expect("proposer tick succeeds");
        self.pump();
        for node in &self.nodes {
            assert_eq!(node.engine.height(), height, "node {} lagging", node.key.address());
        }
        height
    }

    /// Admit `tx` on every node, as gossip would.
    pub fn gossip_transaction(&mut self, tx: &Transaction) {
        for node in &mut self.nodes {
            let _ = node.engine.handle_transaction(tx.clone());
        }
    }
}

pub fn transfer(from: &KeyPair, to: Address, value: u64, nonce: u64) -> Transaction {
    sign_transaction(Transaction::new(from.address(), to, Amount::from(value), nonce), from)
}

pub fn sink() -> Address {
    Address::from("sink")
}

pub fn storage_of(node: &TestNode) -> Arc<dyn Storage> {
    Arc::new(node.storage.clone())
}
