use crate::config::NodeConfig;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use vnc_consensus::{
    ConsensusEngine, EngineDriver, EngineHandle, GenesisAllocation, GenesisConfig,
    GenesisValidator, LocalHub,
};
use vnc_crypto::{sign_transaction, KeyPair, Signer};
use vnc_storage::{MemoryStorage, SledStorage, Storage};
use vnc_types::{hash_bytes, short_hex, Address, Amount, Transaction};

/// Validator keys are derived from their index so every run of the same
/// devnet agrees on the genesis set.
pub fn validator_key(index: usize) -> KeyPair {
    KeyPair::from_seed(hash_bytes(format!("vnc-devnet-validator-{index}").as_bytes()))
}

pub fn faucet_key() -> KeyPair {
    KeyPair::from_seed(hash_bytes(b"vnc-devnet-faucet"))
}

pub fn demo_recipient(index: usize) -> Address {
    Address::from(format!("demo-{index:02}"))
}

pub fn genesis(config: &NodeConfig, validators: &[Arc<KeyPair>], faucet: &KeyPair) -> GenesisConfig {
    GenesisConfig {
        timestamp_ms: 0,
        allocations: vec![GenesisAllocation {
            address: faucet.address(),
            balance: Amount::from_tokens(config.faucet_balance_tokens),
        }],
        validators: validators
            .iter()
            .map(|key| GenesisValidator {
                address: key.address(),
                stake: config.consensus.min_validator_stake.clone(),
                commission_bps: 0,
            })
            .collect(),
    }
}

/// A set of validator engines wired through one in-process hub.
pub struct Devnet {
    handles: Vec<EngineHandle>,
    tasks: Vec<JoinHandle<ConsensusEngine>>,
    helpers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    faucet: Arc<KeyPair>,
}

impl Devnet {
    pub fn spawn(config: &NodeConfig) -> Result<Self> {
        let keys: Vec<Arc<KeyPair>> = (0..config.validators)
            .map(|index| Arc::new(validator_key(index)))
            .collect();
        let faucet = Arc::new(faucet_key());
        let genesis = genesis(config, &keys, &faucet);
        let hub = LocalHub::new();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut handles = Vec::with_capacity(keys.len());
        let mut tasks = Vec::with_capacity(keys.len());
        for (index, key) in keys.into_iter().enumerate() {
            let storage: Arc<dyn Storage> = if config.ephemeral {
                Arc::new(MemoryStorage::new())
            } else {
                Arc::new(SledStorage::open(config.validator_dir(index))?)
            };
            let (transport, inbox) = hub.connect();
            let engine = ConsensusEngine::builder(config.consensus.clone(), key.clone())
                .storage(storage)
                .transport(Arc::new(transport))
                .genesis(genesis.clone())
                .build()?;
            info!(
                "validator {} ({}) ready at height {}",
                index,
                key.address().short(),
                engine.height()
            );

            let (driver, handle) = EngineDriver::new(engine, inbox);
            handles.push(handle);
            tasks.push(tokio::spawn(driver.run(shutdown_rx.clone())));
        }

        let mut helpers = Vec::new();
        if let Some(first) = handles.first() {
            helpers.push(tokio::spawn(report_status(
                first.clone(),
                Duration::from_secs(config.status_interval_secs.max(1)),
                shutdown_rx.clone(),
            )));
            if config.demo_load {
                info!(
                    "demo load enabled: faucet {} pays {} recipients",
                    faucet.address().short(),
                    config.demo_recipients
                );
                helpers.push(tokio::spawn(run_demo_load(
                    first.clone(),
                    faucet.clone(),
                    config.demo_recipients,
                    config.consensus.block_interval(),
                    shutdown_rx,
                )));
            }
        }

        Ok(Self {
            handles,
            tasks,
            helpers,
            shutdown,
            faucet,
        })
    }

    pub fn handles(&self) -> &[EngineHandle] {
        &self.handles
    }

    pub fn faucet(&self) -> &Arc<KeyPair> {
        &self.faucet
    }

    /// Stop every driver and hand back the engines.
    pub async fn shutdown(self) -> Result<Vec<ConsensusEngine>> {
        let _ = self.shutdown.send(true);
        drop(self.handles);

        for helper in self.helpers {
            helper.await.map_err(|err| anyhow!("devnet helper task failed: {err}"))?;
        }
        let mut engines = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            engines.push(task.await.map_err(|err| anyhow!("validator task failed: {err}"))?);
        }
        Ok(engines)
    }
}

async fn report_status(handle: EngineHandle, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let query = handle.query();
                let tip = query.chain_tip();
                let stats = query.mempool_stats();
                info!(
                    "height {} tip {} validators {} mempool {} ({} reserved)",
                    tip.height,
                    short_hex(&tip.hash),
                    query.active_validator_count(),
                    stats.size,
                    stats.reserved
                );
            }
        }
    }
}

async fn run_demo_load(
    handle: EngineHandle,
    faucet: Arc<KeyPair>,
    recipients: usize,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut nonce = handle.query().nonce(&faucet.address());
    let mut sent = 0usize;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let tx = Transaction::new(
                    faucet.address(),
                    demo_recipient(sent % recipients),
                    Amount::from_tokens(1),
                    nonce,
                );
                match handle.submit_transaction(sign_transaction(tx, faucet.as_ref())) {
                    Ok(hash) => {
                        debug!("demo transfer {} nonce {}", short_hex(&hash), nonce);
                        nonce += 1;
                        sent += 1;
                    }
                    Err(err) => {
                        warn!("demo transfer refused: {}", err);
                        nonce = handle.query().nonce(&faucet.address());
                    }
                }
            }
        }
    }
    info!("demo load stopped after {} transfers", sent);
}
