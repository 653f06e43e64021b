//! Async wrapper that owns a [`ConsensusEngine`] on a single task.
//!
//! The driver ticks the engine on the block interval and feeds it gossip and
//! operator commands through channels, so ingress never contends with round
//! processing.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use vnc_crypto::SignatureVerifier;
use vnc_mempool::Mempool;
use vnc_types::{Address, Amount, Hash32, Transaction};

use crate::engine::{admit_transaction, ConsensusEngine};
use crate::error::ConsensusError;
use crate::query::ChainQuery;
use crate::registry::Validator;
use crate::transport::{encode, Envelope, MessageKind, Transport};

type Reply<T> = oneshot::Sender<Result<T, ConsensusError>>;

/// Registry changes requested by an operator.
#[derive(Debug)]
pub enum EngineCommand {
    Register {
        address: Address,
        stake: Amount,
        commission_bps: u32,
        reply: Reply<Validator>,
    },
    Deactivate {
        address: Address,
        reply: Reply<()>,
    },
    Slash {
        address: Address,
        amount: Amount,
        reply: Reply<bool>,
    },
    Delegate {
        address: Address,
        amount: Amount,
        reply: Reply<()>,
    },
}

impl EngineCommand {
    fn apply(self, engine: &mut ConsensusEngine) {
        // the requester may have gone away; nothing to do then
        match self {
            Self::Register {
                address,
                stake,
                commission_bps,
                reply,
            } => {
                let _ = reply.send(engine.register_validator(address, stake, commission_bps));
            }
            Self::Deactivate { address, reply } => {
                let _ = reply.send(engine.deactivate_validator(&address));
            }
            Self::Slash {
                address,
                amount,
                reply,
            } => {
                let _ = reply.send(engine.slash_validator(&address, &amount));
            }
            Self::Delegate {
                address,
                amount,
                reply,
            } => {
                let _ = reply.send(engine.delegate(&address, &amount));
            }
        }
    }
}

/// Cloneable ingress for RPC handlers and the CLI.
#[derive(Clone)]
pub struct EngineHandle {
    mempool: Arc<Mempool>,
    verifier: Arc<dyn SignatureVerifier>,
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedSender<EngineCommand>,
    query: ChainQuery,
}

impl EngineHandle {
    /// Verify, admit and gossip a transaction without touching round state.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Hash32, ConsensusError> {
        let payload = encode(&tx)?;
        let hash = admit_transaction(&self.mempool, self.verifier.as_ref(), tx)?;
        self.transport.broadcast(MessageKind::Transaction, payload);
        Ok(hash)
    }

    pub fn query(&self) -> &ChainQuery {
        &self.query
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> EngineCommand,
    ) -> Result<T, ConsensusError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ConsensusError::EngineStopped)?;
        response.await.map_err(|_| ConsensusError::EngineStopped)?
    }

    pub async fn register_validator(
        &self,
        address: Address,
        stake: Amount,
        commission_bps: u32,
    ) -> Result<Validator, ConsensusError> {
        self.request(|reply| EngineCommand::Register {
            address,
            stake,
            commission_bps,
            reply,
        })
        .await
    }

    pub async fn deactivate_validator(&self, address: Address) -> Result<(), ConsensusError> {
        self.request(|reply| EngineCommand::Deactivate { address, reply })
            .await
    }

    pub async fn slash_validator(&self, address: Address, amount: Amount) -> Result<bool, ConsensusError> {
        self.request(|reply| EngineCommand::Slash {
            address,
            amount,
            reply,
        })
        .await
    }

    pub async fn delegate(&self, address: Address, amount: Amount) -> Result<(), ConsensusError> {
        self.request(|reply| EngineCommand::Delegate {
            address,
            amount,
            reply,
        })
        .await
    }
}

pub struct EngineDriver {
    engine: ConsensusEngine,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    pending: VecDeque<EngineCommand>,
}

impl EngineDriver {
    pub fn new(engine: ConsensusEngine, inbox: mpsc::UnboundedReceiver<Envelope>) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = EngineHandle {
            mempool: engine.mempool.clone(),
            verifier: engine.verifier.clone(),
            transport: engine.transport.clone(),
            commands: command_tx,
            query: engine.query(),
        };
        let driver = Self {
            engine,
            inbox,
            commands: command_rx,
            pending: VecDeque::new(),
        };
        (driver, handle)
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConsensusEngine {
        let mut ticker = interval(self.engine.config().block_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "consensus driver started for {} ({} proposer)",
            self.engine.address().short(),
            self.engine.strategy_name()
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    report(self.engine.tick());
                    self.apply_pending();
                }
                Some(envelope) = self.inbox.recv() => {
                    report(self.engine.on_receive(envelope.kind, &envelope.payload));
                    self.apply_pending();
                }
                Some(command) = self.commands.recv() => {
                    self.pending.push_back(command);
                    self.apply_pending();
                }
            }
        }

        info!("consensus driver stopped at height {}", self.engine.height());
        self.engine
    }

    /// Registry commands wait until no round holds speculative state.
    fn apply_pending(&mut self) {
        while self.engine.is_between_rounds() {
            let Some(command) = self.pending.pop_front() else {
                break;
            };
            command.apply(&mut self.engine);
        }
        if !self.pending.is_empty() {
            debug!("{} operator commands waiting for round end", self.pending.len());
        }
    }
}

fn report(result: Result<(), ConsensusError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_transient() => warn!("{}", err),
        Err(err) => error!("{}", err),
    }
}
