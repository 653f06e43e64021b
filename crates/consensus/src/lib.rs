//! DPoS-BFT consensus for VNC.
//!
//! A registry of staked validators takes turns proposing blocks; a block is
//! final once `floor(2n/3) + 1` active validators approve its exact hash.
//! [`ConsensusEngine`] is the synchronous round state machine and
//! [`EngineDriver`] runs it on a tokio task.

pub mod assembler;
pub mod clock;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod proposer;
pub mod query;
pub mod registry;
pub mod round;
pub mod transport;
pub mod votes;

pub use assembler::{assemble, verify_block, AssembledBlock, AssemblyInput, BlockContext, RejectedTransaction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    quorum_size, ConfigError, ConsensusConfig, GenesisAllocation, GenesisConfig, GenesisValidator,
    ProposerPolicy,
};
pub use driver::{EngineCommand, EngineDriver, EngineHandle};
pub use engine::{ConsensusEngine, EngineBuilder};
pub use error::{BlockError, CodecError, ConsensusError, RegistrationError, ValidationError};
pub use proposer::{strategy_for, ProposerStrategy, RoundRobin, StakeWeighted};
pub use query::{ChainQuery, ChainTip, TxStatus};
pub use registry::{Commission, Validator, ValidatorRegistry, MAX_COMMISSION_BPS};
pub use round::{Candidate, ConsensusRound, RoundPhase};
pub use transport::{decode, encode, Envelope, HubTransport, LocalHub, MessageKind, NoopTransport, Transport};
pub use votes::{VoteCollector, VoteOutcome};
