//! Core data model shared by every VNC crate: addresses, amounts, digests,
//! transactions, blocks, votes, accounts and receipts.

pub mod account;
pub mod address;
pub mod amount;
pub mod block;
pub mod hash;
pub mod receipt;
pub mod transaction;
pub mod vote;

pub use account::*;
pub use address::*;
pub use amount::*;
pub use block::*;
pub use hash::*;
pub use receipt::*;
pub use transaction::*;
pub use vote::*;
