pub mod bootstrap;
pub mod store;

pub use bootstrap::{BootstrapChain, DeployedContracts, OracleConfig, master_address, next_block};
use les_simulator_config::chain::Hash;
pub use store::{BlockChain, HeaderChain};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("expected block {expected}, got {actual}")]
    NonContiguous { expected: u64, actual: u64 },
    #[error("block {number} has unknown parent {parent}")]
    UnknownParent { number: u64, parent: Hash },
    #[error("block {number} conflicts with the local chain")]
    Conflict { number: u64 },
    #[error("block {number} transaction root does not match its body")]
    TxRootMismatch { number: u64 },
}
