use std::{collections::BTreeMap, sync::Arc};

use les_simulator_config::{
    chain::{Address, Block, BlockHeader, BlockchainConfig, ContractKind, Genesis, GenesisError, Hash, Transaction},
    cluster::ClusterConfig,
    constants::{
        BLOCK_TIME_SECS, DEPLOY_GAS_PRICE_GWEI, GENESIS_DIFFICULTY, GENESIS_GAS_LIMIT,
        MASTER_ACCOUNT_SEED, ORACLE_PROCESS_CONFIRMS, ORACLE_SECTION_SIZE, ORACLE_THRESHOLD, ether,
    },
};
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use tracing::{debug, info};

const GWEI: u64 = 1_000_000_000;

/// Generation step (zero based) that deploys the checkpoint oracle.
const ORACLE_DEPLOY_STEP: usize = 1;
/// Generation step (zero based) that deploys the payment contract.
const PAYMENT_DEPLOY_STEP: usize = 2;

/// Checkpoint oracle registered for a cluster's genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OracleConfig {
    pub address: Address,
    pub signers: Vec<Address>,
    pub threshold: u64,
}

/// System contracts deployed while bootstrapping, keyed by the genesis they
/// belong to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeployedContracts {
    pub genesis_hash: Hash,
    pub payment: Option<Address>,
    pub oracle: Option<OracleConfig>,
}

/// Account that funds and deploys the bootstrap contracts.
#[must_use]
pub fn master_address() -> Address {
    Address::from_seed(MASTER_ACCOUNT_SEED)
}

/// Initial chain state shared read-only by every node of a cluster.
#[derive(Clone, Debug)]
pub struct BootstrapChain {
    pub blockchain: Arc<BlockchainConfig>,
    pub contracts: DeployedContracts,
}

impl BootstrapChain {
    pub fn generate(config: &ClusterConfig) -> Result<Self, GenesisError> {
        let master = master_address();

        let mut alloc = BTreeMap::new();
        alloc.insert(master, ether());
        for (address, balance) in &config.prefunds {
            alloc.insert(*address, balance.clone());
        }

        let genesis = Genesis {
            chain_id: config.chain_id,
            gas_limit: GENESIS_GAS_LIMIT,
            difficulty: GENESIS_DIFFICULTY,
            alloc,
        };
        genesis.validate()?;
        let genesis_header = genesis.header();

        let mut nonce = 0u64;
        let mut payment = None;
        let mut oracle = None;
        let mut chain = Vec::with_capacity(config.blocks);
        let mut parent = genesis_header.clone();

        for step in 0..config.blocks {
            let mut transactions = Vec::new();

            if step == ORACLE_DEPLOY_STEP && config.deploy_oracle_contract {
                let tx = deployment(
                    master,
                    &mut nonce,
                    ContractKind::CheckpointOracle {
                        admins: vec![master],
                        section_size: ORACLE_SECTION_SIZE,
                        process_confirms: ORACLE_PROCESS_CONFIRMS,
                        threshold: ORACLE_THRESHOLD,
                    },
                );
                debug!(address = %tx.created, block = step + 1, "deploying checkpoint oracle");
                oracle = Some(OracleConfig {
                    address: tx.created,
                    signers: vec![master],
                    threshold: ORACLE_THRESHOLD,
                });
                transactions.push(tx);
            }
            if step == PAYMENT_DEPLOY_STEP && config.deploy_payment_contract {
                let tx = deployment(master, &mut nonce, ContractKind::LotteryBook);
                debug!(address = %tx.created, block = step + 1, "deploying payment contract");
                payment = Some(tx.created);
                transactions.push(tx);
            }

            let block = next_block(&parent, transactions);
            parent = block.header.clone();
            chain.push(block);
        }

        let genesis_hash = genesis_header.hash();
        info!(
            genesis = %genesis_hash,
            blocks = chain.len(),
            payment = ?payment,
            oracle = ?oracle.as_ref().map(|o| o.address),
            "generated bootstrap chain"
        );

        Ok(Self {
            blockchain: Arc::new(BlockchainConfig { genesis, chain }),
            contracts: DeployedContracts {
                genesis_hash,
                payment,
                oracle,
            },
        })
    }
}

fn deployment(master: Address, nonce: &mut u64, contract: ContractKind) -> Transaction {
    let tx = Transaction {
        from: master,
        nonce: *nonce,
        gas_price: DEPLOY_GAS_PRICE_GWEI * GWEI,
        contract,
        created: Address::contract(&master, *nonce),
    };
    *nonce += 1;
    tx
}

/// Block on top of `parent` with the given transactions and no coinbase.
#[must_use]
pub fn next_block(parent: &BlockHeader, transactions: Vec<Transaction>) -> Block {
    next_block_with(parent, transactions, Address::ZERO, parent.timestamp + BLOCK_TIME_SECS)
}

pub(crate) fn next_block_with(
    parent: &BlockHeader,
    transactions: Vec<Transaction>,
    coinbase: Address,
    timestamp: u64,
) -> Block {
    let tx_root = Block::tx_root(&transactions);
    let mut hasher = Sha256::new();
    hasher.update(parent.state_root.0);
    hasher.update(tx_root.0);
    hasher.update(coinbase.0);
    let state_root = Hash(hasher.finalize().into());

    Block {
        header: BlockHeader {
            number: parent.number + 1,
            parent_hash: parent.hash(),
            state_root,
            tx_root,
            coinbase,
            timestamp,
            difficulty: parent.difficulty,
            gas_limit: parent.gas_limit,
        },
        transactions,
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::*;

    fn config(blocks: usize) -> ClusterConfig {
        ClusterConfig::with_node_counts(1, 1)
            .with_blocks(blocks)
            .with_oracle_contract(true)
            .with_payment_contract(true)
    }

    #[test]
    fn genesis_funds_master_and_prefunds() {
        let funded = Address::from_seed("funded");
        let cfg = config(0).with_prefund(funded, BigUint::from(7u32));
        let chain = BootstrapChain::generate(&cfg).unwrap();
        let genesis = &chain.blockchain.genesis;

        assert_eq!(genesis.gas_limit, GENESIS_GAS_LIMIT);
        assert_eq!(genesis.difficulty, GENESIS_DIFFICULTY);
        assert_eq!(genesis.alloc.get(&master_address()), Some(&ether()));
        assert_eq!(genesis.alloc.get(&funded), Some(&BigUint::from(7u32)));
        assert!(chain.blockchain.chain.is_empty());
    }

    #[test]
    fn contracts_deploy_in_second_and_third_block() {
        let chain = BootstrapChain::generate(&config(5)).unwrap();
        let blocks = &chain.blockchain.chain;

        assert_eq!(blocks.len(), 5);
        assert!(blocks[0].transactions.is_empty());
        assert!(matches!(
            blocks[1].transactions[0].contract,
            ContractKind::CheckpointOracle { .. }
        ));
        assert_eq!(blocks[2].transactions[0].contract, ContractKind::LotteryBook);
        assert_eq!(blocks[2].transactions[0].nonce, 1);

        let oracle = chain.contracts.oracle.as_ref().unwrap();
        assert_eq!(oracle.signers, vec![master_address()]);
        assert_eq!(oracle.threshold, 1);
        assert_eq!(chain.contracts.payment, Some(blocks[2].transactions[0].created));
        assert_eq!(chain.contracts.genesis_hash, chain.blockchain.genesis.hash());
    }

    #[test]
    fn short_chain_skips_deployments() {
        let chain = BootstrapChain::generate(&config(2)).unwrap();
        assert!(chain.contracts.oracle.is_some());
        assert!(chain.contracts.payment.is_none());

        let chain = BootstrapChain::generate(&config(1)).unwrap();
        assert!(chain.contracts.oracle.is_none());
    }

    #[test]
    fn blocks_link_to_their_parent() {
        let chain = BootstrapChain::generate(&config(4)).unwrap();
        let mut parent = chain.blockchain.genesis.header();
        for block in &chain.blockchain.chain {
            assert_eq!(block.header.parent_hash, parent.hash());
            assert_eq!(block.number(), parent.number + 1);
            parent = block.header.clone();
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = BootstrapChain::generate(&config(3)).unwrap();
        let b = BootstrapChain::generate(&config(3)).unwrap();
        assert_eq!(a.blockchain, b.blockchain);
        assert_eq!(a.contracts, b.contracts);
    }

    #[test]
    fn zero_chain_id_is_rejected() {
        let err = BootstrapChain::generate(&config(0).with_chain_id(0)).unwrap_err();
        assert_eq!(err, GenesisError::ZeroChainId);
    }
}
