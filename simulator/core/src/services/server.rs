use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use les_simulator_config::{
    chain::{Address, BlockchainConfig},
    constants::BLOCK_TIME_SECS,
    services::{NodeRole, ServerServiceConfig},
    timeouts,
};
use tokio::{task::JoinHandle, time};
use tracing::{debug, info};

use super::{
    NodeService, PeerStatus, ServiceContext, ServiceError, ServiceFactory, ServiceInfo,
    ServiceSpec, check_signer,
};
use crate::{
    adapter::{NodeId, PeerInfo},
    chain::BlockChain,
};

/// Coinbase credited by blocks the mining server seals.
#[must_use]
pub fn miner_coinbase() -> Address {
    let mut bytes = [0u8; 20];
    bytes[16..].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    Address(bytes)
}

/// Builds full nodes with the light-serving extension enabled.
pub struct FullNodeFactory {
    config: ServerServiceConfig,
    chain: Arc<BlockchainConfig>,
    mining: bool,
}

impl FullNodeFactory {
    #[must_use]
    pub const fn new(config: ServerServiceConfig, chain: Arc<BlockchainConfig>, mining: bool) -> Self {
        Self {
            config,
            chain,
            mining,
        }
    }
}

impl ServiceFactory for FullNodeFactory {
    fn role(&self) -> NodeRole {
        NodeRole::Server
    }

    fn spec(&self) -> ServiceSpec {
        ServiceSpec::Server {
            config: self.config.clone(),
            mining: self.mining,
        }
    }

    fn chain(&self) -> &Arc<BlockchainConfig> {
        &self.chain
    }

    fn create(&self, ctx: &ServiceContext) -> Result<Box<dyn NodeService>, ServiceError> {
        self.chain
            .genesis
            .validate()
            .map_err(|source| ServiceError::Genesis { source })?;
        if self.config.service_charge
            && self
                .config
                .payment_address
                .is_none_or(|address| address.is_zero())
        {
            return Err(ServiceError::MissingPaymentAddress);
        }
        check_signer(ctx)?;

        let mut chain = BlockChain::new(&self.chain.genesis);
        let imported = chain
            .insert_chain(&self.chain.chain)
            .map_err(|source| ServiceError::Chain { source })?;
        debug!(node = %ctx.name, imported, "full node imported bootstrap blocks");

        Ok(Box::new(FullNodeService {
            name: ctx.name.clone(),
            signer: ctx.external_signer.clone(),
            light_serv: self.config.light_serv,
            light_peers: self.config.light_peers,
            mining: self.mining,
            chain: Arc::new(Mutex::new(chain)),
            peers: Vec::new(),
            running: false,
            miner: None,
        }))
    }
}

pub struct FullNodeService {
    name: String,
    signer: Option<String>,
    light_serv: u32,
    light_peers: usize,
    mining: bool,
    chain: Arc<Mutex<BlockChain>>,
    peers: Vec<PeerStatus>,
    running: bool,
    miner: Option<JoinHandle<()>>,
}

fn lock(chain: &Mutex<BlockChain>) -> MutexGuard<'_, BlockChain> {
    chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FullNodeService {
    fn light_client_count(&self) -> usize {
        self.peers
            .iter()
            .filter(|peer| peer.role == NodeRole::Client)
            .count()
    }

    fn spawn_miner(&self) -> JoinHandle<()> {
        let chain = Arc::clone(&self.chain);
        let name = self.name.clone();
        let period = timeouts::block_period();
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut chain = lock(&chain);
                let timestamp = chain.head().timestamp + BLOCK_TIME_SECS;
                let number = chain.produce_block(miner_coinbase(), timestamp).number();
                debug!(node = %name, number, "sealed block");
            }
        })
    }
}

#[async_trait]
impl NodeService for FullNodeService {
    async fn start(&mut self) -> Result<(), ServiceError> {
        if self.running {
            return Err(ServiceError::AlreadyRunning);
        }
        self.running = true;
        if self.mining {
            self.miner = Some(self.spawn_miner());
        }
        info!(
            node = %self.name,
            head = lock(&self.chain).head().number,
            mining = self.mining,
            light_serv = self.light_serv,
            "full node started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServiceError> {
        if !self.running {
            return Err(ServiceError::NotRunning);
        }
        if let Some(miner) = self.miner.take() {
            miner.abort();
        }
        self.running = false;
        self.peers.clear();
        info!(node = %self.name, "full node stopped");
        Ok(())
    }

    fn add_peer(&mut self, peer: &PeerInfo) -> Result<(), ServiceError> {
        if !self.running {
            return Err(ServiceError::NotRunning);
        }
        if self.peers.iter().any(|known| known.id == peer.id) {
            return Err(ServiceError::DuplicatePeer { peer: peer.id });
        }
        if peer.role == NodeRole::Client {
            if self.light_serv == 0 {
                return Err(ServiceError::LightServingDisabled);
            }
            if self.light_client_count() >= self.light_peers {
                return Err(ServiceError::TooManyLightPeers {
                    limit: self.light_peers,
                });
            }
        }
        debug!(node = %self.name, peer = %peer.name, role = %peer.role, "full node added peer");
        self.peers.push(PeerStatus {
            id: peer.id,
            name: peer.name.clone(),
            role: peer.role,
            trusted: false,
        });
        Ok(())
    }

    fn remove_peer(&mut self, peer: &NodeId) -> Result<(), ServiceError> {
        let before = self.peers.len();
        self.peers.retain(|known| known.id != *peer);
        if self.peers.len() == before {
            return Err(ServiceError::UnknownPeer { peer: *peer });
        }
        Ok(())
    }

    fn info(&self) -> ServiceInfo {
        let chain = lock(&self.chain);
        let head = chain.head();
        ServiceInfo {
            name: self.name.clone(),
            role: NodeRole::Server,
            running: self.running,
            genesis: chain.genesis_hash(),
            head_number: head.number,
            head_hash: head.hash(),
            peers: self.peers.clone(),
            mining: self.miner.is_some(),
            signer: self.signer.clone(),
        }
    }
}

impl Drop for FullNodeService {
    fn drop(&mut self) {
        if let Some(miner) = self.miner.take() {
            miner.abort();
        }
    }
}
