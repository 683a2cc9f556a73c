use std::sync::Arc;

use async_trait::async_trait;
use les_simulator_config::{
    chain::BlockchainConfig,
    services::{ClientServiceConfig, NodeRole},
};
use tracing::{debug, info};

use super::{
    NodeService, PeerStatus, ServiceContext, ServiceError, ServiceFactory, ServiceInfo,
    ServiceSpec, check_signer,
};
use crate::{
    adapter::{NodeId, PeerInfo},
    chain::HeaderChain,
};

/// Builds light clients that sync headers from servers.
pub struct LightClientFactory {
    config: ClientServiceConfig,
    chain: Arc<BlockchainConfig>,
}

impl LightClientFactory {
    #[must_use]
    pub const fn new(config: ClientServiceConfig, chain: Arc<BlockchainConfig>) -> Self {
        Self { config, chain }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.config.trusted_fraction > 100 {
            return Err(ServiceError::InvalidTrustedFraction {
                fraction: self.config.trusted_fraction,
            });
        }
        if self.config.service_pay
            && self
                .config
                .payment_address
                .is_none_or(|address| address.is_zero())
        {
            return Err(ServiceError::MissingPaymentAddress);
        }
        Ok(())
    }
}

impl ServiceFactory for LightClientFactory {
    fn role(&self) -> NodeRole {
        NodeRole::Client
    }

    fn spec(&self) -> ServiceSpec {
        ServiceSpec::Client {
            config: self.config.clone(),
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
        self.validate()?;
        check_signer(ctx)?;

        let mut headers = HeaderChain::new(&self.chain.genesis);
        let imported = headers
            .insert_headers(&self.chain.headers())
            .map_err(|source| ServiceError::Chain { source })?;
        debug!(node = %ctx.name, imported, "light client imported bootstrap headers");

        Ok(Box::new(LightClientService {
            name: ctx.name.clone(),
            signer: ctx.external_signer.clone(),
            trusted: self.config.trusted_servers.clone(),
            headers,
            peers: Vec::new(),
            running: false,
        }))
    }
}

pub struct LightClientService {
    name: String,
    signer: Option<String>,
    trusted: Vec<String>,
    headers: HeaderChain,
    peers: Vec<PeerStatus>,
    running: bool,
}

#[async_trait]
impl NodeService for LightClientService {
    async fn start(&mut self) -> Result<(), ServiceError> {
        if self.running {
            return Err(ServiceError::AlreadyRunning);
        }
        self.running = true;
        info!(node = %self.name, head = self.headers.head().number, "light client started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServiceError> {
        if !self.running {
            return Err(ServiceError::NotRunning);
        }
        self.running = false;
        self.peers.clear();
        info!(node = %self.name, "light client stopped");
        Ok(())
    }

    fn add_peer(&mut self, peer: &PeerInfo) -> Result<(), ServiceError> {
        if !self.running {
            return Err(ServiceError::NotRunning);
        }
        if peer.role != NodeRole::Server {
            return Err(ServiceError::IncompatiblePeer {
                role: NodeRole::Client,
                peer: peer.id,
                peer_role: peer.role,
            });
        }
        if self.peers.iter().any(|known| known.id == peer.id) {
            return Err(ServiceError::DuplicatePeer { peer: peer.id });
        }
        let id = peer.id.to_string();
        let trusted = self.trusted.iter().any(|server| *server == id);
        debug!(node = %self.name, peer = %peer.name, trusted, "light client added server");
        self.peers.push(PeerStatus {
            id: peer.id,
            name: peer.name.clone(),
            role: peer.role,
            trusted,
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
        let head = self.headers.head();
        ServiceInfo {
            name: self.name.clone(),
            role: NodeRole::Client,
            running: self.running,
            genesis: self.headers.genesis_hash(),
            head_number: head.number,
            head_hash: head.hash(),
            peers: self.peers.clone(),
            mining: false,
            signer: self.signer.clone(),
        }
    }
}
