mod client;
mod server;

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
pub use client::{LightClientFactory, LightClientService};
use les_simulator_config::{
    chain::{BlockchainConfig, GenesisError, Hash},
    services::{ClientServiceConfig, NodeRole, ServerServiceConfig},
};
use serde::{Deserialize, Serialize};
pub use server::{FullNodeFactory, FullNodeService, miner_coinbase};
use thiserror::Error;

use crate::{
    adapter::{NodeId, PeerInfo},
    chain::ChainError,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid genesis: {source}")]
    Genesis {
        #[source]
        source: GenesisError,
    },
    #[error("failed to import bootstrap chain: {source}")]
    Chain {
        #[source]
        source: ChainError,
    },
    #[error("trusted fraction {fraction} exceeds 100")]
    InvalidTrustedFraction { fraction: u32 },
    #[error("payments are enabled but no payment address is configured")]
    MissingPaymentAddress,
    #[error("external signer {} is unreachable", endpoint.display())]
    SignerUnavailable { endpoint: PathBuf },
    #[error("service is already running")]
    AlreadyRunning,
    #[error("service is not running")]
    NotRunning,
    #[error("{role} cannot peer with {peer} ({peer_role})")]
    IncompatiblePeer {
        role: NodeRole,
        peer: NodeId,
        peer_role: NodeRole,
    },
    #[error("light serving is disabled")]
    LightServingDisabled,
    #[error("light peer limit {limit} reached")]
    TooManyLightPeers { limit: usize },
    #[error("peer {peer} is already connected")]
    DuplicatePeer { peer: NodeId },
    #[error("peer {peer} is not connected")]
    UnknownPeer { peer: NodeId },
    #[error("service '{name}' is already registered")]
    DuplicateService { name: String },
}

/// Identity handed to a factory when it constructs a service.
#[derive(Clone, Debug)]
pub struct ServiceContext {
    pub node_id: NodeId,
    pub name: String,
    pub external_signer: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,
    /// Client side only: the peer is one of the configured trusted servers.
    #[serde(default)]
    pub trusted: bool,
}

/// Observable state of a running service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub role: NodeRole,
    pub running: bool,
    pub genesis: Hash,
    pub head_number: u64,
    pub head_hash: Hash,
    pub peers: Vec<PeerStatus>,
    pub mining: bool,
    pub signer: Option<String>,
}

/// The protocol stack a node runs.
#[async_trait]
pub trait NodeService: Send + Sync {
    async fn start(&mut self) -> Result<(), ServiceError>;

    async fn stop(&mut self) -> Result<(), ServiceError>;

    fn add_peer(&mut self, peer: &PeerInfo) -> Result<(), ServiceError>;

    fn remove_peer(&mut self, peer: &NodeId) -> Result<(), ServiceError>;

    fn info(&self) -> ServiceInfo;
}

/// Constructs a node's service. May be invoked any number of times.
pub trait ServiceFactory: Send + Sync {
    fn role(&self) -> NodeRole;

    /// Serializable description that rebuilds an equivalent factory.
    fn spec(&self) -> ServiceSpec;

    fn chain(&self) -> &Arc<BlockchainConfig>;

    fn create(&self, ctx: &ServiceContext) -> Result<Box<dyn NodeService>, ServiceError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ServiceSpec {
    Client {
        config: ClientServiceConfig,
    },
    Server {
        config: ServerServiceConfig,
        #[serde(default)]
        mining: bool,
    },
}

impl ServiceSpec {
    #[must_use]
    pub const fn role(&self) -> NodeRole {
        match self {
            Self::Client { .. } => NodeRole::Client,
            Self::Server { .. } => NodeRole::Server,
        }
    }

    #[must_use]
    pub fn into_factory(self, chain: Arc<BlockchainConfig>) -> Arc<dyn ServiceFactory> {
        match self {
            Self::Client { config } => Arc::new(LightClientFactory::new(config, chain)),
            Self::Server { config, mining } => Arc::new(FullNodeFactory::new(config, chain, mining)),
        }
    }
}

/// Registry of service factories keyed by service name.
#[derive(Clone, Default)]
pub struct Services {
    factories: BTreeMap<String, Arc<dyn ServiceFactory>>,
}

impl Services {
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn ServiceFactory>,
    ) -> Result<(), ServiceError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ServiceError::DuplicateService { name });
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ServiceFactory>> {
        self.factories.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

fn check_signer(ctx: &ServiceContext) -> Result<(), ServiceError> {
    match &ctx.external_signer {
        Some(endpoint) if !std::path::Path::new(endpoint).exists() => {
            Err(ServiceError::SignerUnavailable {
                endpoint: PathBuf::from(endpoint),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use les_simulator_config::cluster::ClusterConfig;

    use super::*;
    use crate::chain::BootstrapChain;

    fn chain() -> Arc<BlockchainConfig> {
        BootstrapChain::generate(&ClusterConfig::with_node_counts(1, 1).with_blocks(2))
            .unwrap()
            .blockchain
    }

    #[test]
    fn spec_rebuilds_equivalent_factory() {
        let spec = ServiceSpec::Server {
            config: ServerServiceConfig::default().with_light_peers(3),
            mining: true,
        };
        let yaml = serde_yaml::to_string(&spec).unwrap();
        let decoded: ServiceSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(decoded, spec);

        let factory = decoded.into_factory(chain());
        assert_eq!(factory.role(), NodeRole::Server);
        assert_eq!(factory.spec(), spec);
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let mut services = Services::default();
        let spec = ServiceSpec::Client {
            config: ClientServiceConfig::default(),
        };
        services
            .register("les-client-0", spec.clone().into_factory(chain()))
            .unwrap();
        let err = services
            .register("les-client-0", spec.into_factory(chain()))
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateService { .. }));
        assert_eq!(services.names().collect::<Vec<_>>(), vec!["les-client-0"]);
    }

    #[test]
    fn missing_signer_endpoint_fails_construction() {
        let ctx = ServiceContext {
            node_id: NodeId::random(),
            name: "les-client-0".to_owned(),
            external_signer: Some("/nonexistent/signer.ipc".to_owned()),
        };
        let factory = LightClientFactory::new(ClientServiceConfig::default(), chain());
        let err = factory.create(&ctx).err().unwrap();
        assert!(matches!(err, ServiceError::SignerUnavailable { .. }));
    }
}
