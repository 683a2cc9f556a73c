mod handle;

use std::{collections::BTreeMap, io, path::PathBuf, sync::Arc};

pub use handle::{ClusterNode, NodeHandle};
use les_simulator_config::{
    chain::{Address, GenesisError},
    cluster::ClusterConfig,
    constants::{client_service_name, server_service_name},
    invariants::{ClusterInvariantError, validate_cluster_shape},
    services::NodeRole,
};
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::{
    adapter::{AdapterError, NodeConfig, NodeId, create_adapter, exec::create_tempdir},
    chain::{BootstrapChain, DeployedContracts},
    network::{Network, NetworkError, NetworkSnapshot},
    services::{ServiceError, ServiceSpec, Services},
    signer::{SignerConfig, SignerDaemon, SignerError},
    topology::{ConnectionPlan, Edge, EdgeKind, PlanError},
};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid cluster config: {source}")]
    Invariant {
        #[source]
        source: ClusterInvariantError,
    },
    #[error("failed to generate bootstrap chain: {source}")]
    Genesis {
        #[source]
        source: GenesisError,
    },
    #[error("failed to register services: {source}")]
    Service {
        #[source]
        source: ServiceError,
    },
    #[error("failed to create adapter: {source}")]
    Adapter {
        #[source]
        source: AdapterError,
    },
    #[error(transparent)]
    Network {
        #[from]
        source: NetworkError,
    },
    #[error("failed to start signer for {node}: {source}")]
    Signer {
        node: String,
        #[source]
        source: SignerError,
    },
    #[error("invalid connection plan: {source}")]
    Plan {
        #[source]
        source: PlanError,
    },
    #[error("failed to create signer directory: {source}")]
    TempDir {
        #[source]
        source: io::Error,
    },
}

struct ClusterState {
    network: Network,
    servers: Vec<ClusterNode>,
    clients: Vec<ClusterNode>,
}

impl ClusterState {
    fn endpoints(&self, edge: Edge) -> (NodeId, NodeId) {
        match edge.kind {
            EdgeKind::ClientServer => (self.clients[edge.from].id, self.servers[edge.to].id),
            EdgeKind::ServerServer => (self.servers[edge.from].id, self.servers[edge.to].id),
        }
    }
}

/// Node prepared during construction, before it is handed to the network.
struct PendingNode {
    config: NodeConfig,
    index: usize,
    signer: Option<SignerDaemon>,
    signer_dir: Option<tempfile::TempDir>,
}

/// A set of LES servers and clients sharing one bootstrap chain.
///
/// Every operation holds the cluster lock for its whole body, so lifecycle
/// and topology changes never interleave.
pub struct Cluster {
    config: Arc<ClusterConfig>,
    contracts: DeployedContracts,
    state: RwLock<ClusterState>,
}

async fn spawn_signer(
    config: &ClusterConfig,
    node: &str,
    payment_address: Option<Address>,
) -> Result<(Option<SignerDaemon>, Option<tempfile::TempDir>), ClusterError> {
    let Some(keystore) = signer_keystore(config) else {
        return Ok((None, None));
    };

    let dir = create_tempdir(&format!("{node}-clef-"))
        .map_err(|source| ClusterError::TempDir { source })?;
    let accounts: BTreeMap<Address, String> = payment_address
        .into_iter()
        .map(|address| (address, String::new()))
        .collect();
    let daemon = SignerDaemon::spawn(SignerConfig {
        dir: dir.path().to_path_buf(),
        keystore,
        chain_id: config.chain_id,
        master_seed: None,
        rules: config.signer.rules.clone(),
        accounts,
    })
    .await
    .map_err(|source| ClusterError::Signer {
        node: node.to_owned(),
        source,
    })?;
    Ok((Some(daemon), Some(dir)))
}

impl Cluster {
    /// Build every resource of the cluster. Nothing is started.
    pub async fn new(config: ClusterConfig) -> Result<Self, ClusterError> {
        validate_cluster_shape(&config).map_err(|source| ClusterError::Invariant { source })?;

        let bootstrap =
            BootstrapChain::generate(&config).map_err(|source| ClusterError::Genesis { source })?;

        let mut services = Services::default();
        let mut servers = Vec::with_capacity(config.server_count());
        for (index, server) in config.server_configs.iter().enumerate() {
            let name = server_service_name(index);
            let (signer, signer_dir) =
                spawn_signer(&config, &name, server.payment_address).await?;
            let spec = ServiceSpec::Server {
                config: server.clone(),
                mining: index == 0,
            };
            services
                .register(name.clone(), spec.into_factory(Arc::clone(&bootstrap.blockchain)))
                .map_err(|source| ClusterError::Service { source })?;
            let node = NodeConfig::random(name, NodeRole::Server)
                .with_log_file(server.log_file.clone())
                .with_log_verbosity(server.log_verbosity.clone())
                .with_external_signer(signer_endpoint(signer.as_ref()));
            servers.push(PendingNode {
                config: node,
                index,
                signer,
                signer_dir,
            });
        }

        let mut clients = Vec::with_capacity(config.client_count());
        for (index, client) in config.client_configs.iter().enumerate() {
            let name = client_service_name(index);
            let (signer, signer_dir) =
                spawn_signer(&config, &name, client.payment_address).await?;
            let spec = ServiceSpec::Client {
                config: client.clone(),
            };
            services
                .register(name.clone(), spec.into_factory(Arc::clone(&bootstrap.blockchain)))
                .map_err(|source| ClusterError::Service { source })?;
            let node = NodeConfig::random(name, NodeRole::Client)
                .with_log_file(client.log_file.clone())
                .with_log_verbosity(client.log_verbosity.clone())
                .with_external_signer(signer_endpoint(signer.as_ref()));
            clients.push(PendingNode {
                config: node,
                index,
                signer,
                signer_dir,
            });
        }

        let adapter = create_adapter(config.adapter, services)
            .map_err(|source| ClusterError::Adapter { source })?;
        let mut network = Network::new(adapter);

        let servers = add_nodes(&mut network, servers, NodeRole::Server)?;
        let clients = add_nodes(&mut network, clients, NodeRole::Client)?;

        info!(
            adapter = network.adapter_name(),
            servers = servers.len(),
            clients = clients.len(),
            "created cluster"
        );

        Ok(Self {
            config: Arc::new(config),
            contracts: bootstrap.contracts,
            state: RwLock::new(ClusterState {
                network,
                servers,
                clients,
            }),
        })
    }

    /// Start all servers, then all clients. Stops at the first failure.
    pub async fn start_nodes(&self) -> Result<(), ClusterError> {
        let mut state = self.state.write().await;

        let ids: Vec<NodeId> = state.servers.iter().map(ClusterNode::id).collect();
        for id in ids {
            state.network.start(id).await?;
        }
        info!("started all servers");

        let ids: Vec<NodeId> = state.clients.iter().map(ClusterNode::id).collect();
        for id in ids {
            state.network.start(id).await?;
        }
        info!("started all clients");
        Ok(())
    }

    /// Stop all servers, then all clients, and close their signers.
    /// Failures are logged and do not interrupt the teardown.
    pub async fn stop_nodes(&self) {
        let mut state = self.state.write().await;
        let ClusterState {
            network,
            servers,
            clients,
        } = &mut *state;

        for node in servers.iter_mut().chain(clients.iter_mut()) {
            if let Err(error) = network.stop(node.id).await {
                warn!(node = %node.id.short(), role = %node.role, index = node.index, %error, "failed to stop node");
            }
            node.release_signer();
        }
        info!("stopped all nodes");
    }

    /// Apply the connection plan. If any link fails, the links made by this
    /// call are undone in reverse order before the error is returned.
    pub async fn connect(&self) -> Result<(), ClusterError> {
        let mut state = self.state.write().await;
        let plan = self.plan(&state)?;

        let mut applied: Vec<(NodeId, NodeId)> = Vec::with_capacity(plan.len());
        for edge in plan {
            let (from, to) = state.endpoints(edge);
            if let Err(source) = state.network.connect(from, to).await {
                warn!(from = edge.from, to = edge.to, error = %source, "connect failed, rolling back");
                for (from, to) in applied.into_iter().rev() {
                    if let Err(error) = state.network.disconnect(from, to).await {
                        warn!(from = %from.short(), to = %to.short(), %error, "rollback disconnect failed");
                    }
                }
                return Err(ClusterError::Network { source });
            }
            debug!(kind = ?edge.kind, from = edge.from, to = edge.to, "connected");
            applied.push((from, to));
        }

        info!(links = applied.len(), "connected cluster");
        Ok(())
    }

    /// Remove the links of the connection plan, stopping at the first failure.
    pub async fn disconnect(&self) -> Result<(), ClusterError> {
        let mut state = self.state.write().await;
        let plan = self.plan(&state)?;
        let links = plan.len();

        for edge in plan {
            let (from, to) = state.endpoints(edge);
            state.network.disconnect(from, to).await?;
            debug!(kind = ?edge.kind, from = edge.from, to = edge.to, "disconnected");
        }

        info!(links, "disconnected cluster");
        Ok(())
    }

    fn plan(&self, state: &ClusterState) -> Result<ConnectionPlan, ClusterError> {
        ConnectionPlan::resolve(
            self.config.conns.as_deref(),
            state.clients.len(),
            state.servers.len(),
        )
        .map_err(|source| ClusterError::Plan { source })
    }

    /// Read access to the underlying network for inspection.
    pub async fn network(&self) -> RwLockReadGuard<'_, Network> {
        RwLockReadGuard::map(self.state.read().await, |state| &state.network)
    }

    pub async fn snapshot(&self) -> NetworkSnapshot {
        self.state.read().await.network.snapshot()
    }

    pub async fn clients(&self) -> Vec<NodeHandle> {
        self.state
            .read()
            .await
            .clients
            .iter()
            .map(ClusterNode::handle)
            .collect()
    }

    pub async fn servers(&self) -> Vec<NodeHandle> {
        self.state
            .read()
            .await
            .servers
            .iter()
            .map(ClusterNode::handle)
            .collect()
    }

    #[must_use]
    pub const fn contracts(&self) -> &DeployedContracts {
        &self.contracts
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }
}

fn signer_endpoint(signer: Option<&SignerDaemon>) -> Option<String> {
    signer.map(|signer| signer.endpoint().display().to_string())
}

fn add_nodes(
    network: &mut Network,
    pending: Vec<PendingNode>,
    role: NodeRole,
) -> Result<Vec<ClusterNode>, ClusterError> {
    pending
        .into_iter()
        .map(|node| {
            let id = network.new_node_with_config(node.config)?;
            debug!(node = %id.short(), %role, index = node.index, "created node");
            Ok(ClusterNode {
                id,
                role,
                index: node.index,
                signer: node.signer,
                _signer_dir: node.signer_dir,
            })
        })
        .collect()
}

/// Keystore directory used by the signer, if any.
#[must_use]
pub fn signer_keystore(config: &ClusterConfig) -> Option<PathBuf> {
    config
        .signer
        .keystore_path
        .clone()
        .filter(|_| config.signer.enabled)
}
