use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use les_simulator_config::chain::BlockchainConfig;
use les_simulator_core::{
    adapter::exec::ExecNodeConfig,
    services::{NodeService, ServiceContext, ServiceError},
};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::info;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse node config {}: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse chain snapshot {}: {source}", path.display())]
    ParseChain {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("node service failed: {source}")]
    Service {
        #[source]
        source: ServiceError,
    },
}

fn read(path: &Path) -> Result<Vec<u8>, NodeError> {
    fs::read(path).map_err(|source| NodeError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the launch config written by the exec adapter.
pub fn load_node_config(path: &Path) -> Result<ExecNodeConfig, NodeError> {
    serde_yaml::from_slice(&read(path)?).map_err(|source| NodeError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_chain(path: &Path) -> Result<BlockchainConfig, NodeError> {
    serde_json::from_slice(&read(path)?).map_err(|source| NodeError::ParseChain {
        path: path.to_path_buf(),
        source,
    })
}

/// The running service of this process and the signal that ends it.
pub struct NodeState {
    pub config: ExecNodeConfig,
    pub(crate) service: Mutex<Box<dyn NodeService>>,
    pub(crate) shutdown: Notify,
}

impl NodeState {
    /// Build the service described by `config` and start it.
    pub async fn start(config: ExecNodeConfig) -> Result<Arc<Self>, NodeError> {
        let chain = Arc::new(load_chain(&config.chain_path)?);
        let factory = config.spec.clone().into_factory(chain);

        let ctx = ServiceContext {
            node_id: config.id,
            name: config.name.clone(),
            external_signer: config.external_signer.clone(),
        };
        let mut service = factory
            .create(&ctx)
            .map_err(|source| NodeError::Service { source })?;
        service
            .start()
            .await
            .map_err(|source| NodeError::Service { source })?;
        info!(node = %config.name, id = %config.id.short(), role = %factory.role(), "node service started");

        Ok(Arc::new(Self {
            config,
            service: Mutex::new(service),
            shutdown: Notify::new(),
        }))
    }

    /// Ask the API server to wind down.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown.notified().await;
    }

    pub async fn stop_service(&self) -> Result<(), NodeError> {
        self.service
            .lock()
            .await
            .stop()
            .await
            .map_err(|source| NodeError::Service { source })
    }
}
