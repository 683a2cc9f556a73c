pub mod exec;
pub mod sim;

use std::{fmt, io, path::PathBuf, str::FromStr, sync::Arc};

use async_trait::async_trait;
use les_simulator_config::{
    chain::{HexDecodeError, decode_fixed},
    cluster::{AdapterKind, UnsupportedAdapterError},
    services::NodeRole,
};
use rand::{Rng as _, thread_rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

pub use self::{exec::ExecAdapter, sim::SimAdapter};
use crate::services::{ServiceError, ServiceInfo, Services};

/// Random 32-byte node identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 32]);

impl NodeId {
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        thread_rng().fill(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

impl FromStr for NodeId {
    type Err = HexDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// What a node learns about a peer when a connection is established.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,
}

/// Per-node settings handed to an adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub name: String,
    /// Name of the registered service this node runs.
    pub service: String,
    pub role: NodeRole,
    pub log_file: Option<PathBuf>,
    pub log_verbosity: Option<String>,
    /// Endpoint of the external signing daemon, if any.
    pub external_signer: Option<String>,
}

impl NodeConfig {
    /// Config with a fresh random id, named after its service.
    #[must_use]
    pub fn random(service: impl Into<String>, role: NodeRole) -> Self {
        let service = service.into();
        Self {
            id: NodeId::random(),
            name: service.clone(),
            service,
            role,
            log_file: None,
            log_verbosity: None,
            external_signer: None,
        }
    }

    #[must_use]
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }

    #[must_use]
    pub fn with_log_verbosity(mut self, verbosity: Option<String>) -> Self {
        self.log_verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_external_signer(mut self, endpoint: Option<String>) -> Self {
        self.external_signer = endpoint;
        self
    }

    #[must_use]
    pub fn peer_info(&self) -> PeerInfo {
        PeerInfo {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedAdapterError),
    #[error("no service registered under '{service}'")]
    UnknownService { service: String },
    #[error("node {node} is already running")]
    AlreadyRunning { node: String },
    #[error("node {node} is not running")]
    NotRunning { node: String },
    #[error("service of node {node} failed: {source}")]
    Service {
        node: String,
        #[source]
        source: ServiceError,
    },
    #[error("failed to create adapter tempdir: {source}")]
    TempDir {
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode chain snapshot: {source}")]
    EncodeChain {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode node config: {source}")]
    EncodeConfig {
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to allocate an api port: {source}")]
    PortAllocation {
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn node process '{}': {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("node {node} did not become ready before timeout: {source}")]
    Readiness {
        node: String,
        #[source]
        source: tokio::time::error::Elapsed,
    },
    #[error("node {node} exited before becoming ready")]
    Exited { node: String },
    #[error("request to node {node} failed: {source}")]
    Request {
        node: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("node {node} rejected request: {message}")]
    Rejected { node: String, message: String },
}

/// A node as driven by an adapter.
#[async_trait]
pub trait AdapterNode: Send + Sync {
    fn id(&self) -> NodeId {
        self.config().id
    }

    fn config(&self) -> &NodeConfig;

    async fn start(&mut self) -> Result<(), AdapterError>;

    async fn stop(&mut self) -> Result<(), AdapterError>;

    async fn connect(&mut self, peer: &PeerInfo) -> Result<(), AdapterError>;

    async fn disconnect(&mut self, peer: &NodeId) -> Result<(), AdapterError>;

    async fn info(&self) -> Result<ServiceInfo, AdapterError>;
}

/// Execution strategy that turns node configs into runnable nodes.
pub trait NodeAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn new_node(&self, config: NodeConfig) -> Result<Box<dyn AdapterNode>, AdapterError>;
}

/// Build the adapter for `kind` over the given service registry.
pub fn create_adapter(
    kind: AdapterKind,
    services: Services,
) -> Result<Arc<dyn NodeAdapter>, AdapterError> {
    let adapter: Arc<dyn NodeAdapter> = match kind {
        AdapterKind::Sim => Arc::new(SimAdapter::new(services)),
        AdapterKind::Exec => Arc::new(ExecAdapter::new(services)?),
    };
    Ok(adapter)
}

/// Like [`create_adapter`] but selects the adapter by name.
pub fn new_adapter(name: &str, services: Services) -> Result<Arc<dyn NodeAdapter>, AdapterError> {
    create_adapter(name.parse()?, services)
}
