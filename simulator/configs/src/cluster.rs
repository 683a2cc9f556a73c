use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use thiserror::Error;

use crate::{
    chain::Address,
    constants::DEFAULT_CHAIN_ID,
    services::{ClientServiceConfig, ServerServiceConfig},
};

/// Execution strategy for cluster nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Nodes run inside the orchestrating process.
    #[default]
    Sim,
    /// Each node runs in its own `les-sim-node` child process.
    Exec,
}

impl AdapterKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sim => "sim",
            Self::Exec => "exec",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported adapter '{0}'")]
pub struct UnsupportedAdapterError(pub String);

impl FromStr for AdapterKind {
    type Err = UnsupportedAdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sim" => Ok(Self::Sim),
            "exec" => Ok(Self::Exec),
            other => Err(UnsupportedAdapterError(other.to_owned())),
        }
    }
}

/// Directed client to server link: `from` indexes clients, `to` servers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conn {
    pub from: usize,
    pub to: usize,
}

impl Conn {
    #[must_use]
    pub const fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}->s{}", self.from, self.to)
    }
}

/// External signing daemon settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerSettings {
    pub enabled: bool,
    pub keystore_path: Option<PathBuf>,
    /// Rule script installed into every daemon.
    pub rules: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClusterConfigError {
    #[error("failed to read cluster config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse cluster config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Declarative description of a cluster. Immutable once handed to the
/// controller.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub adapter: AdapterKind,
    pub client_configs: Vec<ClientServiceConfig>,
    pub server_configs: Vec<ServerServiceConfig>,
    /// Explicit client/server links. `None` connects every client to every
    /// server.
    pub conns: Option<Vec<Conn>>,
    pub chain_id: u64,
    /// Number of blocks generated on top of genesis.
    pub blocks: usize,
    pub deploy_payment_contract: bool,
    pub deploy_oracle_contract: bool,
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    pub prefunds: BTreeMap<Address, BigUint>,
    pub signer: SignerSettings,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterKind::default(),
            client_configs: Vec::new(),
            server_configs: Vec::new(),
            conns: None,
            chain_id: DEFAULT_CHAIN_ID,
            blocks: 0,
            deploy_payment_contract: false,
            deploy_oracle_contract: false,
            prefunds: BTreeMap::new(),
            signer: SignerSettings::default(),
        }
    }
}

impl ClusterConfig {
    /// Cluster of `clients` and `servers` nodes with default service
    /// options.
    #[must_use]
    pub fn with_node_counts(clients: usize, servers: usize) -> Self {
        Self {
            client_configs: vec![ClientServiceConfig::default(); clients],
            server_configs: vec![ServerServiceConfig::default(); servers],
            ..Self::default()
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ClusterConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ClusterConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ClusterConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.client_configs.len()
    }

    #[must_use]
    pub fn server_count(&self) -> usize {
        self.server_configs.len()
    }

    #[must_use]
    pub const fn with_adapter(mut self, adapter: AdapterKind) -> Self {
        self.adapter = adapter;
        self
    }

    #[must_use]
    pub fn with_client_configs(mut self, configs: Vec<ClientServiceConfig>) -> Self {
        self.client_configs = configs;
        self
    }

    #[must_use]
    pub fn with_server_configs(mut self, configs: Vec<ServerServiceConfig>) -> Self {
        self.server_configs = configs;
        self
    }

    #[must_use]
    pub fn with_conns(mut self, conns: Vec<Conn>) -> Self {
        self.conns = Some(conns);
        self
    }

    #[must_use]
    pub const fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    #[must_use]
    pub const fn with_blocks(mut self, blocks: usize) -> Self {
        self.blocks = blocks;
        self
    }

    #[must_use]
    pub const fn with_payment_contract(mut self, deploy: bool) -> Self {
        self.deploy_payment_contract = deploy;
        self
    }

    #[must_use]
    pub const fn with_oracle_contract(mut self, deploy: bool) -> Self {
        self.deploy_oracle_contract = deploy;
        self
    }

    #[must_use]
    pub fn with_prefund(mut self, address: Address, balance: BigUint) -> Self {
        self.prefunds.insert(address, balance);
        self
    }

    #[must_use]
    pub fn with_signer(mut self, keystore_path: impl Into<PathBuf>, rules: Option<String>) -> Self {
        self.signer = SignerSettings {
            enabled: true,
            keystore_path: Some(keystore_path.into()),
            rules,
        };
        self
    }
}
