use std::{net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{adapter::NodeId, services::ServiceSpec};

pub const INFO: &str = "/info";
pub const PEERS_ADD: &str = "/peers/add";
pub const PEERS_REMOVE: &str = "/peers/remove";
pub const SHUTDOWN: &str = "/shutdown";

/// File name of the shared chain snapshot inside the adapter directory.
pub const CHAIN_FILE: &str = "chain.json";
/// File name of a node's launch config inside its directory.
pub const NODE_CONFIG_FILE: &str = "node.yaml";

/// Launch config the `les-sim-node` binary reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecNodeConfig {
    pub id: NodeId,
    pub name: String,
    pub spec: ServiceSpec,
    pub chain_path: PathBuf,
    pub api_addr: SocketAddr,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub log_verbosity: Option<String>,
    #[serde(default)]
    pub external_signer: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePeerRequest {
    pub id: NodeId,
}

/// Body returned by the node API on a rejected request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
