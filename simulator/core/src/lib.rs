pub mod adapter;
pub mod chain;
pub mod cluster;
pub mod network;
pub mod services;
pub mod signer;
pub mod topology;

pub use adapter::{AdapterError, AdapterNode, NodeAdapter, NodeConfig, NodeId, create_adapter};
pub use cluster::{Cluster, ClusterError, ClusterNode, NodeHandle};
pub use les_simulator_config::{
    IS_DEBUG_TRACING, adjust_timeout,
    cluster::{AdapterKind, ClusterConfig, Conn},
};
pub use network::{Network, NetworkEvent, NetworkSnapshot};
pub use topology::{ConnectionPlan, TopologyParser, parse_topology};
