mod events;

use std::{collections::HashMap, sync::Arc};

pub use events::{EVENT_CHANNEL_CAPACITY, NetworkEvent};
use les_simulator_config::services::NodeRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    adapter::{AdapterError, AdapterNode, NodeAdapter, NodeConfig, NodeId},
    services::ServiceInfo,
};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("node {id} already exists")]
    DuplicateNode { id: NodeId },
    #[error("unknown node {id}")]
    UnknownNode { id: NodeId },
    #[error("node {id} is already up")]
    NodeAlreadyUp { id: NodeId },
    #[error("node {id} is not up")]
    NodeNotUp { id: NodeId },
    #[error("node {id} cannot connect to itself")]
    SelfConnection { id: NodeId },
    #[error("nodes {one} and {other} are already connected")]
    AlreadyConnected { one: NodeId, other: NodeId },
    #[error("no connection between {one} and {other}")]
    ConnectionNotFound { one: NodeId, other: NodeId },
    #[error("nodes {one} and {other} are already disconnected")]
    AlreadyDisconnected { one: NodeId, other: NodeId },
    #[error("adapter operation on node {id} failed: {source}")]
    Adapter {
        id: NodeId,
        #[source]
        source: AdapterError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Constructed,
    Running,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,
    pub status: NodeStatus,
}

/// Connection between two nodes. `one` is the side that initiated it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnRecord {
    pub one: NodeId,
    pub other: NodeId,
    pub up: bool,
}

impl ConnRecord {
    fn links(&self, a: NodeId, b: NodeId) -> bool {
        (self.one == a && self.other == b) || (self.one == b && self.other == a)
    }

    fn touches(&self, id: NodeId) -> bool {
        self.one == id || self.other == id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub nodes: Vec<NodeSummary>,
    pub conns: Vec<ConnRecord>,
}

struct NetworkNode {
    node: Box<dyn AdapterNode>,
    status: NodeStatus,
}

/// Nodes created through one adapter and the connections between them.
pub struct Network {
    adapter: Arc<dyn NodeAdapter>,
    nodes: Vec<NetworkNode>,
    index: HashMap<NodeId, usize>,
    conns: Vec<ConnRecord>,
    events: broadcast::Sender<NetworkEvent>,
}

impl Network {
    #[must_use]
    pub fn new(adapter: Arc<dyn NodeAdapter>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            adapter,
            nodes: Vec::new(),
            index: HashMap::new(),
            conns: Vec::new(),
            events,
        }
    }

    #[must_use]
    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: NetworkEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn new_node_with_config(&mut self, config: NodeConfig) -> Result<NodeId, NetworkError> {
        let id = config.id;
        if self.index.contains_key(&id) {
            return Err(NetworkError::DuplicateNode { id });
        }
        let node = self
            .adapter
            .new_node(config)
            .map_err(|source| NetworkError::Adapter { id, source })?;
        self.index.insert(id, self.nodes.len());
        self.nodes.push(NetworkNode {
            node,
            status: NodeStatus::Constructed,
        });
        debug!(node = %id.short(), "added node to network");
        Ok(id)
    }

    fn position(&self, id: NodeId) -> Result<usize, NetworkError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(NetworkError::UnknownNode { id })
    }

    fn ensure_running(&self, id: NodeId, pos: usize) -> Result<(), NetworkError> {
        if self.nodes[pos].status != NodeStatus::Running {
            return Err(NetworkError::NodeNotUp { id });
        }
        Ok(())
    }

    pub async fn start(&mut self, id: NodeId) -> Result<(), NetworkError> {
        let pos = self.position(id)?;
        let entry = &mut self.nodes[pos];
        if entry.status == NodeStatus::Running {
            return Err(NetworkError::NodeAlreadyUp { id });
        }
        entry
            .node
            .start()
            .await
            .map_err(|source| NetworkError::Adapter { id, source })?;
        entry.status = NodeStatus::Running;
        self.publish(NetworkEvent::NodeUp { id });
        Ok(())
    }

    /// Stop a running node. Its live connections are marked down and the
    /// remote ends are told to drop it.
    pub async fn stop(&mut self, id: NodeId) -> Result<(), NetworkError> {
        let pos = self.position(id)?;
        self.ensure_running(id, pos)?;
        self.nodes[pos]
            .node
            .stop()
            .await
            .map_err(|source| NetworkError::Adapter { id, source })?;
        self.nodes[pos].status = NodeStatus::Stopped;

        let mut dropped = Vec::new();
        for conn in self.conns.iter_mut().filter(|c| c.up && c.touches(id)) {
            conn.up = false;
            dropped.push(conn.clone());
        }
        for conn in dropped {
            let remote = if conn.one == id { conn.other } else { conn.one };
            if let Some(&remote_pos) = self.index.get(&remote)
                && self.nodes[remote_pos].status == NodeStatus::Running
                && let Err(error) = self.nodes[remote_pos].node.disconnect(&id).await
            {
                warn!(node = %remote.short(), peer = %id.short(), %error, "failed to drop peer of stopped node");
            }
            self.publish(NetworkEvent::ConnDown {
                one: conn.one,
                other: conn.other,
            });
        }

        self.publish(NetworkEvent::NodeDown { id });
        Ok(())
    }

    /// Connect `one` to `other` on both sides. If the second side fails the
    /// first is undone.
    pub async fn connect(&mut self, one: NodeId, other: NodeId) -> Result<(), NetworkError> {
        if one == other {
            return Err(NetworkError::SelfConnection { id: one });
        }
        let a = self.position(one)?;
        let b = self.position(other)?;
        self.ensure_running(one, a)?;
        self.ensure_running(other, b)?;
        if self.conns.iter().any(|c| c.up && c.links(one, other)) {
            return Err(NetworkError::AlreadyConnected { one, other });
        }

        let peer_b = self.nodes[b].node.config().peer_info();
        let peer_a = self.nodes[a].node.config().peer_info();

        self.nodes[a]
            .node
            .connect(&peer_b)
            .await
            .map_err(|source| NetworkError::Adapter { id: one, source })?;
        if let Err(source) = self.nodes[b].node.connect(&peer_a).await {
            if let Err(error) = self.nodes[a].node.disconnect(&other).await {
                warn!(node = %one.short(), peer = %other.short(), %error, "failed to undo half-open connection");
            }
            return Err(NetworkError::Adapter { id: other, source });
        }

        match self.conns.iter_mut().find(|c| c.links(one, other)) {
            Some(conn) => conn.up = true,
            None => self.conns.push(ConnRecord {
                one,
                other,
                up: true,
            }),
        }
        self.publish(NetworkEvent::ConnUp { one, other });
        Ok(())
    }

    /// Tear down the connection between `one` and `other` on both sides. If
    /// the second side fails the first is reconnected.
    pub async fn disconnect(&mut self, one: NodeId, other: NodeId) -> Result<(), NetworkError> {
        let Some(conn) = self.conns.iter().position(|c| c.links(one, other)) else {
            return Err(NetworkError::ConnectionNotFound { one, other });
        };
        if !self.conns[conn].up {
            return Err(NetworkError::AlreadyDisconnected { one, other });
        }
        let a = self.position(one)?;
        let b = self.position(other)?;

        self.nodes[a]
            .node
            .disconnect(&other)
            .await
            .map_err(|source| NetworkError::Adapter { id: one, source })?;
        if let Err(source) = self.nodes[b].node.disconnect(&one).await {
            let peer_b = self.nodes[b].node.config().peer_info();
            if let Err(error) = self.nodes[a].node.connect(&peer_b).await {
                warn!(node = %one.short(), peer = %other.short(), %error, "failed to restore connection");
            }
            return Err(NetworkError::Adapter { id: other, source });
        }

        self.conns[conn].up = false;
        self.publish(NetworkEvent::ConnDown { one, other });
        Ok(())
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<NodeSummary> {
        self.nodes
            .iter()
            .map(|entry| {
                let config = entry.node.config();
                NodeSummary {
                    id: config.id,
                    name: config.name.clone(),
                    role: config.role,
                    status: entry.status,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn conns(&self) -> &[ConnRecord] {
        &self.conns
    }

    /// Connections currently up.
    pub fn live_conns(&self) -> impl Iterator<Item = &ConnRecord> {
        self.conns.iter().filter(|conn| conn.up)
    }

    #[must_use]
    pub fn status(&self, id: NodeId) -> Option<NodeStatus> {
        self.index.get(&id).map(|&pos| self.nodes[pos].status)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&dyn AdapterNode> {
        self.index
            .get(&id)
            .map(|&pos| self.nodes[pos].node.as_ref())
    }

    pub async fn node_info(&self, id: NodeId) -> Result<ServiceInfo, NetworkError> {
        let pos = self.position(id)?;
        self.nodes[pos]
            .node
            .info()
            .await
            .map_err(|source| NetworkError::Adapter { id, source })
    }

    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self.nodes(),
            conns: self.conns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use les_simulator_config::{
        cluster::ClusterConfig,
        services::{ClientServiceConfig, ServerServiceConfig},
    };

    use super::*;
    use crate::{
        adapter::SimAdapter,
        chain::BootstrapChain,
        services::{ServiceSpec, Services},
    };

    fn network(light_peers: usize) -> Network {
        let chain = BootstrapChain::generate(&ClusterConfig::with_node_counts(1, 2))
            .unwrap()
            .blockchain;
        let mut services = Services::default();
        services
            .register(
                "server",
                ServiceSpec::Server {
                    config: ServerServiceConfig::default().with_light_peers(light_peers),
                    mining: false,
                }
                .into_factory(chain.clone()),
            )
            .unwrap();
        services
            .register(
                "client",
                ServiceSpec::Client {
                    config: ClientServiceConfig::default(),
                }
                .into_factory(chain),
            )
            .unwrap();
        Network::new(Arc::new(SimAdapter::new(services)))
    }

    fn add(net: &mut Network, service: &str, role: NodeRole) -> NodeId {
        net.new_node_with_config(NodeConfig::random(service, role))
            .unwrap()
    }

    #[tokio::test]
    async fn connect_requires_running_distinct_nodes() {
        let mut net = network(10);
        let s0 = add(&mut net, "server", NodeRole::Server);
        let s1 = add(&mut net, "server", NodeRole::Server);

        assert!(matches!(
            net.connect(s0, s0).await.unwrap_err(),
            NetworkError::SelfConnection { .. }
        ));
        assert!(matches!(
            net.connect(s0, s1).await.unwrap_err(),
            NetworkError::NodeNotUp { .. }
        ));
        assert!(matches!(
            net.connect(s0, NodeId::random()).await.unwrap_err(),
            NetworkError::UnknownNode { .. }
        ));

        net.start(s0).await.unwrap();
        assert!(matches!(
            net.connect(s0, NodeId::random()).await.unwrap_err(),
            NetworkError::UnknownNode { .. }
        ));
        assert!(matches!(
            net.connect(s0, s1).await.unwrap_err(),
            NetworkError::NodeNotUp { id } if id == s1
        ));
        net.start(s1).await.unwrap();
        assert!(matches!(
            net.start(s1).await.unwrap_err(),
            NetworkError::NodeAlreadyUp { .. }
        ));

        net.connect(s0, s1).await.unwrap();
        assert!(matches!(
            net.connect(s1, s0).await.unwrap_err(),
            NetworkError::AlreadyConnected { .. }
        ));
        assert_eq!(net.live_conns().count(), 1);
    }

    #[tokio::test]
    async fn disconnect_tracks_connection_state() {
        let mut net = network(10);
        let s0 = add(&mut net, "server", NodeRole::Server);
        let s1 = add(&mut net, "server", NodeRole::Server);
        net.start(s0).await.unwrap();
        net.start(s1).await.unwrap();

        assert!(matches!(
            net.disconnect(s0, s1).await.unwrap_err(),
            NetworkError::ConnectionNotFound { .. }
        ));
        net.connect(s0, s1).await.unwrap();
        net.disconnect(s1, s0).await.unwrap();
        assert!(matches!(
            net.disconnect(s0, s1).await.unwrap_err(),
            NetworkError::AlreadyDisconnected { .. }
        ));

        // Reconnecting reuses the record.
        net.connect(s0, s1).await.unwrap();
        assert_eq!(net.conns().len(), 1);
        assert!(net.conns()[0].up);
    }

    #[tokio::test]
    async fn rejected_second_side_undoes_the_first() {
        let mut net = network(1);
        let s0 = add(&mut net, "server", NodeRole::Server);
        let c0 = add(&mut net, "client", NodeRole::Client);
        let c1 = add(&mut net, "client", NodeRole::Client);
        for id in [s0, c0, c1] {
            net.start(id).await.unwrap();
        }

        net.connect(c0, s0).await.unwrap();
        let err = net.connect(c1, s0).await.unwrap_err();
        assert!(matches!(err, NetworkError::Adapter { id, .. } if id == s0));

        let client = net.node_info(c1).await.unwrap();
        assert!(client.peers.is_empty());
        assert_eq!(net.live_conns().count(), 1);
    }

    #[tokio::test]
    async fn stopping_a_node_drops_its_connections() {
        let mut net = network(10);
        let s0 = add(&mut net, "server", NodeRole::Server);
        let c0 = add(&mut net, "client", NodeRole::Client);
        net.start(s0).await.unwrap();
        net.start(c0).await.unwrap();
        net.connect(c0, s0).await.unwrap();

        let mut events = net.subscribe();
        net.stop(c0).await.unwrap();

        assert_eq!(net.status(c0), Some(NodeStatus::Stopped));
        assert_eq!(net.live_conns().count(), 0);
        assert!(net.node_info(s0).await.unwrap().peers.is_empty());
        assert_eq!(
            events.recv().await.unwrap(),
            NetworkEvent::ConnDown { one: c0, other: s0 }
        );
        assert_eq!(events.recv().await.unwrap(), NetworkEvent::NodeDown { id: c0 });

        assert!(matches!(
            net.stop(c0).await.unwrap_err(),
            NetworkError::NodeNotUp { .. }
        ));
    }
}
