use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{AdapterError, AdapterNode, NodeAdapter, NodeConfig, NodeId, PeerInfo};
use crate::services::{NodeService, ServiceContext, ServiceFactory, ServiceInfo, Services};

/// Runs every node inside the current process.
pub struct SimAdapter {
    services: Services,
}

impl SimAdapter {
    #[must_use]
    pub const fn new(services: Services) -> Self {
        Self { services }
    }
}

impl NodeAdapter for SimAdapter {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn new_node(&self, config: NodeConfig) -> Result<Box<dyn AdapterNode>, AdapterError> {
        let factory = self
            .services
            .get(&config.service)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownService {
                service: config.service.clone(),
            })?;
        debug!(node = %config.name, id = %config.id.short(), "created sim node");
        Ok(Box::new(SimNode {
            config,
            factory,
            service: None,
        }))
    }
}

/// In-process node. The service is rebuilt from its factory on every start.
pub struct SimNode {
    config: NodeConfig,
    factory: Arc<dyn ServiceFactory>,
    service: Option<Box<dyn NodeService>>,
}

impl SimNode {
    fn service_err(&self, source: crate::services::ServiceError) -> AdapterError {
        AdapterError::Service {
            node: self.config.name.clone(),
            source,
        }
    }

    fn running(&mut self) -> Result<&mut Box<dyn NodeService>, AdapterError> {
        let node = self.config.name.clone();
        self.service
            .as_mut()
            .ok_or(AdapterError::NotRunning { node })
    }
}

#[async_trait]
impl AdapterNode for SimNode {
    fn config(&self) -> &NodeConfig {
        &self.config
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        if self.service.is_some() {
            return Err(AdapterError::AlreadyRunning {
                node: self.config.name.clone(),
            });
        }
        let ctx = ServiceContext {
            node_id: self.config.id,
            name: self.config.name.clone(),
            external_signer: self.config.external_signer.clone(),
        };
        let mut service = self
            .factory
            .create(&ctx)
            .map_err(|source| self.service_err(source))?;
        service
            .start()
            .await
            .map_err(|source| self.service_err(source))?;
        self.service = Some(service);
        Ok(())
    }

    /// The service is only dropped once it stopped cleanly, so a failed stop
    /// leaves the node running.
    async fn stop(&mut self) -> Result<(), AdapterError> {
        let result = self.running()?.stop().await;
        result.map_err(|source| self.service_err(source))?;
        self.service = None;
        Ok(())
    }

    async fn connect(&mut self, peer: &PeerInfo) -> Result<(), AdapterError> {
        let result = self.running()?.add_peer(peer);
        result.map_err(|source| self.service_err(source))
    }

    async fn disconnect(&mut self, peer: &NodeId) -> Result<(), AdapterError> {
        let result = self.running()?.remove_peer(peer);
        result.map_err(|source| self.service_err(source))
    }

    async fn info(&self) -> Result<ServiceInfo, AdapterError> {
        self.service
            .as_ref()
            .map(|service| service.info())
            .ok_or_else(|| AdapterError::NotRunning {
                node: self.config.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use les_simulator_config::{
        cluster::ClusterConfig,
        services::{ClientServiceConfig, NodeRole, ServerServiceConfig},
    };

    use super::*;
    use crate::{chain::BootstrapChain, services::ServiceSpec};

    fn adapter() -> SimAdapter {
        let chain = BootstrapChain::generate(&ClusterConfig::with_node_counts(1, 1))
            .unwrap()
            .blockchain;
        let mut services = Services::default();
        services
            .register(
                "les-server-0",
                ServiceSpec::Server {
                    config: ServerServiceConfig::default(),
                    mining: false,
                }
                .into_factory(chain.clone()),
            )
            .unwrap();
        services
            .register(
                "les-client-0",
                ServiceSpec::Client {
                    config: ClientServiceConfig::default(),
                }
                .into_factory(chain),
            )
            .unwrap();
        SimAdapter::new(services)
    }

    #[test]
    fn unknown_service_is_rejected() {
        let err = adapter()
            .new_node(NodeConfig::random("les-server-9", NodeRole::Server))
            .err()
            .unwrap();
        assert!(matches!(err, AdapterError::UnknownService { .. }));
    }

    #[tokio::test]
    async fn nodes_restart_with_a_fresh_service() {
        let adapter = adapter();
        let mut server = adapter
            .new_node(NodeConfig::random("les-server-0", NodeRole::Server))
            .unwrap();
        let client = NodeConfig::random("les-client-0", NodeRole::Client);

        assert!(matches!(
            server.connect(&client.peer_info()).await.unwrap_err(),
            AdapterError::NotRunning { .. }
        ));

        server.start().await.unwrap();
        assert!(matches!(
            server.start().await.unwrap_err(),
            AdapterError::AlreadyRunning { .. }
        ));
        server.connect(&client.peer_info()).await.unwrap();
        assert_eq!(server.info().await.unwrap().peers.len(), 1);

        server.stop().await.unwrap();
        assert!(server.info().await.is_err());

        server.start().await.unwrap();
        assert!(server.info().await.unwrap().peers.is_empty());
    }

    #[tokio::test]
    async fn failed_stop_keeps_the_node_running() {
        let adapter = adapter();
        let mut node = SimNode {
            config: NodeConfig::random("les-server-0", NodeRole::Server),
            factory: Arc::clone(adapter.services.get("les-server-0").unwrap()),
            service: None,
        };
        node.start().await.unwrap();
        // Stop the service underneath the node so its own stop is refused.
        node.service.as_mut().unwrap().stop().await.unwrap();

        let err = node.stop().await.unwrap_err();
        assert!(matches!(err, AdapterError::Service { .. }));
        assert!(node.service.is_some());
        assert!(matches!(
            node.start().await.unwrap_err(),
            AdapterError::AlreadyRunning { .. }
        ));
    }
}
