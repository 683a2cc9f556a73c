use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use les_simulator_core::{Cluster, ClusterConfig, parse_topology};
use tracing::{error, info, warn};

use crate::http::serve_cluster;

/// Apply a `--routes` topology to `config`.
///
/// Routes with no valid link leave the default client/server mesh in place.
#[must_use]
pub fn apply_routes(config: ClusterConfig, routes: &str) -> ClusterConfig {
    if routes.trim().is_empty() {
        return config;
    }
    let conns = parse_topology(routes, config.client_count(), config.server_count());
    if conns.is_empty() {
        warn!(routes, "no valid link in topology, using the default mesh");
        return config;
    }
    info!(routes, links = conns.len(), "using explicit topology");
    config.with_conns(conns)
}

/// Create, start and connect a cluster, then serve it over HTTP until ctrl-c.
///
/// A failed initial connect is logged and the cluster is still served so the
/// topology can be inspected and retried.
pub async fn run_cluster_demo(config: ClusterConfig, listen: SocketAddr) -> anyhow::Result<()> {
    let cluster = Arc::new(
        Cluster::new(config)
            .await
            .context("failed to create les cluster")?,
    );

    info!("starting cluster");
    cluster
        .start_nodes()
        .await
        .context("failed to start cluster nodes")?;

    info!("connecting nodes");
    if let Err(err) = cluster.connect().await {
        error!(error = %err, "connection failure");
    }

    let served = serve_cluster(Arc::clone(&cluster), listen)
        .await
        .with_context(|| format!("simulation server on {listen} failed"));

    info!("stopping cluster");
    cluster.stop_nodes().await;
    served
}

#[cfg(test)]
mod tests {
    use les_simulator_core::Conn;

    use super::*;

    #[test]
    fn routes_without_valid_links_keep_default_mesh() {
        let config = apply_routes(ClusterConfig::with_node_counts(2, 2), "bogus, c9->s0");
        assert!(config.conns.is_none());

        let config = apply_routes(ClusterConfig::with_node_counts(2, 2), "  ");
        assert!(config.conns.is_none());
    }

    #[test]
    fn valid_routes_replace_default_mesh() {
        let config = apply_routes(ClusterConfig::with_node_counts(2, 2), "bogus, c1->s0");
        assert_eq!(config.conns, Some(vec![Conn::new(1, 0)]));
    }
}
