use thiserror::Error;

use crate::cluster::ClusterConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClusterInvariantError {
    #[error("cluster must contain at least one client or server")]
    EmptyCluster,
    #[error("signer is enabled but no keystore path is configured")]
    MissingKeystore,
    #[error("client {index} trusted fraction {fraction} exceeds 100")]
    TrustedFractionOutOfRange { index: usize, fraction: u32 },
}

/// Validate the shape of a cluster before any resource is created.
pub fn validate_cluster_shape(config: &ClusterConfig) -> Result<(), ClusterInvariantError> {
    if config.client_count() == 0 && config.server_count() == 0 {
        return Err(ClusterInvariantError::EmptyCluster);
    }

    if config.signer.enabled && config.signer.keystore_path.is_none() {
        return Err(ClusterInvariantError::MissingKeystore);
    }

    for (index, client) in config.client_configs.iter().enumerate() {
        if client.trusted_fraction > 100 {
            return Err(ClusterInvariantError::TrustedFractionOutOfRange {
                index,
                fraction: client.trusted_fraction,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cluster::SignerSettings, services::ClientServiceConfig};

    #[test]
    fn empty_cluster_is_rejected() {
        let err = validate_cluster_shape(&ClusterConfig::default()).unwrap_err();
        assert_eq!(err, ClusterInvariantError::EmptyCluster);
    }

    #[test]
    fn servers_only_is_accepted() {
        assert!(validate_cluster_shape(&ClusterConfig::with_node_counts(0, 2)).is_ok());
    }

    #[test]
    fn enabled_signer_needs_keystore() {
        let mut cfg = ClusterConfig::with_node_counts(1, 1);
        cfg.signer = SignerSettings {
            enabled: true,
            keystore_path: None,
            rules: None,
        };
        assert_eq!(
            validate_cluster_shape(&cfg),
            Err(ClusterInvariantError::MissingKeystore)
        );
    }

    #[test]
    fn trusted_fraction_over_hundred_is_rejected() {
        let cfg = ClusterConfig::with_node_counts(0, 1).with_client_configs(vec![
            ClientServiceConfig::default(),
            ClientServiceConfig::default().with_trusted_servers(Vec::new(), 101),
        ]);
        let err = validate_cluster_shape(&cfg).unwrap_err();
        assert!(matches!(
            err,
            ClusterInvariantError::TrustedFractionOutOfRange { index: 1, .. }
        ));
    }
}
