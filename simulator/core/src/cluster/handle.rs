use les_simulator_config::services::NodeRole;
use serde::Serialize;
use tempfile::TempDir;

use crate::{adapter::NodeId, signer::SignerDaemon};

/// A node the cluster created, plus the signing daemon it owns.
pub struct ClusterNode {
    pub(crate) id: NodeId,
    pub(crate) role: NodeRole,
    pub(crate) index: usize,
    pub(crate) signer: Option<SignerDaemon>,
    /// Signer working directory, removed when the node is dropped.
    pub(crate) _signer_dir: Option<TempDir>,
}

impl ClusterNode {
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn role(&self) -> NodeRole {
        self.role
    }

    /// Position within its role, in config order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn signer(&self) -> Option<&SignerDaemon> {
        self.signer.as_ref()
    }

    pub(crate) fn release_signer(&mut self) {
        if let Some(signer) = self.signer.as_mut() {
            signer.stop();
        }
    }

    #[must_use]
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            id: self.id,
            role: self.role,
            index: self.index,
            signer: self
                .signer
                .as_ref()
                .map(|signer| signer.endpoint().display().to_string()),
        }
    }
}

/// Copyable view of a [`ClusterNode`] handed out by accessors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeHandle {
    pub id: NodeId,
    pub role: NodeRole,
    pub index: usize,
    pub signer: Option<String>,
}
