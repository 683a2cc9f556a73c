use serde::{Deserialize, Serialize};

use crate::adapter::NodeId;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle and topology changes published by the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkEvent {
    NodeUp { id: NodeId },
    NodeDown { id: NodeId },
    ConnUp { one: NodeId, other: NodeId },
    ConnDown { one: NodeId, other: NodeId },
}
