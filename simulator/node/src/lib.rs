pub mod logging;
pub mod server;
pub mod state;

pub use server::{node_app, serve};
pub use state::{NodeError, NodeState, load_chain, load_node_config};
