use std::{env, path::PathBuf};

use les_simulator_env as sim_env;
use tracing::{debug, info};

pub const NODE_BINARY_NAME: &str = "les-sim-node";
const FALLBACK_PATH: &str = "target/debug/les-sim-node";

/// Locate the `les-sim-node` binary: explicit override, then `PATH`, then the
/// workspace build output.
#[must_use]
pub fn resolve_node_binary() -> PathBuf {
    if let Some(path) = sim_env::les_sim_node_bin() {
        info!(
            env = "LES_SIM_NODE_BIN",
            binary = NODE_BINARY_NAME,
            path = %path.display(),
            "resolved binary from env override"
        );
        return path;
    }
    if let Some(path) = which_on_path(NODE_BINARY_NAME) {
        info!(
            binary = NODE_BINARY_NAME,
            path = %path.display(),
            "resolved binary from PATH"
        );
        return path;
    }
    let fallback = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../")
        .join(FALLBACK_PATH);

    debug!(
        binary = NODE_BINARY_NAME,
        path = %fallback.display(),
        "falling back to binary path"
    );
    fallback
}

fn which_on_path(bin: &str) -> Option<PathBuf> {
    let path_env = env::var_os("PATH")?;
    env::split_paths(&path_env)
        .map(|p| p.join(bin))
        .find(|candidate| candidate.is_file())
}
