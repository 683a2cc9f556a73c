use std::time::Duration;

use les_simulator_env as sim_env;

use crate::{adjust_timeout, constants::DEFAULT_BLOCK_PERIOD};

pub const NODE_STARTUP_TIMEOUT_SECS: u64 = 60;
pub const NODE_STOP_TIMEOUT_SECS: u64 = 10;
pub const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time an exec node gets to answer its readiness probe.
pub fn node_startup_timeout() -> Duration {
    let secs = sim_env::les_sim_startup_timeout_secs().unwrap_or(NODE_STARTUP_TIMEOUT_SECS);
    adjust_timeout(Duration::from_secs(secs))
}

/// Time an exec node gets to exit after a shutdown request before it is
/// killed.
pub fn node_stop_timeout() -> Duration {
    adjust_timeout(Duration::from_secs(NODE_STOP_TIMEOUT_SECS))
}

/// Interval between blocks produced by the mining server.
pub fn block_period() -> Duration {
    sim_env::les_sim_block_period_ms()
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_BLOCK_PERIOD)
}
