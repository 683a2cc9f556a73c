use std::{env, path::PathBuf};

#[must_use]
pub fn slow_test_env() -> bool {
    env::var("SLOW_TEST_ENV").is_ok_and(|s| s == "true")
}

#[must_use]
pub fn debug_tracing() -> bool {
    env::var("LES_SIM_TESTS_TRACING").is_ok_and(|val| val.eq_ignore_ascii_case("true"))
}

/// Explicit path to the `les-sim-node` binary used by the exec adapter.
#[must_use]
pub fn les_sim_node_bin() -> Option<PathBuf> {
    env::var_os("LES_SIM_NODE_BIN").map(PathBuf::from)
}

#[must_use]
pub fn les_sim_log_dir() -> Option<PathBuf> {
    env::var("LES_SIM_LOG_DIR").ok().map(PathBuf::from)
}

#[must_use]
pub fn les_sim_log_level() -> Option<String> {
    env::var("LES_SIM_LOG_LEVEL").ok()
}

#[must_use]
pub fn les_sim_tests_keep_logs() -> bool {
    env::var("LES_SIM_TESTS_KEEP_LOGS").is_ok()
}

#[must_use]
pub fn les_sim_block_period_ms() -> Option<u64> {
    env::var("LES_SIM_BLOCK_PERIOD_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
}

#[must_use]
pub fn les_sim_startup_timeout_secs() -> Option<u64> {
    env::var("LES_SIM_STARTUP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
}
