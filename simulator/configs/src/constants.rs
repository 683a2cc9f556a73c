use std::time::Duration;

use num_bigint::BigUint;

/// Chain id used by the bundled demos.
pub const DEFAULT_CHAIN_ID: u64 = 1337;

/// Gas limit of the generated genesis block.
pub const GENESIS_GAS_LIMIT: u64 = 4_700_000;

/// Difficulty of the generated genesis block.
pub const GENESIS_DIFFICULTY: u64 = 5_242_880;

/// Seconds between consecutive bootstrap block timestamps.
pub const BLOCK_TIME_SECS: u64 = 10;

/// Gas price (in gwei) attached to bootstrap contract deployments.
pub const DEPLOY_GAS_PRICE_GWEI: u64 = 2;

/// Checkpoint oracle constructor parameters.
pub const ORACLE_SECTION_SIZE: u64 = 128;
pub const ORACLE_PROCESS_CONFIRMS: u64 = 1;
pub const ORACLE_THRESHOLD: u64 = 1;

/// Seed the deterministic master account is derived from.
pub const MASTER_ACCOUNT_SEED: &str = "les-simulator/master";

/// Service name prefixes registered with the adapter.
pub const SERVER_SERVICE_PREFIX: &str = "les-server";
pub const CLIENT_SERVICE_PREFIX: &str = "les-client";

/// Default serving-capacity budget (percent) of a server.
pub const DEFAULT_LIGHT_SERV: u32 = 100;

/// Default maximum number of light-client peers per server.
pub const DEFAULT_LIGHT_PEERS: usize = 50;

/// Default signing daemon master seed and account password.
pub const DEFAULT_SIGNER_MASTER_SEED: &str = "foobar";
pub const DEFAULT_ACCOUNT_PASSWORD: &str = "foobar";

/// Default interval between produced blocks on the mining server.
pub const DEFAULT_BLOCK_PERIOD: Duration = Duration::from_secs(1);

/// Service name registered for the server at `index`.
#[must_use]
pub fn server_service_name(index: usize) -> String {
    format!("{SERVER_SERVICE_PREFIX}-{index}")
}

/// Service name registered for the client at `index`.
#[must_use]
pub fn client_service_name(index: usize) -> String {
    format!("{CLIENT_SERVICE_PREFIX}-{index}")
}

/// One ether in wei.
#[must_use]
pub fn ether() -> BigUint {
    BigUint::from(10u32).pow(18)
}
