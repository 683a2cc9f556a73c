use std::{net::SocketAddr, process};

use clap::Parser;
use les_simulator_config::{
    constants::DEFAULT_CHAIN_ID,
    services::{ClientServiceConfig, ServerServiceConfig},
};
use les_simulator_core::ClusterConfig;
use les_simulator_demos::{
    defaults::{DEFAULT_BLOCKS, DEFAULT_LISTEN_ADDR, init_tracing},
    run_cluster_demo,
};
use tracing::error;

#[derive(Parser, Debug)]
#[command(about = "Run one LES server and one LES client")]
struct Args {
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let config = ClusterConfig::with_node_counts(1, 1)
        .with_chain_id(DEFAULT_CHAIN_ID)
        .with_client_configs(vec![ClientServiceConfig::default()])
        .with_server_configs(vec![ServerServiceConfig::default()])
        .with_blocks(DEFAULT_BLOCKS)
        .with_payment_contract(true)
        .with_oracle_contract(true);

    if let Err(err) = run_cluster_demo(config, args.listen).await {
        error!("les example failed: {err:#}");
        process::exit(1);
    }
}
