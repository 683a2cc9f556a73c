use std::{net::SocketAddr, process};

use clap::Parser;
use les_simulator_config::{
    constants::DEFAULT_CHAIN_ID,
    services::{ClientServiceConfig, ServerServiceConfig},
};
use les_simulator_core::{AdapterKind, ClusterConfig};
use les_simulator_demos::{
    defaults::{DEFAULT_BLOCKS, DEFAULT_LISTEN_ADDR, init_tracing},
    apply_routes, read_env_any, run_cluster_demo,
};
use tracing::error;

#[derive(Parser, Debug)]
#[command(about = "Run an n-to-n LES cluster and serve it over HTTP")]
struct Args {
    /// Number of LES servers to create.
    #[arg(long, default_value_t = 10)]
    servers: usize,
    /// Number of LES clients to create.
    #[arg(long, default_value_t = 10)]
    clients: usize,
    /// Topology, comma separated (e.g. `c1->s2,c2->s1,c3->*,*->s4`).
    #[arg(long, default_value = "")]
    routes: String,
    #[arg(long, default_value = "sim")]
    adapter: AdapterKind,
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,
    /// Log filter, overrides `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    if args.servers == 0 && args.clients == 0 {
        error!("invalid network topology setting: no nodes requested");
        process::exit(1);
    }

    let config = ClusterConfig::with_node_counts(args.clients, args.servers)
        .with_adapter(args.adapter)
        .with_chain_id(DEFAULT_CHAIN_ID)
        .with_client_configs(vec![ClientServiceConfig::default(); args.clients])
        .with_server_configs(vec![ServerServiceConfig::default(); args.servers])
        .with_blocks(read_env_any(&["LES_SIM_DEMO_BLOCKS"], DEFAULT_BLOCKS))
        .with_payment_contract(true)
        .with_oracle_contract(true);
    let config = apply_routes(config, &args.routes);

    if let Err(err) = run_cluster_demo(config, args.listen).await {
        error!("n2n demo failed: {err:#}");
        process::exit(1);
    }
}
