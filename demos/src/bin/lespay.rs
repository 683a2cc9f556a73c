use std::{net::SocketAddr, process};

use anyhow::Context as _;
use clap::Parser;
use les_simulator_config::{
    constants::{DEFAULT_CHAIN_ID, ether},
    services::{ClientServiceConfig, ServerServiceConfig},
};
use les_simulator_core::ClusterConfig;
use les_simulator_demos::{
    accounts::Keystore,
    defaults::{DEFAULT_BLOCKS, DEFAULT_LISTEN_ADDR, init_tracing},
    run_cluster_demo,
};
use tracing::{error, info};

const SERVER_LIGHT_PEERS: usize = 30;

const SIGNING_RULES: &str = r#"
function ApproveListing(req) {
    return "Approve"
}

function ApproveSignData(r) {
    return "Approve"
}

function OnSignerStartup(i) {
    return "Approve"
}
"#;

#[derive(Parser, Debug)]
#[command(about = "Run a paying LES client against a charging server, both behind signers")]
struct Args {
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,
    #[arg(long)]
    log_level: Option<String>,
}

async fn run(listen: SocketAddr) -> anyhow::Result<()> {
    let keystore = Keystore::create(2).context("failed to create simulation keystore")?;
    let (payer, payee) = (keystore.accounts[0], keystore.accounts[1]);
    info!(keystore = %keystore.path().display(), %payer, %payee, "created simulation accounts");

    let config = ClusterConfig::with_node_counts(1, 1)
        .with_chain_id(DEFAULT_CHAIN_ID)
        .with_client_configs(vec![ClientServiceConfig::default().with_payment(payer)])
        .with_server_configs(vec![
            ServerServiceConfig::default()
                .with_charge(payee)
                .with_light_peers(SERVER_LIGHT_PEERS),
        ])
        .with_blocks(DEFAULT_BLOCKS)
        .with_payment_contract(true)
        .with_oracle_contract(true)
        .with_prefund(payer, ether())
        .with_prefund(payee, ether())
        .with_signer(keystore.path(), Some(SIGNING_RULES.to_owned()));

    run_cluster_demo(config, listen).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    if let Err(err) = run(args.listen).await {
        error!("lespay demo failed: {err:#}");
        process::exit(1);
    }
}
