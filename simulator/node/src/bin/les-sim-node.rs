use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use les_simulator_node::{NodeState, load_node_config, logging::init_logging, serve};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "LES simulator node process")]
struct Args {
    /// Launch config written by the exec adapter.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Args::parse();

    let config = load_node_config(&cli.config)
        .with_context(|| format!("failed to load node config from {}", cli.config.display()))?;
    init_logging(config.log_file.as_deref(), config.log_verbosity.as_deref())
        .context("failed to open node log file")?;

    let addr = config.api_addr;
    let state = NodeState::start(config)
        .await
        .context("failed to start node service")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind node api on {addr}"))?;
    info!(node = %state.config.name, %addr, "node api listening");

    serve(listener, state)
        .await
        .context("node api terminated unexpectedly")?;
    Ok(())
}
