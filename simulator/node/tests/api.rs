use std::{fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use les_simulator_config::{
    cluster::ClusterConfig,
    services::{NodeRole, ServerServiceConfig},
};
use les_simulator_core::{
    adapter::{
        AdapterError, NodeConfig,
        exec::{ExecNodeConfig, NodeApiClient, api::CHAIN_FILE},
    },
    chain::BootstrapChain,
    services::ServiceSpec,
};
use les_simulator_node::{NodeState, load_node_config, serve};
use tokio::{net::TcpListener, task::JoinHandle, time};

fn write_chain(dir: &Path) -> std::path::PathBuf {
    let bootstrap =
        BootstrapChain::generate(&ClusterConfig::with_node_counts(1, 1).with_blocks(2)).unwrap();
    let path = dir.join(CHAIN_FILE);
    fs::write(&path, serde_json::to_vec(&*bootstrap.blockchain).unwrap()).unwrap();
    path
}

async fn spawn_node(
    dir: &Path,
    config: ServerServiceConfig,
) -> (NodeApiClient, JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let api_addr: SocketAddr = listener.local_addr().unwrap();
    let node = NodeConfig::random("les-server-0", NodeRole::Server);

    let launch = ExecNodeConfig {
        id: node.id,
        name: node.name,
        spec: ServiceSpec::Server {
            config,
            mining: false,
        },
        chain_path: write_chain(dir),
        api_addr,
        log_file: None,
        log_verbosity: None,
        external_signer: None,
    };
    let state: Arc<NodeState> = NodeState::start(launch).await.unwrap();
    let task = tokio::spawn(serve(listener, state));
    (NodeApiClient::new("les-server-0", api_addr), task)
}

#[tokio::test]
async fn control_api_manages_peers_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let (api, task) = spawn_node(dir.path(), ServerServiceConfig::default()).await;

    let info = api.info().await.unwrap();
    assert!(info.running);
    assert_eq!(info.head_number, 2);
    assert!(info.peers.is_empty());

    let client = NodeConfig::random("les-client-0", NodeRole::Client).peer_info();
    api.add_peer(&client).await.unwrap();
    assert_eq!(api.info().await.unwrap().peers.len(), 1);

    let err = api.add_peer(&client).await.unwrap_err();
    assert!(matches!(err, AdapterError::Rejected { .. }));

    api.remove_peer(&client.id).await.unwrap();
    assert!(api.info().await.unwrap().peers.is_empty());

    api.shutdown().await.unwrap();
    time::timeout(Duration::from_secs(5), task)
        .await
        .expect("api server exits after shutdown")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn rejected_peer_carries_service_message() {
    let dir = tempfile::tempdir().unwrap();
    let (api, _task) =
        spawn_node(dir.path(), ServerServiceConfig::default().with_light_serv(0)).await;

    let client = NodeConfig::random("les-client-0", NodeRole::Client).peer_info();
    match api.add_peer(&client).await {
        Err(AdapterError::Rejected { message, .. }) => {
            assert_eq!(message, "light serving is disabled");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn launch_config_round_trips_through_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let launch = ExecNodeConfig {
        id: NodeConfig::random("les-client-0", NodeRole::Client).id,
        name: "les-client-0".to_owned(),
        spec: ServiceSpec::Client {
            config: Default::default(),
        },
        chain_path: dir.path().join(CHAIN_FILE),
        api_addr: "127.0.0.1:4000".parse().unwrap(),
        log_file: Some(dir.path().join("client.log")),
        log_verbosity: Some("debug".to_owned()),
        external_signer: None,
    };
    let path = dir.path().join("node.yaml");
    fs::write(&path, serde_yaml::to_string(&launch).unwrap()).unwrap();

    assert_eq!(load_node_config(&path).unwrap(), launch);
}
