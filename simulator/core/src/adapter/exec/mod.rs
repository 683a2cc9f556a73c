pub mod api;
pub mod binary;
pub mod client;
pub mod process;

use std::{
    fs,
    net::{Ipv4Addr, SocketAddr, TcpListener},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use les_simulator_config::{IS_DEBUG_TRACING, chain::BlockchainConfig, timeouts};
use les_simulator_env as sim_env;
use tempfile::TempDir;
use tokio::time;
use tracing::{debug, info, warn};

pub use self::{
    api::ExecNodeConfig,
    binary::resolve_node_binary,
    client::NodeApiClient,
    process::{NodeProcess, create_tempdir, persist_tempdir, should_persist_tempdir},
};
use super::{AdapterError, AdapterNode, NodeAdapter, NodeConfig, NodeId, PeerInfo};
use crate::services::{ServiceInfo, ServiceSpec, Services};

/// Working directory shared by the adapter and all of its nodes. Removed
/// once the last of them is dropped, unless marked for persistence.
struct ExecWorkdir {
    dir: Mutex<Option<TempDir>>,
    root: PathBuf,
    chain_path: Mutex<Option<PathBuf>>,
    persist: AtomicBool,
}

impl ExecWorkdir {
    fn chain_file(&self, chain: &BlockchainConfig) -> Result<PathBuf, AdapterError> {
        let mut guard = self
            .chain_path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(path) = guard.as_ref() {
            return Ok(path.clone());
        }
        let path = self.root.join(api::CHAIN_FILE);
        let encoded =
            serde_json::to_vec(chain).map_err(|source| AdapterError::EncodeChain { source })?;
        fs::write(&path, encoded).map_err(|source| AdapterError::WriteFile {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "wrote chain snapshot");
        *guard = Some(path.clone());
        Ok(path)
    }
}

impl Drop for ExecWorkdir {
    fn drop(&mut self) {
        if self.persist.load(Ordering::Relaxed) || should_persist_tempdir() {
            let mut dir = self
                .dir
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            let _ = persist_tempdir(&mut dir, "les-sim-exec");
        }
    }
}

/// Runs every node as a separate `les-sim-node` process.
pub struct ExecAdapter {
    services: Services,
    binary: PathBuf,
    workdir: Arc<ExecWorkdir>,
}

impl ExecAdapter {
    pub fn new(services: Services) -> Result<Self, AdapterError> {
        Self::with_binary(services, resolve_node_binary())
    }

    pub fn with_binary(services: Services, binary: PathBuf) -> Result<Self, AdapterError> {
        let dir = create_tempdir("les-sim-exec").map_err(|source| AdapterError::TempDir { source })?;
        let root = dir.path().to_path_buf();
        debug!(dir = %root.display(), binary = %binary.display(), "created exec adapter");
        Ok(Self {
            services,
            binary,
            workdir: Arc::new(ExecWorkdir {
                dir: Mutex::new(Some(dir)),
                root,
                chain_path: Mutex::new(None),
                persist: AtomicBool::new(false),
            }),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.workdir.root
    }
}

impl NodeAdapter for ExecAdapter {
    fn name(&self) -> &'static str {
        "exec"
    }

    fn new_node(&self, config: NodeConfig) -> Result<Box<dyn AdapterNode>, AdapterError> {
        let factory = self
            .services
            .get(&config.service)
            .ok_or_else(|| AdapterError::UnknownService {
                service: config.service.clone(),
            })?;
        let chain_path = self.workdir.chain_file(factory.chain())?;

        let dir = self
            .workdir
            .root
            .join(format!("{}-{}", config.name, config.id.short()));
        fs::create_dir_all(&dir).map_err(|source| AdapterError::WriteFile {
            path: dir.clone(),
            source,
        })?;

        debug!(node = %config.name, dir = %dir.display(), "created exec node");
        Ok(Box::new(ExecNode {
            spec: factory.spec(),
            config,
            dir,
            chain_path,
            binary: self.binary.clone(),
            workdir: Arc::clone(&self.workdir),
            process: None,
        }))
    }
}

/// Node hosted by a child process and driven over its HTTP control API.
pub struct ExecNode {
    config: NodeConfig,
    spec: ServiceSpec,
    dir: PathBuf,
    chain_path: PathBuf,
    binary: PathBuf,
    workdir: Arc<ExecWorkdir>,
    process: Option<NodeProcess>,
}

const DEBUG_LOG_FILE: &str = "node.log";
const DEBUG_VERBOSITY: &str = "debug";

#[derive(Debug, PartialEq, Eq)]
struct NodeLogging {
    file: Option<PathBuf>,
    verbosity: Option<String>,
}

impl NodeLogging {
    /// Node settings win over the environment. With debug tracing on, nodes
    /// without any setting log at debug level into their own directory.
    fn resolve(
        config: &NodeConfig,
        node_dir: &Path,
        log_dir: Option<PathBuf>,
        log_level: Option<String>,
        debug_tracing: bool,
    ) -> Self {
        let file = config
            .log_file
            .clone()
            .or_else(|| log_dir.map(|dir| dir.join(format!("{}.log", config.name))))
            .or_else(|| debug_tracing.then(|| node_dir.join(DEBUG_LOG_FILE)));
        let verbosity = config
            .log_verbosity
            .clone()
            .or(log_level)
            .or_else(|| debug_tracing.then(|| DEBUG_VERBOSITY.to_owned()));
        Self { file, verbosity }
    }
}

fn allocate_api_addr() -> Result<SocketAddr, AdapterError> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|listener| listener.local_addr())
        .map_err(|source| AdapterError::PortAllocation { source })
}

impl ExecNode {
    fn launch_config(&self, api_addr: SocketAddr) -> ExecNodeConfig {
        let logging = NodeLogging::resolve(
            &self.config,
            &self.dir,
            sim_env::les_sim_log_dir(),
            sim_env::les_sim_log_level(),
            *IS_DEBUG_TRACING,
        );
        ExecNodeConfig {
            id: self.config.id,
            name: self.config.name.clone(),
            spec: self.spec.clone(),
            chain_path: self.chain_path.clone(),
            api_addr,
            log_file: logging.file,
            log_verbosity: logging.verbosity,
            external_signer: self.config.external_signer.clone(),
        }
    }

    fn write_launch_config(&self, launch: &ExecNodeConfig) -> Result<PathBuf, AdapterError> {
        let path = self.dir.join(api::NODE_CONFIG_FILE);
        let yaml =
            serde_yaml::to_string(launch).map_err(|source| AdapterError::EncodeConfig { source })?;
        fs::write(&path, yaml).map_err(|source| AdapterError::WriteFile {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn running(&self) -> Result<&NodeProcess, AdapterError> {
        self.process.as_ref().ok_or_else(|| AdapterError::NotRunning {
            node: self.config.name.clone(),
        })
    }
}

#[async_trait]
impl AdapterNode for ExecNode {
    fn config(&self) -> &NodeConfig {
        &self.config
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        if self.process.is_some() {
            return Err(AdapterError::AlreadyRunning {
                node: self.config.name.clone(),
            });
        }

        let api_addr = allocate_api_addr()?;
        let launch = self.launch_config(api_addr);
        let config_path = self.write_launch_config(&launch)?;

        let api = NodeApiClient::new(self.config.name.clone(), api_addr);
        let mut process = NodeProcess::spawn(&self.binary, &config_path, &self.dir, api).map_err(
            |source| AdapterError::Spawn {
                binary: self.binary.clone(),
                source,
            },
        )?;

        let ready = time::timeout(timeouts::node_startup_timeout(), async {
            loop {
                if !process.is_running() {
                    return false;
                }
                if process.api().info().await.is_ok() {
                    return true;
                }
                time::sleep(timeouts::STARTUP_POLL_INTERVAL).await;
            }
        })
        .await;

        match ready {
            Ok(true) => {}
            Ok(false) => {
                self.workdir.persist.store(true, Ordering::Relaxed);
                return Err(AdapterError::Exited {
                    node: self.config.name.clone(),
                });
            }
            Err(source) => {
                self.workdir.persist.store(true, Ordering::Relaxed);
                process.kill();
                return Err(AdapterError::Readiness {
                    node: self.config.name.clone(),
                    source,
                });
            }
        }

        info!(node = %self.config.name, addr = %api_addr, "exec node ready");
        self.process = Some(process);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AdapterError> {
        let Some(mut process) = self.process.take() else {
            return Err(AdapterError::NotRunning {
                node: self.config.name.clone(),
            });
        };

        if let Err(error) = process.api().shutdown().await {
            warn!(node = %self.config.name, %error, "shutdown request failed");
        }
        if !process.wait_for_exit(timeouts::node_stop_timeout()).await {
            warn!(node = %self.config.name, "node did not exit in time, killing");
            process.kill();
        }
        debug!(node = %self.config.name, "exec node stopped");
        Ok(())
    }

    async fn connect(&mut self, peer: &PeerInfo) -> Result<(), AdapterError> {
        self.running()?.api().add_peer(peer).await
    }

    async fn disconnect(&mut self, peer: &NodeId) -> Result<(), AdapterError> {
        self.running()?.api().remove_peer(peer).await
    }

    async fn info(&self) -> Result<ServiceInfo, AdapterError> {
        self.running()?.api().info().await
    }
}

#[cfg(test)]
mod tests {
    use les_simulator_config::{
        cluster::ClusterConfig,
        services::{NodeRole, ServerServiceConfig},
    };

    use super::*;
    use crate::chain::BootstrapChain;

    fn services() -> Services {
        let chain = BootstrapChain::generate(&ClusterConfig::with_node_counts(0, 1).with_blocks(2))
            .unwrap()
            .blockchain;
        let mut services = Services::default();
        services
            .register(
                "les-server-0",
                ServiceSpec::Server {
                    config: ServerServiceConfig::default(),
                    mining: true,
                }
                .into_factory(chain),
            )
            .unwrap();
        services
    }

    #[test]
    fn new_node_writes_shared_chain_snapshot_once() {
        let adapter = ExecAdapter::with_binary(services(), PathBuf::from("/nonexistent")).unwrap();
        let a = adapter
            .new_node(NodeConfig::random("les-server-0", NodeRole::Server))
            .unwrap();
        let b = adapter
            .new_node(NodeConfig::random("les-server-0", NodeRole::Server))
            .unwrap();
        assert_ne!(a.id(), b.id());

        let snapshot = fs::read(adapter.root().join(api::CHAIN_FILE)).unwrap();
        let chain: BlockchainConfig = serde_json::from_slice(&snapshot).unwrap();
        assert_eq!(chain.chain.len(), 2);
    }

    #[test]
    fn node_logging_prefers_node_settings() {
        let config = NodeConfig::random("les-server-0", NodeRole::Server)
            .with_log_file(Some(PathBuf::from("/var/log/s0.log")))
            .with_log_verbosity(Some("trace".to_owned()));
        let logging = NodeLogging::resolve(
            &config,
            Path::new("/tmp/node"),
            Some(PathBuf::from("/logs")),
            Some("info".to_owned()),
            true,
        );
        assert_eq!(logging.file, Some(PathBuf::from("/var/log/s0.log")));
        assert_eq!(logging.verbosity.as_deref(), Some("trace"));
    }

    #[test]
    fn debug_tracing_logs_into_node_dir() {
        let config = NodeConfig::random("les-server-0", NodeRole::Server);
        let dir = Path::new("/tmp/node");

        let quiet = NodeLogging::resolve(&config, dir, None, None, false);
        assert_eq!(quiet, NodeLogging { file: None, verbosity: None });

        let debug = NodeLogging::resolve(&config, dir, None, None, true);
        assert_eq!(debug.file, Some(dir.join(DEBUG_LOG_FILE)));
        assert_eq!(debug.verbosity.as_deref(), Some(DEBUG_VERBOSITY));

        let shared = NodeLogging::resolve(&config, dir, Some(PathBuf::from("/logs")), None, true);
        assert_eq!(shared.file, Some(PathBuf::from("/logs/les-server-0.log")));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let adapter = ExecAdapter::with_binary(services(), PathBuf::from("/nonexistent/les-sim-node"))
            .unwrap();
        let mut node = adapter
            .new_node(NodeConfig::random("les-server-0", NodeRole::Server))
            .unwrap();
        let err = node.start().await.unwrap_err();
        assert!(matches!(err, AdapterError::Spawn { .. }));

        let written = fs::read_dir(adapter.root())
            .unwrap()
            .filter_map(Result::ok)
            .any(|entry| entry.path().join(api::NODE_CONFIG_FILE).is_file());
        assert!(written);
    }
}
