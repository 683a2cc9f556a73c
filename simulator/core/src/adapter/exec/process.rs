use std::{
    io,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    time::Duration,
};

use les_simulator_config::timeouts::EXIT_POLL_INTERVAL;
use les_simulator_env as sim_env;
use tempfile::TempDir;
use tokio::time;
use tracing::{debug, info};

use super::client::NodeApiClient;

/// Whether temp dirs should outlive the adapter for post-mortem inspection.
#[must_use]
pub fn should_persist_tempdir() -> bool {
    sim_env::les_sim_tests_keep_logs()
}

pub fn create_tempdir(prefix: &str) -> io::Result<TempDir> {
    tempfile::Builder::new().prefix(prefix).tempdir()
}

/// Keep `dir` on disk after drop and return its path.
pub fn persist_tempdir(dir: &mut Option<TempDir>, label: &str) -> Option<PathBuf> {
    let path = dir.take()?.keep();
    info!(label, path = %path.display(), "persisted tempdir");
    Some(path)
}

/// A spawned `les-sim-node` process plus its API client.
pub struct NodeProcess {
    child: Child,
    api: NodeApiClient,
}

impl NodeProcess {
    pub fn spawn(
        binary: &Path,
        config_path: &Path,
        workdir: &Path,
        api: NodeApiClient,
    ) -> io::Result<Self> {
        debug!(
            config_file = %config_path.display(),
            binary = %binary.display(),
            "spawning node process"
        );
        let child = Command::new(binary)
            .arg(config_path)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;
        Ok(Self { child, api })
    }

    #[must_use]
    pub const fn api(&self) -> &NodeApiClient {
        &self.api
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Returns true if the process exited within the timeout, false otherwise.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        time::timeout(timeout, async {
            loop {
                if !self.is_running() {
                    return;
                }
                time::sleep(EXIT_POLL_INTERVAL).await;
            }
        })
        .await
        .is_ok()
    }

    pub fn kill(&mut self) {
        debug!("killing node process");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for NodeProcess {
    fn drop(&mut self) {
        if self.is_running() {
            self.kill();
        }
    }
}
