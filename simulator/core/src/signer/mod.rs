mod client;

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use client::{SignerClient, SignerClientError};
use les_simulator_config::{
    chain::Address,
    constants::{DEFAULT_ACCOUNT_PASSWORD, DEFAULT_SIGNER_MASTER_SEED},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader},
    net::{UnixListener, UnixStream},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

pub const SOCKET_FILE: &str = "signer.ipc";
const CREDENTIALS_FILE: &str = "credentials.json";
const RULES_FILE: &str = "rules.js";

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("no directory specified")]
    NoDirectory,
    #[error("no keystore specified")]
    NoKeystore,
    #[error("failed to prepare signer storage at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read keystore {}: {source}", path.display())]
    Keystore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open endpoint {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings for one signing daemon.
#[derive(Clone, Debug, Default)]
pub struct SignerConfig {
    pub dir: PathBuf,
    pub keystore: PathBuf,
    pub chain_id: u64,
    /// Seed for the vault location. Defaults to `"foobar"`.
    pub master_seed: Option<String>,
    /// Rule script stored alongside the credentials.
    pub rules: Option<String>,
    /// Accounts to unlock with their passwords. Empty passwords use the
    /// default.
    pub accounts: BTreeMap<Address, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Option<LookupParams>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LookupParams {
    pub address: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Account entry as served over the endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub address: Address,
    pub url: String,
}

#[derive(Deserialize)]
struct KeyFile {
    address: Address,
}

/// Directory holding the daemon's credentials, derived from the master seed.
#[must_use]
pub fn vault_location(dir: &Path, master_seed: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(b"vault");
    hasher.update(master_seed.as_bytes());
    let digest = hasher.finalize();
    dir.join(hex::encode(&digest[..10]))
}

fn load_keystore(path: &Path) -> Result<BTreeMap<Address, PathBuf>, SignerError> {
    let entries = fs::read_dir(path).map_err(|source| SignerError::Keystore {
        path: path.to_path_buf(),
        source,
    })?;
    let mut accounts = BTreeMap::new();
    for entry in entries.filter_map(Result::ok) {
        let file = entry.path();
        if !file.is_file() {
            continue;
        }
        let parsed = fs::read(&file)
            .ok()
            .and_then(|raw| serde_json::from_slice::<KeyFile>(&raw).ok());
        match parsed {
            Some(key) => {
                accounts.insert(key.address, file);
            }
            None => debug!(file = %file.display(), "skipping non-key file in keystore"),
        }
    }
    Ok(accounts)
}

/// Account-listing signing daemon serving a line-delimited JSON protocol on
/// a Unix socket.
pub struct SignerDaemon {
    endpoint: PathBuf,
    vault: PathBuf,
    accounts: Arc<BTreeMap<Address, PathBuf>>,
    task: Option<JoinHandle<()>>,
}

impl SignerDaemon {
    pub async fn spawn(config: SignerConfig) -> Result<Self, SignerError> {
        if config.dir.as_os_str().is_empty() {
            return Err(SignerError::NoDirectory);
        }
        if config.keystore.as_os_str().is_empty() {
            return Err(SignerError::NoKeystore);
        }

        let seed = config
            .master_seed
            .as_deref()
            .unwrap_or(DEFAULT_SIGNER_MASTER_SEED);
        let vault = vault_location(&config.dir, seed);
        let storage_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| SignerError::Storage { path, source }
        };
        fs::create_dir_all(&vault).map_err(storage_err(&vault))?;

        let credentials: BTreeMap<String, String> = config
            .accounts
            .iter()
            .map(|(address, password)| {
                let password = if password.is_empty() {
                    DEFAULT_ACCOUNT_PASSWORD.to_owned()
                } else {
                    password.clone()
                };
                (address.to_string(), password)
            })
            .collect();
        let credentials_path = vault.join(CREDENTIALS_FILE);
        let encoded = serde_json::to_vec_pretty(&credentials)
            .map_err(io::Error::other)
            .map_err(storage_err(&credentials_path))?;
        fs::write(&credentials_path, encoded).map_err(storage_err(&credentials_path))?;

        if let Some(rules) = config.rules.as_deref().filter(|rules| !rules.is_empty()) {
            let rules_path = vault.join(RULES_FILE);
            fs::write(&rules_path, rules).map_err(storage_err(&rules_path))?;
        }

        let accounts = Arc::new(load_keystore(&config.keystore)?);

        let endpoint = config.dir.join(SOCKET_FILE);
        if endpoint.exists() {
            fs::remove_file(&endpoint).map_err(storage_err(&endpoint))?;
        }
        let listener = UnixListener::bind(&endpoint).map_err(|source| SignerError::Bind {
            path: endpoint.clone(),
            source,
        })?;

        info!(
            url = %endpoint.display(),
            accounts = accounts.len(),
            chain_id = config.chain_id,
            "signer endpoint opened"
        );
        let task = tokio::spawn(serve(listener, Arc::clone(&accounts)));

        Ok(Self {
            endpoint,
            vault,
            accounts,
            task: Some(task),
        })
    }

    /// Socket path clients connect to.
    #[must_use]
    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }

    #[must_use]
    pub fn vault(&self) -> &Path {
        &self.vault
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.accounts.keys()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Close the endpoint. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(error) = fs::remove_file(&self.endpoint) {
                debug!(url = %self.endpoint.display(), %error, "failed to remove signer socket");
            }
            info!(url = %self.endpoint.display(), "signer endpoint closed");
        }
    }
}

impl Drop for SignerDaemon {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn serve(listener: UnixListener, accounts: Arc<BTreeMap<Address, PathBuf>>) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    connections.spawn(handle_connection(stream, Arc::clone(&accounts)));
                }
                Err(error) => {
                    warn!(%error, "signer accept failed");
                    return;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn handle_connection(stream: UnixStream, accounts: Arc<BTreeMap<Address, PathBuf>>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(request, &accounts),
            Err(error) => Response {
                id: 0,
                result: None,
                error: Some(format!("invalid request: {error}")),
            },
        };
        let Ok(mut encoded) = serde_json::to_vec(&response) else {
            return;
        };
        encoded.push(b'\n');
        if write.write_all(&encoded).await.is_err() {
            return;
        }
    }
}

fn dispatch(request: Request, accounts: &BTreeMap<Address, PathBuf>) -> Response {
    let entry = |address: &Address, file: &PathBuf| AccountEntry {
        address: *address,
        url: format!("keystore://{}", file.display()),
    };
    let outcome = match request.method.as_str() {
        "account_list" => {
            let list: BTreeSet<Address> = accounts.keys().copied().collect();
            serde_json::to_value(list).map_err(|err| err.to_string())
        }
        "account_lookup" => match request.params {
            Some(LookupParams { address }) => accounts
                .get(&address)
                .ok_or_else(|| format!("unknown account {address}"))
                .and_then(|file| {
                    serde_json::to_value(entry(&address, file)).map_err(|err| err.to_string())
                }),
            None => Err("missing address".to_owned()),
        },
        other => Err(format!("method {other} not found")),
    };
    match outcome {
        Ok(result) => Response {
            id: request.id,
            result: Some(result),
            error: None,
        },
        Err(error) => Response {
            id: request.id,
            result: None,
            error: Some(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNING_RULES: &str = r#"
function ApproveListing(req) {
    return "Approve"
}

function ApproveSignData(r) {
    return "Approve"
}
"#;

    fn write_key(keystore: &Path, seed: &str) -> Address {
        let address = Address::from_seed(seed);
        let body = serde_json::json!({ "address": hex::encode(address.0), "version": 3 });
        fs::write(
            keystore.join(format!("UTC--{seed}")),
            serde_json::to_vec(&body).unwrap(),
        )
        .unwrap();
        address
    }

    #[tokio::test]
    async fn lookup_finds_keystore_accounts_only() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = tempfile::tempdir().unwrap();
        let first = write_key(keystore.path(), "account-0");
        let second = write_key(keystore.path(), "account-1");
        fs::write(keystore.path().join("README"), "not a key").unwrap();

        let mut daemon = SignerDaemon::spawn(SignerConfig {
            dir: dir.path().to_path_buf(),
            keystore: keystore.path().to_path_buf(),
            chain_id: 1337,
            rules: Some(SIGNING_RULES.to_owned()),
            accounts: BTreeMap::from([(first, String::new())]),
            ..SignerConfig::default()
        })
        .await
        .unwrap();

        assert_eq!(daemon.endpoint(), dir.path().join(SOCKET_FILE));
        let vault = vault_location(dir.path(), DEFAULT_SIGNER_MASTER_SEED);
        assert_eq!(daemon.vault(), vault);
        let credentials: BTreeMap<String, String> =
            serde_json::from_slice(&fs::read(vault.join(CREDENTIALS_FILE)).unwrap()).unwrap();
        assert_eq!(
            credentials.get(&first.to_string()).map(String::as_str),
            Some(DEFAULT_ACCOUNT_PASSWORD)
        );
        assert!(vault.join(RULES_FILE).is_file());

        let mut client = SignerClient::connect(daemon.endpoint()).await.unwrap();
        let listed = client.list_accounts().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&first) && listed.contains(&second));

        assert_eq!(client.lookup(first).await.unwrap().address, first);
        let err = client
            .lookup(Address::from_seed("deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(err, SignerClientError::Remote { .. }));

        daemon.stop();
        assert!(!daemon.endpoint().exists());
        assert!(!daemon.is_running());
    }

    #[tokio::test]
    async fn missing_directory_or_keystore_is_rejected() {
        let err = SignerDaemon::spawn(SignerConfig::default()).await.err().unwrap();
        assert!(matches!(err, SignerError::NoDirectory));

        let dir = tempfile::tempdir().unwrap();
        let err = SignerDaemon::spawn(SignerConfig {
            dir: dir.path().to_path_buf(),
            ..SignerConfig::default()
        })
        .await
        .err()
        .unwrap();
        assert!(matches!(err, SignerError::NoKeystore));
    }

    #[test]
    fn vault_location_depends_on_seed() {
        let dir = Path::new("/tmp/signer");
        assert_ne!(vault_location(dir, "a"), vault_location(dir, "b"));
        assert_eq!(
            vault_location(dir, "a")
                .file_name()
                .unwrap()
                .to_string_lossy()
                .len(),
            20
        );
    }
}
