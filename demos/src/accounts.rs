use std::{
    fs, io,
    path::{Path, PathBuf},
};

use les_simulator_config::chain::Address;
use rand::{Rng as _, thread_rng};
use serde::Serialize;
use tempfile::TempDir;
use tracing::debug;

/// Minimal key file: the signer only reads the `address` field.
#[derive(Serialize)]
struct KeyFile {
    address: String,
    version: u32,
}

/// Write `count` random accounts as key files into `dir`.
pub fn store_accounts(dir: &Path, count: usize) -> io::Result<Vec<Address>> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 20];
            rng.fill(&mut bytes);
            let address = Address(bytes);

            let path = dir.join(format!("UTC--{}", hex::encode(bytes)));
            let body = serde_json::to_vec_pretty(&KeyFile {
                address: hex::encode(bytes),
                version: 3,
            })
            .map_err(io::Error::other)?;
            fs::write(&path, body)?;
            debug!(%address, path = %path.display(), "stored simulation account");
            Ok(address)
        })
        .collect()
}

/// Temporary keystore removed on drop.
pub struct Keystore {
    dir: TempDir,
    pub accounts: Vec<Address>,
}

impl Keystore {
    pub fn create(count: usize) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("simulation-keystore")
            .tempdir()?;
        let accounts = store_accounts(dir.path(), count)?;
        Ok(Self { dir, accounts })
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_accounts_are_readable_key_files() {
        let keystore = Keystore::create(2).unwrap();
        assert_eq!(keystore.accounts.len(), 2);
        assert_ne!(keystore.accounts[0], keystore.accounts[1]);

        let files = fs::read_dir(keystore.path()).unwrap().count();
        assert_eq!(files, 2);
    }
}
