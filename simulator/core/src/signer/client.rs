use std::{io, path::Path};

use les_simulator_config::chain::Address;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines},
    net::{
        UnixStream,
        unix::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use super::{AccountEntry, LookupParams, Response};

#[derive(Debug, Error)]
pub enum SignerClientError {
    #[error("signer connection failed: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
    #[error("malformed signer message: {source}")]
    Codec {
        #[source]
        source: serde_json::Error,
    },
    #[error("signer closed the connection")]
    Closed,
    #[error("signer rejected request: {message}")]
    Remote { message: String },
}

/// Connection to a [`super::SignerDaemon`] endpoint.
pub struct SignerClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
    next_id: u64,
}

impl SignerClient {
    pub async fn connect(endpoint: &Path) -> Result<Self, SignerClientError> {
        let stream = UnixStream::connect(endpoint)
            .await
            .map_err(|source| SignerClientError::Io { source })?;
        let (read, write) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read).lines(),
            write,
            next_id: 1,
        })
    }

    pub async fn list_accounts(&mut self) -> Result<Vec<Address>, SignerClientError> {
        self.call("account_list", None).await
    }

    pub async fn lookup(&mut self, address: Address) -> Result<AccountEntry, SignerClientError> {
        self.call("account_lookup", Some(LookupParams { address }))
            .await
    }

    async fn call<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<LookupParams>,
    ) -> Result<T, SignerClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = serde_json::json!({ "id": id, "method": method, "params": params });
        let mut encoded =
            serde_json::to_vec(&request).map_err(|source| SignerClientError::Codec { source })?;
        encoded.push(b'\n');
        self.write
            .write_all(&encoded)
            .await
            .map_err(|source| SignerClientError::Io { source })?;

        let line = self
            .lines
            .next_line()
            .await
            .map_err(|source| SignerClientError::Io { source })?
            .ok_or(SignerClientError::Closed)?;
        let response: Response =
            serde_json::from_str(&line).map_err(|source| SignerClientError::Codec { source })?;
        if let Some(message) = response.error {
            return Err(SignerClientError::Remote { message });
        }
        serde_json::from_value(response.result.unwrap_or_default())
            .map_err(|source| SignerClientError::Codec { source })
    }
}
