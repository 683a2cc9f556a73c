use std::net::SocketAddr;

use reqwest::{Client, Response};
use serde::Serialize;

use super::api::{self, ErrorResponse, RemovePeerRequest};
use crate::{
    adapter::{AdapterError, NodeId, PeerInfo},
    services::ServiceInfo,
};

/// Thin async client for the `les-sim-node` control API.
#[derive(Clone)]
pub struct NodeApiClient {
    node: String,
    base_url: String,
    client: Client,
}

impl NodeApiClient {
    #[must_use]
    pub fn new(node: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            node: node.into(),
            base_url: format!("http://{addr}"),
            client: Client::new(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn join(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request_err(&self, source: reqwest::Error) -> AdapterError {
        AdapterError::Request {
            node: self.node.clone(),
            source,
        }
    }

    pub async fn info(&self) -> Result<ServiceInfo, AdapterError> {
        let response = self
            .client
            .get(self.join(api::INFO))
            .send()
            .await
            .map_err(|source| self.request_err(source))?;
        self.checked(response)
            .await?
            .json()
            .await
            .map_err(|source| self.request_err(source))
    }

    pub async fn add_peer(&self, peer: &PeerInfo) -> Result<(), AdapterError> {
        self.post_unit(api::PEERS_ADD, peer).await
    }

    pub async fn remove_peer(&self, peer: &NodeId) -> Result<(), AdapterError> {
        self.post_unit(api::PEERS_REMOVE, &RemovePeerRequest { id: *peer })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), AdapterError> {
        self.post_unit(api::SHUTDOWN, &()).await
    }

    async fn post_unit<T>(&self, path: &str, body: &T) -> Result<(), AdapterError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let response = self
            .client
            .post(self.join(path))
            .json(body)
            .send()
            .await
            .map_err(|source| self.request_err(source))?;
        self.checked(response).await?;
        Ok(())
    }

    /// Turn a non-success response into [`AdapterError::Rejected`] carrying
    /// the node's error message.
    async fn checked(&self, response: Response) -> Result<Response, AdapterError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        Err(AdapterError::Rejected {
            node: self.node.clone(),
            message,
        })
    }
}
