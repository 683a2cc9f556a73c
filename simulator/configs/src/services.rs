use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    chain::Address,
    constants::{DEFAULT_LIGHT_PEERS, DEFAULT_LIGHT_SERV},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Client,
    Server,
}

impl NodeRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Light client service options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientServiceConfig {
    /// Pay servers for service through the payment contract.
    pub service_pay: bool,
    pub payment_address: Option<Address>,
    /// Hex node ids of servers the client trusts for checkpoints.
    pub trusted_servers: Vec<String>,
    /// Percentage of trusted servers that must agree, `0..=100`.
    pub trusted_fraction: u32,
    pub log_file: Option<PathBuf>,
    pub log_verbosity: Option<String>,
}

impl ClientServiceConfig {
    #[must_use]
    pub fn with_payment(mut self, address: Address) -> Self {
        self.service_pay = true;
        self.payment_address = Some(address);
        self
    }

    #[must_use]
    pub fn with_trusted_servers(mut self, servers: Vec<String>, fraction: u32) -> Self {
        self.trusted_servers = servers;
        self.trusted_fraction = fraction;
        self
    }

    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_log_verbosity(mut self, verbosity: impl Into<String>) -> Self {
        self.log_verbosity = Some(verbosity.into());
        self
    }
}

/// Full node service options including the light-serving extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerServiceConfig {
    /// Charge light clients through the payment contract.
    pub service_charge: bool,
    pub payment_address: Option<Address>,
    /// Serving capacity budget in percent. Zero disables light serving.
    pub light_serv: u32,
    /// Maximum number of light client peers.
    pub light_peers: usize,
    pub log_file: Option<PathBuf>,
    pub log_verbosity: Option<String>,
}

impl Default for ServerServiceConfig {
    fn default() -> Self {
        Self {
            service_charge: false,
            payment_address: None,
            light_serv: DEFAULT_LIGHT_SERV,
            light_peers: DEFAULT_LIGHT_PEERS,
            log_file: None,
            log_verbosity: None,
        }
    }
}

impl ServerServiceConfig {
    #[must_use]
    pub const fn with_light_serv(mut self, light_serv: u32) -> Self {
        self.light_serv = light_serv;
        self
    }

    #[must_use]
    pub const fn with_light_peers(mut self, light_peers: usize) -> Self {
        self.light_peers = light_peers;
        self
    }

    #[must_use]
    pub fn with_charge(mut self, address: Address) -> Self {
        self.service_charge = true;
        self.payment_address = Some(address);
        self
    }

    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_log_verbosity(mut self, verbosity: impl Into<String>) -> Self {
        self.log_verbosity = Some(verbosity.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults_survive_partial_yaml() {
        let cfg: ServerServiceConfig = serde_yaml::from_str("light_peers: 3\n").unwrap();
        assert_eq!(cfg.light_peers, 3);
        assert_eq!(cfg.light_serv, DEFAULT_LIGHT_SERV);
        assert!(!cfg.service_charge);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&NodeRole::Server).unwrap(),
            "\"server\""
        );
        assert_eq!(NodeRole::Client.to_string(), "client");
    }
}
