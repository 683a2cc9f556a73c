use les_simulator_config::cluster::Conn;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid client index {index} in {conn} (clients: {count})")]
    InvalidClientIndex {
        conn: Conn,
        index: usize,
        count: usize,
    },
    #[error("invalid server index {index} in {conn} (servers: {count})")]
    InvalidServerIndex {
        conn: Conn,
        index: usize,
        count: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `from` indexes clients, `to` servers.
    ClientServer,
    /// Both ends index servers, `from < to`.
    ServerServer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub from: usize,
    pub to: usize,
}

impl Edge {
    #[must_use]
    pub const fn client_server(client: usize, server: usize) -> Self {
        Self {
            kind: EdgeKind::ClientServer,
            from: client,
            to: server,
        }
    }

    #[must_use]
    pub const fn server_server(a: usize, b: usize) -> Self {
        Self {
            kind: EdgeKind::ServerServer,
            from: a,
            to: b,
        }
    }
}

/// Ordered list of links a connect or disconnect walks through: the
/// client/server part first, then the full server mesh.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionPlan {
    edges: Vec<Edge>,
}

impl ConnectionPlan {
    /// Build the plan for `clients` x `servers` nodes.
    ///
    /// `None` plans every client against every server in client-major order.
    /// An explicit list is validated as a whole before anything is returned.
    pub fn resolve(
        conns: Option<&[Conn]>,
        clients: usize,
        servers: usize,
    ) -> Result<Self, PlanError> {
        let mut edges = Vec::new();

        match conns {
            None => {
                for client in 0..clients {
                    for server in 0..servers {
                        edges.push(Edge::client_server(client, server));
                    }
                }
            }
            Some(conns) => {
                for conn in conns {
                    if conn.from >= clients {
                        return Err(PlanError::InvalidClientIndex {
                            conn: *conn,
                            index: conn.from,
                            count: clients,
                        });
                    }
                    if conn.to >= servers {
                        return Err(PlanError::InvalidServerIndex {
                            conn: *conn,
                            index: conn.to,
                            count: servers,
                        });
                    }
                    edges.push(Edge::client_server(conn.from, conn.to));
                }
            }
        }

        for a in 0..servers {
            for b in (a + 1)..servers {
                edges.push(Edge::server_server(a, b));
            }
        }

        Ok(Self { edges })
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl IntoIterator for ConnectionPlan {
    type Item = Edge;
    type IntoIter = std::vec::IntoIter<Edge>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.into_iter()
    }
}
