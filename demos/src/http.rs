use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use les_simulator_core::{Cluster, ClusterError};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct LinkSummary {
    live: usize,
}

fn failed(error: &ClusterError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

async fn live_links(cluster: &Cluster) -> LinkSummary {
    let live = cluster
        .snapshot()
        .await
        .conns
        .iter()
        .filter(|conn| conn.up)
        .count();
    LinkSummary { live }
}

async fn nodes(State(cluster): State<Arc<Cluster>>) -> impl IntoResponse {
    Json(cluster.snapshot().await.nodes)
}

async fn conns(State(cluster): State<Arc<Cluster>>) -> impl IntoResponse {
    Json(cluster.snapshot().await.conns)
}

async fn contracts(State(cluster): State<Arc<Cluster>>) -> impl IntoResponse {
    Json(cluster.contracts().clone())
}

async fn connect(State(cluster): State<Arc<Cluster>>) -> Response {
    match cluster.connect().await {
        Ok(()) => Json(live_links(&cluster).await).into_response(),
        Err(error) => {
            warn!(%error, "connect request failed");
            failed(&error)
        }
    }
}

async fn disconnect(State(cluster): State<Arc<Cluster>>) -> Response {
    match cluster.disconnect().await {
        Ok(()) => Json(live_links(&cluster).await).into_response(),
        Err(error) => {
            warn!(%error, "disconnect request failed");
            failed(&error)
        }
    }
}

/// Inspection and topology control routes over a running cluster.
pub fn cluster_app(cluster: Arc<Cluster>) -> Router {
    Router::new()
        .route("/nodes", get(nodes))
        .route("/conns", get(conns))
        .route("/contracts", get(contracts))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .with_state(cluster)
}

/// Serve [`cluster_app`] on `addr` until ctrl-c.
pub async fn serve_cluster(cluster: Arc<Cluster>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "simulation server listening");
    axum::serve(listener, cluster_app(cluster))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
