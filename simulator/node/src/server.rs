use std::{io, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use les_simulator_core::{
    adapter::{
        PeerInfo,
        exec::api::{self, ErrorResponse, RemovePeerRequest},
    },
    services::ServiceError,
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::state::NodeState;

fn rejected(error: &ServiceError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

async fn info(State(state): State<Arc<NodeState>>) -> impl IntoResponse {
    Json(state.service.lock().await.info())
}

async fn add_peer(State(state): State<Arc<NodeState>>, Json(peer): Json<PeerInfo>) -> Response {
    match state.service.lock().await.add_peer(&peer) {
        Ok(()) => {
            debug!(peer = %peer.name, "peer added");
            StatusCode::OK.into_response()
        }
        Err(error) => rejected(&error),
    }
}

async fn remove_peer(
    State(state): State<Arc<NodeState>>,
    Json(request): Json<RemovePeerRequest>,
) -> Response {
    match state.service.lock().await.remove_peer(&request.id) {
        Ok(()) => {
            debug!(peer = %request.id.short(), "peer removed");
            StatusCode::OK.into_response()
        }
        Err(error) => rejected(&error),
    }
}

async fn shutdown(State(state): State<Arc<NodeState>>) -> StatusCode {
    info!(node = %state.config.name, "shutdown requested");
    state.request_shutdown();
    StatusCode::OK
}

pub fn node_app(state: Arc<NodeState>) -> Router {
    Router::new()
        .route(api::INFO, get(info))
        .route(api::PEERS_ADD, post(add_peer))
        .route(api::PEERS_REMOVE, post(remove_peer))
        .route(api::SHUTDOWN, post(shutdown))
        .with_state(state)
}

/// Serve the control API until a shutdown is requested, then stop the
/// service.
pub async fn serve(listener: TcpListener, state: Arc<NodeState>) -> io::Result<()> {
    let app = node_app(Arc::clone(&state));
    let signal_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal_state.wait_for_shutdown().await })
        .await?;

    if let Err(error) = state.stop_service().await {
        warn!(node = %state.config.name, %error, "failed to stop node service");
    }
    info!(node = %state.config.name, "node stopped");
    Ok(())
}
