use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::state::SharedState;

use super::with_manager;

/// Request body for `PUT` and `DELETE /connection`.
#[derive(Debug, Deserialize)]
pub struct ConnectionRequest {
    /// The requesting peer's own public address.
    pub addr: String,
}

/// `GET /connection`
///
/// Lists the peer addresses this replica is connected to.
pub async fn list_peers(
    State(state): State<SharedState>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let peers = with_manager(&state, |manager| manager.peers()).await?;
    Ok(Json(peers))
}

/// `PUT /connection`
///
/// Registers the requesting peer. The response is the peer list as it
/// was before the registration, so the newcomer learns about everyone
/// else without seeing itself.
pub async fn register_peer(
    State(state): State<SharedState>,
    Json(body): Json<ConnectionRequest>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    tracing::info!("connected {}", body.addr);

    let peers = with_manager(&state, move |manager| {
        let peers = manager.peers();
        manager.connected(&body.addr);
        peers
    })
    .await?;

    Ok(Json(peers))
}

/// `DELETE /connection`
///
/// Deregisters the requesting peer.
pub async fn deregister_peer(
    State(state): State<SharedState>,
    Json(body): Json<ConnectionRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracing::info!("disconnected {}", body.addr);

    with_manager(&state, move |manager| manager.disconnected(&body.addr)).await?;
    Ok(StatusCode::CREATED)
}
