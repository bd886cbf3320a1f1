use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use chain::wire::BlockDto;
use chain::{Block, Identity};

use crate::state::SharedState;

use super::{as_bad_request, as_internal_error, with_manager};

/// Request body for `PUT /block`.
#[derive(Debug, Deserialize)]
pub struct PutBlockRequest {
    /// Address of the peer the block arrived from, skipped on re-gossip.
    pub host: Option<String>,
    pub block: BlockDto,
}

/// Request body for `POST /block`: a closure tuple for the current tip.
#[derive(Debug, Deserialize)]
pub struct CloseBlockRequest {
    /// Closer's public key as PEM.
    pub user: String,
    /// Base64-encoded 32-byte proof-of-work key.
    pub key: String,
    /// Closure timestamp in milliseconds since the epoch.
    pub timestamp: u64,
    /// Base64-encoded closure signature.
    pub signature: String,
    /// Address of the peer the closure arrived from, if any.
    pub host: Option<String>,
}

/// `GET /block`
///
/// Returns the full chain, root first.
pub async fn get_chain(
    State(state): State<SharedState>,
) -> Result<Json<Vec<BlockDto>>, (StatusCode, String)> {
    let dto = with_manager(&state, |manager| manager.chain().to_dto()).await?;
    Ok(Json(dto.map_err(as_internal_error)?))
}

/// `GET /block/{index}`
///
/// Returns one block; negative indices count from the tail.
pub async fn get_block(
    State(state): State<SharedState>,
    Path(index): Path<i64>,
) -> Result<Json<BlockDto>, (StatusCode, String)> {
    let dto = with_manager(&state, move |manager| {
        manager.chain().block_at(index).map(Block::to_dto)
    })
    .await?;

    match dto {
        Some(Ok(dto)) => Ok(Json(dto)),
        Some(Err(e)) => Err(as_internal_error(e)),
        None => Err((StatusCode::NOT_FOUND, format!("no block at index {index}"))),
    }
}

/// `PUT /block`
///
/// Ingresses a block gossiped by a peer.
pub async fn put_block(
    State(state): State<SharedState>,
    Json(body): Json<PutBlockRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracing::info!(
        signature = body.block.signature.as_deref().unwrap_or("<open>"),
        "receive block",
    );

    let block = Block::from_dto(&body.block, None).map_err(as_bad_request)?;

    let added = with_manager(&state, move |manager| {
        let added = manager.add_block(block, body.host.as_deref())?;
        Ok::<_, chain::ChainError>((added, manager.chain().len()))
    })
    .await?;
    let (added, height) = added.map_err(as_bad_request)?;

    if added {
        state.metrics.peer.blocks_ingressed_total.inc();
        state.metrics.peer.chain_height.set(height as i64);
    }

    Ok(StatusCode::CREATED)
}

/// `POST /block`
///
/// Applies a closure tuple to the current tip. A tuple that does not
/// close the tip (stale, bad key, bad signature) yields 401 and leaves
/// the replica unchanged.
pub async fn close_block(
    State(state): State<SharedState>,
    Json(body): Json<CloseBlockRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracing::info!(key = %body.key, "close block");

    let closer = Identity::from_pem(&body.user).map_err(as_bad_request)?;
    let key = BASE64.decode(&body.key).map_err(as_bad_request)?;
    let signature = BASE64.decode(&body.signature).map_err(as_bad_request)?;

    let (ok, height) = with_manager(&state, move |manager| {
        let ok = manager.close_block(&closer, body.timestamp, &key, signature, body.host.as_deref());
        (ok, manager.chain().len())
    })
    .await?;

    if ok {
        state.metrics.peer.blocks_closed_total.inc();
        state.metrics.peer.chain_height.set(height as i64);
        Ok(StatusCode::CREATED)
    } else {
        state.metrics.peer.closures_rejected_total.inc();
        Err((
            StatusCode::UNAUTHORIZED,
            "closure rejected".to_string(),
        ))
    }
}
