//! Inbound protocol endpoint.
//!
//! Thin axum handlers translating the HTTP surface into
//! [`ChainManager`](crate::manager::ChainManager) calls:
//!
//! - `GET /block` and `GET /block/{index}`: chain and block reads,
//! - `PUT /block`: block ingress from a peer,
//! - `POST /block`: tip closure,
//! - `POST /message`: message pooling,
//! - `GET`/`PUT`/`DELETE /connection`: peer set management,
//! - `GET /metrics`: Prometheus text exposition.
//!
//! No business logic lives here; handlers deserialize, delegate, and map
//! outcomes to status codes.

pub mod block;
pub mod connection;
pub mod message;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};

use crate::manager::ChainManager;
use crate::state::SharedState;

/// Assembles the peer's HTTP router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/block",
            get(block::get_chain)
                .put(block::put_block)
                .post(block::close_block),
        )
        .route("/block/{index}", get(block::get_block))
        .route("/message", post(message::post_message))
        .route(
            "/connection",
            get(connection::list_peers)
                .put(connection::register_peer)
                .delete(connection::deregister_peer),
        )
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Runs a manager operation on a blocking worker thread.
///
/// The manager's embedded HTTP client is blocking, so its critical
/// sections must not run on async workers. The mutex is only ever held
/// inside these tasks.
pub(crate) async fn with_manager<F, T>(
    state: &SharedState,
    op: F,
) -> Result<T, (StatusCode, String)>
where
    F: FnOnce(&mut ChainManager) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let mut manager = state.manager.lock().expect("manager mutex poisoned");
        op(&mut manager)
    })
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("manager task failed: {e}"),
        )
    })
}

pub(crate) fn as_bad_request(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

pub(crate) fn as_internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// `GET /metrics`
///
/// Prometheus text exposition for this replica.
async fn metrics(State(state): State<SharedState>) -> String {
    state.metrics.gather_text()
}
