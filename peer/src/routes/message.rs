use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use chain::Message;
use chain::wire::MessageDto;

use crate::state::SharedState;

use super::{as_bad_request, with_manager};

/// `POST /message`
///
/// Pools a signed message on the open tip. An unverifiable message or a
/// closed tip yields 400.
pub async fn post_message(
    State(state): State<SharedState>,
    Json(dto): Json<MessageDto>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracing::info!("send message of {}", dto.namespace);

    let message = Message::from_dto(&dto).map_err(as_bad_request)?;

    with_manager(&state, move |manager| manager.add_message(message))
        .await?
        .map_err(as_bad_request)?;

    state.metrics.peer.messages_pooled_total.inc();
    Ok(StatusCode::CREATED)
}
