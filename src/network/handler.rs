//! Relay Handler
//!
//! `POST /`: authenticate the caller by `X-ID`, parse the log entry and
//! forward it to the caller's chat.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use tokio::task;

use crate::bot::BotTransport;
use crate::error::RelayError;
use crate::protocol::{
    LogEntry, Response, ID_HEADER, MAX_BODY_SIZE, MSG_DELIVERY_FAILED, MSG_EMPTY_ENTRY,
    MSG_INTERNAL, MSG_INVALID_JSON, MSG_SENT,
};
use crate::repository::{UserReader, UserStore};

/// Shared by every request.
///
/// Both handles are blocking; they are only touched from the runtime's
/// blocking pool.
#[derive(Clone)]
pub struct RelayState {
    pub users: Arc<dyn UserStore>,
    pub transport: Arc<dyn BotTransport>,
}

/// Routes served by the relay
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", post(relay_log_entry))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

async fn relay_log_entry(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = headers
        .get(ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string();

    let users = Arc::clone(&state.users);
    let lookup = task::spawn_blocking(move || users.get(&id)).await;

    let user = match lookup {
        Ok(Ok(user)) => user,
        Ok(Err(e)) if e.is_empty_identifier() || matches!(e, RelayError::NotFound) => {
            tracing::debug!(error = %e, "rejecting request with unknown X-ID");
            return Response::unauthorized();
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "user lookup failed");
            return Response::error(MSG_INTERNAL);
        }
        Err(e) => {
            tracing::error!(error = %e, "user lookup task failed");
            return Response::error(MSG_INTERNAL);
        }
    };

    let entry: LogEntry = match serde_json::from_slice(&body) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::debug!(user_id = %user.id, error = %e, "could not parse JSON request body");
            return Response::bad_request(MSG_INVALID_JSON);
        }
    };

    let text = entry.to_message();
    if text.is_empty() {
        return Response::bad_request(MSG_EMPTY_ENTRY);
    }

    let transport = Arc::clone(&state.transport);
    let chat_id = user.external_chat_id;
    let sent = task::spawn_blocking(move || transport.send_message(chat_id, &text)).await;

    match sent {
        Ok(Ok(())) => {
            tracing::debug!(user_id = %user.id, chat_id, "log entry relayed");
            Response::ok(MSG_SENT)
        }
        Ok(Err(e)) => {
            tracing::error!(user_id = %user.id, chat_id, error = %e, "could not deliver log entry");
            Response::error(MSG_DELIVERY_FAILED)
        }
        Err(e) => {
            tracing::error!(error = %e, "delivery task failed");
            Response::error(MSG_DELIVERY_FAILED)
        }
    }
}
