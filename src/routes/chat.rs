//! Message routes. Public, like the end-user chat widget that calls them.
//!
//! `POST /api/chat/messages` goes through the same send path as the
//! websocket `send_message` event, so live room members see HTTP-sent
//! messages too.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;

use super::{ApiError, parse_id};
use crate::error::ChatError;
use crate::event::SendMessagePayload;
use crate::models::Message;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    session_id: Option<String>,
}

/// `GET /api/chat/messages/{id}`
pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let session_id = parse_id(&session_id, "sessionId")?;
    Ok(Json(state.chat.list_messages(session_id).await?))
}

/// `GET /api/chat/messages?sessionId=`
pub async fn list_messages_by_query(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let raw = query
        .session_id
        .ok_or_else(|| ChatError::validation("sessionId is required"))?;
    let session_id = parse_id(&raw, "sessionId")?;
    Ok(Json(state.chat.list_messages(session_id).await?))
}

/// `POST /api/chat/messages`
pub async fn send_message(
    State(state): State<AppState>,
    body: Result<Json<SendMessagePayload>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let Json(payload) = body?;
    let message = state.chat.send_message(None, payload).await?;
    Ok(Json(message))
}

/// `PATCH /api/chat/messages/{id}/read`
pub async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Message>, ApiError> {
    let id = parse_id(&id, "id")?;
    Ok(Json(state.chat.mark_read(id).await?))
}
