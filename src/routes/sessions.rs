//! Session routes. Creating a session is public; everything else is for
//! authenticated admins.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use super::auth::AuthAdmin;
use super::{ApiError, parse_id};
use crate::models::{ChatSession, NewSession, SessionSummary, TypingIndicator};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    #[serde(default)]
    status: String,
}

/// `GET /api/sessions`
pub async fn list_sessions(
    State(state): State<AppState>,
    _admin: AuthAdmin,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    Ok(Json(state.chat.list_sessions().await?))
}

/// `POST /api/sessions`
pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<NewSession>, JsonRejection>,
) -> Result<Json<ChatSession>, ApiError> {
    let Json(new) = body?;
    let session = state.chat.create_session(new).await?;
    Ok(Json(session))
}

/// `GET /api/sessions/{id}`
pub async fn get_session(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<Json<ChatSession>, ApiError> {
    let id = parse_id(&id, "id")?;
    Ok(Json(state.chat.get_session(id).await?))
}

/// `PATCH /api/sessions/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<ChatSession>, ApiError> {
    let id = parse_id(&id, "id")?;
    let Json(body) = body?;
    Ok(Json(state.chat.update_status(id, &body.status).await?))
}

/// `DELETE /api/sessions/{id}`
pub async fn delete_session(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    state.chat.delete_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/sessions/{id}/typing`
pub async fn typing_state(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<Json<Vec<TypingIndicator>>, ApiError> {
    let id = parse_id(&id, "id")?;
    Ok(Json(state.chat.typing_state(id).await?))
}
