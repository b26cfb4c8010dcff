//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON HTTP API and the `/api/ws` websocket endpoint
//! under a single Axum router. Every handler error is a `ChatError` wrapped
//! in `ApiError`, which renders as `{"error": ..., "code": ...}` with a
//! status picked by `error_to_status`.

pub mod auth;
pub mod chat;
pub mod sessions;
pub mod ws;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header::InvalidHeaderValue};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{ChatError, ErrorCode};
use crate::state::AppState;

/// Build the application router.
///
/// # Errors
///
/// Returns an error if `cors_origin` is not a valid header value.
pub fn app(state: AppState, cors_origin: Option<&str>) -> Result<Router, InvalidHeaderValue> {
    let cors = match cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(HeaderValue::from_str(origin)?),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Ok(Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/chat/messages", get(chat::list_messages_by_query).post(chat::send_message))
        .route("/api/chat/messages/{id}", get(chat::list_messages))
        .route("/api/chat/messages/{id}/read", patch(chat::mark_read))
        .route("/api/sessions", get(sessions::list_sessions).post(sessions::create_session))
        .route("/api/sessions/{id}", get(sessions::get_session).delete(sessions::delete_session))
        .route("/api/sessions/{id}/status", patch(sessions::update_status))
        .route("/api/sessions/{id}/typing", get(sessions::typing_state))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERRORS
// =============================================================================

/// Handler error. Renders a `ChatError` as status + JSON body.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ChatError::validation(rejection.body_text()))
    }
}

pub(crate) fn error_to_status(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Validation(_) => StatusCode::BAD_REQUEST,
        ChatError::NotFound { .. } | ChatError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Auth(_) => StatusCode::UNAUTHORIZED,
        ChatError::Persistence(_) | ChatError::UnconfirmedMessage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ChatError::PersistenceTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = error_to_status(&self.0);
        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "http: request failed");
        } else {
            warn!(code = self.0.error_code(), error = %self.0, "http: request rejected");
        }
        let body = json!({ "error": self.0.to_string(), "code": self.0.error_code() });
        (status, Json(body)).into_response()
    }
}

/// Parse a path id, reporting a malformed one as a validation error.
pub(crate) fn parse_id(raw: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError(ChatError::validation(format!("{field} must be a UUID"))))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
