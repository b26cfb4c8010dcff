//! Auth routes and the bearer-token extractor.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::Json;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use super::ApiError;
use crate::error::ChatError;
use crate::models::AdminProfile;
use crate::services::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::state::AppState;

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated admin resolved from `Authorization: Bearer <token>`.
/// Use as a handler parameter to require authentication.
pub struct AuthAdmin(pub AdminProfile);

impl<S> FromRequestParts<S> for AuthAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError(ChatError::auth("bearer token required")))?;

        let app_state = AppState::from_ref(state);
        let admin = app_state.auth.authenticate(bearer.token()).await?;
        Ok(Self(admin))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = body?;
    let resp = state.auth.register(req).await?;
    Ok(Json(resp))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.auth.login(req).await?))
}

/// `GET /api/auth/me`
pub async fn me(AuthAdmin(admin): AuthAdmin) -> Json<AdminProfile> {
    Json(admin)
}
