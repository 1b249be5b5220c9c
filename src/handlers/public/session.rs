use axum::{extract::State, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::SessionGrant;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Optional up-front region choice; must be one of the user's memberships.
    pub region_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub region_id: Option<i32>,
}

/// POST /auth/login - Authenticate and receive access and refresh tokens
///
/// A user with exactly one active region gets a token bound to it. Anyone
/// else gets a region-less token, the list of selectable regions and
/// `region_selection_required: true`.
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> ApiResult<SessionGrant> {
    let grant = state.sessions.login(&payload.username, &payload.password, payload.region_id).await?;
    Ok(ApiResponse::success(grant))
}

/// POST /auth/refresh - Exchange a refresh token for a new access token
pub async fn refresh(State(state): State<AppState>, Json(payload): Json<RefreshRequest>) -> ApiResult<SessionGrant> {
    let grant = state.sessions.refresh(&payload.refresh_token, payload.region_id).await?;
    Ok(ApiResponse::success(grant))
}
