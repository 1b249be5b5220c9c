use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{AccessContext, Rejection};
use crate::app::AppState;
use crate::auth::SessionGrant;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct SelectRegionRequest {
    pub region_id: i32,
}

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub user_id: Uuid,
    pub region_id: Option<i32>,
    pub roles: Vec<String>,
    pub regions: Vec<i32>,
}

fn user_id(ctx: &AccessContext) -> Result<Uuid, Rejection> {
    ctx.principal.user_id.ok_or(Rejection::Unauthorized)
}

/// POST /api/auth/region - Re-issue the access token bound to another region
pub async fn select_region(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(payload): Json<SelectRegionRequest>,
) -> ApiResult<SessionGrant> {
    let grant = state.sessions.select_region(user_id(&ctx)?, payload.region_id).await?;
    Ok(ApiResponse::success(grant))
}

/// DELETE /api/auth/session - Revoke every outstanding token of the caller
pub async fn logout(State(state): State<AppState>, Extension(ctx): Extension<AccessContext>) -> ApiResult<()> {
    state.sessions.logout(user_id(&ctx)?).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/auth/whoami - Current principal and accessible regions
pub async fn whoami(Extension(ctx): Extension<AccessContext>) -> ApiResult<WhoAmI> {
    Ok(ApiResponse::success(WhoAmI {
        user_id: user_id(&ctx)?,
        region_id: ctx.principal.region_id,
        roles: ctx.principal.role_list(),
        regions: ctx.scope.regions().iter().copied().collect(),
    }))
}
