use axum::{extract::State, Extension};

use crate::access::{AccessContext, Region};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/regions - Regions the caller is an active member of
pub async fn list(State(state): State<AppState>, Extension(ctx): Extension<AccessContext>) -> ApiResult<Vec<Region>> {
    let regions = state.access.regions(ctx.scope.regions()).await?;
    Ok(ApiResponse::success(regions))
}
