use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Serialize;

use crate::access::{AccessContext, Rejection};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct ChatAccess {
    pub case_id: i64,
    pub region_id: Option<i32>,
    pub channel: String,
}

/// GET /api/cases/:id/chat - Chat channel for a case the caller may see
pub async fn access(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<i64>,
) -> ApiResult<ChatAccess> {
    let case = state.records.get_case(&ctx.scope, id).await?.ok_or(Rejection::NotFound)?;
    Ok(ApiResponse::success(ChatAccess {
        case_id: case.id,
        region_id: case.region_id,
        channel: format!("case-{}", case.id),
    }))
}
