use axum::{
    extract::{Path, Query, State},
    Extension,
};

use crate::access::{AccessContext, Rejection, ScopedTable};
use crate::app::AppState;
use crate::database::models::LookupRecord;
use crate::filter::ListParams;
use crate::middleware::{ApiResponse, ApiResult};

async fn list_table(
    state: &AppState,
    ctx: &AccessContext,
    table: ScopedTable,
    params: &ListParams,
) -> ApiResult<Vec<LookupRecord>> {
    let rows = state.records.list_lookup(table, &ctx.scope, params).await?;
    Ok(ApiResponse::success(rows))
}

async fn get_row(state: &AppState, ctx: &AccessContext, table: ScopedTable, id: i64) -> ApiResult<LookupRecord> {
    let row = state.records.get_lookup(table, &ctx.scope, id).await?.ok_or(Rejection::NotFound)?;
    Ok(ApiResponse::success(row))
}

/// GET /api/judges
pub async fn judges_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<LookupRecord>> {
    list_table(&state, &ctx, ScopedTable::Judges, &params).await
}

/// GET /api/judges/:id
pub async fn judges_get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<i64>,
) -> ApiResult<LookupRecord> {
    get_row(&state, &ctx, ScopedTable::Judges, id).await
}

/// GET /api/case-types
pub async fn case_types_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<LookupRecord>> {
    list_table(&state, &ctx, ScopedTable::CaseTypes, &params).await
}

/// GET /api/case-types/:id
pub async fn case_types_get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<i64>,
) -> ApiResult<LookupRecord> {
    get_row(&state, &ctx, ScopedTable::CaseTypes, id).await
}
