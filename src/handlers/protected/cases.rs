use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::access::{AccessContext, Action, Rejection, Section};
use crate::app::AppState;
use crate::database::models::{Case, CaseUpdate, NewCase};
use crate::error::ApiError;
use crate::filter::ListParams;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct CaseList {
    pub total: i64,
    pub cases: Vec<Case>,
}

/// GET /api/cases - Cases in the caller's regions
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<CaseList> {
    let cases = state.records.list_cases(&ctx.scope, &params).await?;
    let total = state.records.count_cases(&ctx.scope).await?;
    Ok(ApiResponse::success(CaseList { total, cases }))
}

/// GET /api/cases/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<i64>,
) -> ApiResult<Case> {
    let case = state.records.get_case(&ctx.scope, id).await?.ok_or(Rejection::NotFound)?;
    Ok(ApiResponse::success(case))
}

/// POST /api/cases - Create a case in the caller's current region
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(payload): Json<NewCase>,
) -> ApiResult<Case> {
    let mut field_errors = HashMap::new();
    if payload.case_number.trim().is_empty() {
        field_errors.insert("case_number".to_string(), "This field is required".to_string());
    }
    if payload.title.trim().is_empty() {
        field_errors.insert("title".to_string(), "This field is required".to_string());
    }
    if !field_errors.is_empty() {
        return Err(ApiError::validation_error("Missing required fields", Some(field_errors)));
    }

    let region_id = ctx.require_region()?;
    let case = state.records.create_case(region_id, &payload).await?;
    tracing::info!(case_id = case.id, region_id, user_id = ?ctx.principal.user_id, "Case created");
    Ok(ApiResponse::created(case))
}

/// PUT /api/cases/:id - Partial update; moving regions needs create rights in the target
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<i64>,
    Json(payload): Json<CaseUpdate>,
) -> ApiResult<Case> {
    if let Some(target) = payload.region_id {
        let current = state.records.get_case(&ctx.scope, id).await?.ok_or(Rejection::NotFound)?;
        if current.region_id != Some(target) {
            let permitted = ctx.scope.admits(Some(target))
                && state
                    .stage
                    .checker()
                    .check_access_in_region(&ctx.principal, target, Section::CaseManagement, Action::Create)
                    .await?;
            if !permitted {
                tracing::warn!(
                    case_id = id,
                    target_region = target,
                    user_id = ?ctx.principal.user_id,
                    "Case move refused"
                );
                return Err(Rejection::Forbidden.into());
            }
        }
    }

    let case = state.records.update_case(id, &payload).await?.ok_or(Rejection::NotFound)?;
    Ok(ApiResponse::success(case))
}

/// DELETE /api/cases/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    if !state.records.delete_case(id).await? {
        return Err(Rejection::NotFound.into());
    }
    tracing::info!(case_id = id, user_id = ?ctx.principal.user_id, "Case deleted");
    Ok(ApiResponse::no_content())
}
