use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::collections::HashMap;

use crate::access::{AccessContext, Action, PermissionUpdate, Rejection, RolePermission, Section};
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// The matrix of `region_id` is reachable only when the region is in scope and
/// the caller holds `action` on RolePermissions in that region itself; a grant
/// in the current region says nothing about another one. Refusals read as missing.
async fn ensure_matrix_access(
    state: &AppState,
    ctx: &AccessContext,
    region_id: i32,
    action: Action,
) -> Result<(), ApiError> {
    if !ctx.scope.contains_region(region_id) {
        tracing::warn!(region_id, user_id = ?ctx.principal.user_id, "Permission matrix outside scope requested");
        return Err(Rejection::NotFound.into());
    }

    let granted = state
        .stage
        .checker()
        .check_access_in_region(&ctx.principal, region_id, Section::RolePermissions, action)
        .await?;
    if !granted {
        tracing::warn!(
            region_id,
            %action,
            user_id = ?ctx.principal.user_id,
            "Permission matrix access refused in target region"
        );
        return Err(Rejection::NotFound.into());
    }
    Ok(())
}

/// GET /api/regions/:region_id/permissions - Role/section matrix of one region
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(region_id): Path<i32>,
) -> ApiResult<Vec<RolePermission>> {
    ensure_matrix_access(&state, &ctx, region_id, Action::View).await?;
    let rows = state.access.role_permissions(region_id).await?;
    Ok(ApiResponse::success(rows))
}

/// PUT /api/regions/:region_id/permissions - Replace one (role, section) row
///
/// Only the addressed region changes; the same role keeps its grants elsewhere.
pub async fn upsert(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(region_id): Path<i32>,
    Json(payload): Json<PermissionUpdate>,
) -> ApiResult<RolePermission> {
    ensure_matrix_access(&state, &ctx, region_id, Action::Edit).await?;

    let Some(row) = state.access.upsert_role_permission(region_id, &payload).await? else {
        let field_errors = HashMap::from([("role".to_string(), format!("Unknown role '{}'", payload.role))]);
        return Err(ApiError::validation_error("Invalid permission update", Some(field_errors)));
    };

    tracing::info!(
        region_id,
        role = %row.role_name,
        section = %row.section,
        user_id = ?ctx.principal.user_id,
        "Role permission updated"
    );
    Ok(ApiResponse::success(row))
}
