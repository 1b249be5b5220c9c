use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// GET / - Service banner
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health - Liveness and the active access configuration
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    let operations = state.operations.len();
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "operations": operations,
        "region_policy": state.stage.region_policy(),
    })))
}
