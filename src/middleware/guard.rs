use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;

use crate::access::{AuthzFailure, Principal, Rejection, RequirementLookup};
use crate::app::AppState;
use crate::error::ApiError;

/// Per-route middleware state: which registered operation the route runs.
#[derive(Clone)]
pub struct Guard {
    state: AppState,
    operation: &'static str,
}

impl Guard {
    pub fn new(state: AppState, operation: &'static str) -> Self {
        Self { state, operation }
    }
}

/// Runs the authorization pipeline for the route's operation and, for
/// operations addressing a record by id, the case access gate. On success
/// the [`AccessContext`](crate::access::AccessContext) is handed to the handler.
pub async fn authorize_operation(
    State(guard): State<Guard>,
    path: Option<Path<HashMap<String, String>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(spec) = guard.state.operations.lookup(guard.operation) else {
        tracing::error!("Route bound to unregistered operation '{}'", guard.operation);
        return Err(Rejection::Forbidden.into());
    };

    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_else(Principal::unauthenticated);

    let ctx = guard.state.stage.authorize(&spec.name, &principal, &spec.requirement).await?;

    if let Some(addressing) = &spec.case_addressing {
        let id = path
            .as_ref()
            .and_then(|Path(params)| params.get(&addressing.id_field))
            .and_then(|raw| raw.parse::<i64>().ok());
        let Some(id) = id else {
            tracing::debug!(operation = %spec.name, "Missing or malformed '{}' path parameter", addressing.id_field);
            return Err(AuthzFailure::Rejected(Rejection::NotFound).into());
        };
        guard.state.gate.assert_case_access(&ctx, addressing.table, id).await?;
    }

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
