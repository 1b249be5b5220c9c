use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;

/// Resolves the caller once per request and stores the [`Principal`](crate::access::Principal)
/// in request extensions. Never rejects on its own; missing or bad credentials
/// yield an unauthenticated principal and the per-operation guard decides.
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = extract_bearer(request.headers());
    let hint = tenant_hint(request.headers(), &state.region_header, state.tenant_domain.as_deref());

    let principal = state.resolver.resolve(credential.as_deref(), hint.as_deref()).await?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Bearer token from the Authorization header, if well formed.
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Tenant slug for the request: the override header wins, then the first
/// label of a Host under `tenant_domain`.
pub fn tenant_hint(headers: &HeaderMap, region_header: &str, tenant_domain: Option<&str>) -> Option<String> {
    let explicit = headers
        .get(region_header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());
    if explicit.is_some() {
        return explicit;
    }

    let domain = tenant_domain?.trim_start_matches('.').to_ascii_lowercase();
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let host = host.split(':').next()?.to_ascii_lowercase();
    let label = host.strip_suffix(&domain)?.strip_suffix('.')?;
    if label.is_empty() || label.contains('.') {
        return None;
    }
    Some(label.to_string())
}
