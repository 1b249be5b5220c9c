use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use super::store::AccessStore;
use super::AccessError;
use crate::auth::{Claims, TokenError, TokenService};

/// Identity of the current request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: Option<Uuid>,
    pub is_authenticated: bool,
    /// Region embedded in the credential; `None` until the user selects one.
    pub region_id: Option<i32>,
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn unauthenticated() -> Self {
        Self {
            user_id: None,
            is_authenticated: false,
            region_id: None,
            roles: BTreeSet::new(),
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: Some(claims.sub),
            is_authenticated: true,
            region_id: claims.region_id,
            roles: claims.roles.iter().cloned().collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.has_role(r.as_ref()))
    }

    pub fn role_list(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }
}

/// Turns an inbound credential plus optional tenant hint into a [`Principal`].
///
/// Anything wrong with the credential yields [`Principal::unauthenticated`];
/// only an unreachable store is an error.
#[derive(Clone)]
pub struct PrincipalResolver {
    tokens: Arc<TokenService>,
    store: Arc<dyn AccessStore>,
}

impl PrincipalResolver {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn AccessStore>) -> Self {
        Self { tokens, store }
    }

    pub async fn resolve(
        &self,
        credential: Option<&str>,
        tenant_hint: Option<&str>,
    ) -> Result<Principal, AccessError> {
        let Some(token) = credential else {
            return Ok(Principal::unauthenticated());
        };

        let claims = match self.tokens.validate(token).await {
            Ok(claims) => claims,
            Err(TokenError::Store(e)) => return Err(e),
            Err(e) => {
                tracing::debug!("Credential rejected: {}", e);
                return Ok(Principal::unauthenticated());
            }
        };

        if let Some(slug) = tenant_hint {
            let region = self.store.region_by_slug(slug).await?;
            match (region, claims.region_id) {
                (Some(region), _) if !region.is_active => {
                    tracing::debug!("Tenant hint '{}' names inactive region {}", slug, region.id);
                    return Ok(Principal::unauthenticated());
                }
                (Some(region), Some(claimed)) if region.id != claimed => {
                    tracing::debug!(
                        user_id = %claims.sub,
                        claimed_region = claimed,
                        hinted_region = region.id,
                        "Credential presented to a different tenant"
                    );
                    return Ok(Principal::unauthenticated());
                }
                (Some(_), _) => {}
                (None, _) => {
                    tracing::debug!("Tenant hint '{}' does not name a region", slug);
                    return Ok(Principal::unauthenticated());
                }
            }
        }

        Ok(Principal::from_claims(&claims))
    }
}
