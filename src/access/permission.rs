use std::sync::Arc;

use super::principal::Principal;
use super::section::{Action, Section};
use super::store::AccessStore;
use super::AccessError;

/// Answers "may this principal perform `action` on `section`" from the
/// region-scoped role/section grants.
#[derive(Clone)]
pub struct PermissionChecker {
    store: Arc<dyn AccessStore>,
}

impl PermissionChecker {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Evaluated in the principal's current region. Region-less principals are denied.
    pub async fn check_access(
        &self,
        principal: &Principal,
        section: Section,
        action: Action,
    ) -> Result<bool, AccessError> {
        match principal.region_id {
            Some(region_id) => self.check_access_in_region(principal, region_id, section, action).await,
            None => Ok(false),
        }
    }

    /// Evaluated as if the principal's region were `region_id`.
    pub async fn check_access_in_region(
        &self,
        principal: &Principal,
        region_id: i32,
        section: Section,
        action: Action,
    ) -> Result<bool, AccessError> {
        if !principal.is_authenticated || principal.roles.is_empty() {
            return Ok(false);
        }

        let roles = principal.role_list();
        let grants = self.store.role_grants(&roles, region_id, section).await?;

        // Any role granting the action is enough.
        let allowed = grants.iter().any(|grant| {
            grant.region_id == region_id
                && grant.section == section
                && principal.has_role(&grant.role_name)
                && grant.allows(action)
        });

        tracing::trace!(
            user_id = ?principal.user_id,
            region_id,
            %section,
            %action,
            allowed,
            "Permission check"
        );
        Ok(allowed)
    }
}
