use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::section::{Action, Section};
use super::AccessError;

/// Tenant boundary. Referenced by id from every region-scoped record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: i32,
    pub name: String,
    pub domain_url: String,
    pub is_active: bool,
}

impl Region {
    /// Tenant slug: the first DNS label of `domain_url`.
    pub fn slug(&self) -> Option<String> {
        slug_of(&self.domain_url)
    }
}

pub fn slug_of(domain_url: &str) -> Option<String> {
    let trimmed = domain_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if trimmed.contains("://") {
        url::Url::parse(trimmed)
    } else {
        url::Url::parse(&format!("https://{}", trimmed))
    }
    .ok()?;
    let host = parsed.host_str()?;
    host.split('.').next().filter(|label| !label.is_empty()).map(|label| label.to_ascii_lowercase())
}

/// One row of the permission matrix, keyed by (role, section, region).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: i32,
    pub role_name: String,
    pub region_id: i32,
    pub section: Section,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl RolePermission {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Create => self.can_create,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
        }
    }
}

/// Replacement flags for one (role, section) pair within a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionUpdate {
    pub role: String,
    pub section: Section,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub is_active: bool,
    pub token_version: i64,
}

/// Ground truth for who may act on what, where.
///
/// Memberships in inactive regions are never reported as accessible.
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, AccessError>;

    /// Current revocation counter; `None` when the user no longer exists or is inactive.
    async fn token_version(&self, user_id: Uuid) -> Result<Option<i64>, AccessError>;

    /// Invalidates every outstanding credential of `user_id`.
    async fn bump_token_version(&self, user_id: Uuid) -> Result<Option<i64>, AccessError>;

    async fn user_roles(&self, user_id: Uuid) -> Result<Vec<String>, AccessError>;

    async fn accessible_regions(&self, user_id: Uuid) -> Result<BTreeSet<i32>, AccessError>;

    async fn regions(&self, ids: &BTreeSet<i32>) -> Result<Vec<Region>, AccessError>;

    async fn region_by_slug(&self, slug: &str) -> Result<Option<Region>, AccessError>;

    /// Grants held by any of `roles` for `section` in `region_id` only.
    async fn role_grants(
        &self,
        roles: &[String],
        region_id: i32,
        section: Section,
    ) -> Result<Vec<RolePermission>, AccessError>;

    async fn role_permissions(&self, region_id: i32) -> Result<Vec<RolePermission>, AccessError>;

    /// Returns `None` when the named role does not exist.
    async fn upsert_role_permission(
        &self,
        region_id: i32,
        update: &PermissionUpdate,
    ) -> Result<Option<RolePermission>, AccessError>;
}
