use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::access::{
    AccessError, AccessStore, OwningRegionLookup, PermissionUpdate, Region, RegionScope, RolePermission, ScopedTable,
    Section, UserAccount,
};
use crate::database::manager::DatabaseError;
use crate::database::models::{Case, CaseUpdate, LookupRecord, NewCase};
use crate::database::query_builder::QueryBuilder;
use crate::database::records::{lookup_table, RecordStore};
use crate::filter::{ListParams, Predicate};

#[derive(FromRow)]
struct RegionRow {
    id: i32,
    name: String,
    domain_url: String,
    is_active: bool,
}

impl From<RegionRow> for Region {
    fn from(row: RegionRow) -> Self {
        Region { id: row.id, name: row.name, domain_url: row.domain_url, is_active: row.is_active }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    is_active: bool,
    token_version: i64,
}

#[derive(FromRow)]
struct PermissionRow {
    role_id: i32,
    role_name: String,
    region_id: i32,
    section: String,
    can_view: bool,
    can_create: bool,
    can_edit: bool,
    can_delete: bool,
}

impl PermissionRow {
    fn into_permission(self) -> Option<RolePermission> {
        let section = match self.section.parse::<Section>() {
            Ok(section) => section,
            Err(e) => {
                tracing::warn!("Skipping permission row for role {}: {}", self.role_name, e);
                return None;
            }
        };
        Some(RolePermission {
            role_id: self.role_id,
            role_name: self.role_name,
            region_id: self.region_id,
            section,
            can_view: self.can_view,
            can_create: self.can_create,
            can_edit: self.can_edit,
            can_delete: self.can_delete,
        })
    }
}

const PERMISSION_COLUMNS: &str = "rp.role_id, r.name AS role_name, rp.region_id, rp.section, \
     rp.can_view, rp.can_create, rp.can_edit, rp.can_delete";

/// [`AccessStore`] over the `regions`, `users`, `user_regions`, `roles`,
/// `user_roles` and `role_permissions` tables.
#[derive(Clone)]
pub struct PgAccessStore {
    pool: PgPool,
}

impl PgAccessStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessStore for PgAccessStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, AccessError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, is_active, token_version \
             FROM users WHERE lower(username) = lower($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.map(|row| UserAccount {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            is_active: row.is_active,
            token_version: row.token_version,
        }))
    }

    async fn token_version(&self, user_id: Uuid) -> Result<Option<i64>, AccessError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT token_version FROM users WHERE id = $1 AND is_active")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from)?;
        Ok(version)
    }

    async fn bump_token_version(&self, user_id: Uuid) -> Result<Option<i64>, AccessError> {
        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET token_version = token_version + 1 WHERE id = $1 RETURNING token_version",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(version)
    }

    async fn user_roles(&self, user_id: Uuid) -> Result<Vec<String>, AccessError> {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(roles)
    }

    async fn accessible_regions(&self, user_id: Uuid) -> Result<BTreeSet<i32>, AccessError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT ur.region_id FROM user_regions ur JOIN regions g ON g.id = ur.region_id \
             WHERE ur.user_id = $1 AND g.is_active",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(ids.into_iter().collect())
    }

    async fn regions(&self, ids: &BTreeSet<i32>) -> Result<Vec<Region>, AccessError> {
        let ids: Vec<i32> = ids.iter().copied().collect();
        let rows = sqlx::query_as::<_, RegionRow>(
            "SELECT id, name, domain_url, is_active FROM regions WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().map(Region::from).collect())
    }

    async fn region_by_slug(&self, slug: &str) -> Result<Option<Region>, AccessError> {
        let row = sqlx::query_as::<_, RegionRow>(
            "SELECT id, name, domain_url, is_active FROM regions WHERE slug = lower($1) ORDER BY id LIMIT 1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(row.map(Region::from))
    }

    async fn role_grants(
        &self,
        roles: &[String],
        region_id: i32,
        section: Section,
    ) -> Result<Vec<RolePermission>, AccessError> {
        let lowered: Vec<String> = roles.iter().map(|r| r.to_lowercase()).collect();
        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM role_permissions rp JOIN roles r ON r.id = rp.role_id \
             WHERE rp.region_id = $1 AND rp.section = $2 AND lower(r.name) = ANY($3)",
            PERMISSION_COLUMNS
        ))
        .bind(region_id)
        .bind(section.as_str())
        .bind(lowered)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().filter_map(PermissionRow::into_permission).collect())
    }

    async fn role_permissions(&self, region_id: i32) -> Result<Vec<RolePermission>, AccessError> {
        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM role_permissions rp JOIN roles r ON r.id = rp.role_id \
             WHERE rp.region_id = $1 ORDER BY r.name, rp.section",
            PERMISSION_COLUMNS
        ))
        .bind(region_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().filter_map(PermissionRow::into_permission).collect())
    }

    async fn upsert_role_permission(
        &self,
        region_id: i32,
        update: &PermissionUpdate,
    ) -> Result<Option<RolePermission>, AccessError> {
        let role: Option<(i32, String)> =
            sqlx::query_as("SELECT id, name FROM roles WHERE lower(name) = lower($1)")
                .bind(&update.role)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from)?;
        let Some((role_id, role_name)) = role else {
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO role_permissions (role_id, region_id, section, can_view, can_create, can_edit, can_delete) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (role_id, region_id, section) DO UPDATE SET \
             can_view = EXCLUDED.can_view, can_create = EXCLUDED.can_create, \
             can_edit = EXCLUDED.can_edit, can_delete = EXCLUDED.can_delete",
        )
        .bind(role_id)
        .bind(region_id)
        .bind(update.section.as_str())
        .bind(update.can_view)
        .bind(update.can_create)
        .bind(update.can_edit)
        .bind(update.can_delete)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(Some(RolePermission {
            role_id,
            role_name,
            region_id,
            section: update.section,
            can_view: update.can_view,
            can_create: update.can_create,
            can_edit: update.can_edit,
            can_delete: update.can_delete,
        }))
    }
}

/// [`RecordStore`] over `cases`, `judges` and `case_types`.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwningRegionLookup for PgRecordStore {
    async fn owning_region(&self, table: ScopedTable, id: i64) -> Result<Option<Option<i32>>, AccessError> {
        let region: Option<Option<i32>> =
            sqlx::query_scalar(&format!("SELECT region_id FROM \"{}\" WHERE id = $1", table.table_name()))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from)?;
        Ok(region)
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_cases(&self, scope: &RegionScope, params: &ListParams) -> Result<Vec<Case>, DatabaseError> {
        QueryBuilder::<Case>::new("cases")?.scoped(scope)?.list(params)?.select_all(&self.pool).await
    }

    async fn count_cases(&self, scope: &RegionScope) -> Result<i64, DatabaseError> {
        QueryBuilder::<Case>::new("cases")?.scoped(scope)?.count(&self.pool).await
    }

    async fn get_case(&self, scope: &RegionScope, id: i64) -> Result<Option<Case>, DatabaseError> {
        QueryBuilder::<Case>::new("cases")?
            .scoped(scope)?
            .restrict(Predicate::eq("id", id))?
            .select_optional(&self.pool)
            .await
    }

    async fn create_case(&self, region_id: i32, case: &NewCase) -> Result<Case, DatabaseError> {
        let created = sqlx::query_as::<_, Case>(
            "INSERT INTO cases (region_id, case_number, title) VALUES ($1, $2, $3) \
             RETURNING id, region_id, case_number, title, created_at",
        )
        .bind(region_id)
        .bind(&case.case_number)
        .bind(&case.title)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_case(&self, id: i64, update: &CaseUpdate) -> Result<Option<Case>, DatabaseError> {
        let updated = sqlx::query_as::<_, Case>(
            "UPDATE cases SET \
             case_number = COALESCE($2, case_number), \
             title = COALESCE($3, title), \
             region_id = COALESCE($4, region_id) \
             WHERE id = $1 RETURNING id, region_id, case_number, title, created_at",
        )
        .bind(id)
        .bind(update.case_number.as_deref())
        .bind(update.title.as_deref())
        .bind(update.region_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_case(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM cases WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_lookup(
        &self,
        table: ScopedTable,
        scope: &RegionScope,
        params: &ListParams,
    ) -> Result<Vec<LookupRecord>, DatabaseError> {
        QueryBuilder::<LookupRecord>::new(lookup_table(table)?)?
            .scoped(scope)?
            .list(params)?
            .select_all(&self.pool)
            .await
    }

    async fn get_lookup(
        &self,
        table: ScopedTable,
        scope: &RegionScope,
        id: i64,
    ) -> Result<Option<LookupRecord>, DatabaseError> {
        QueryBuilder::<LookupRecord>::new(lookup_table(table)?)?
            .scoped(scope)?
            .restrict(Predicate::eq("id", id))?
            .select_optional(&self.pool)
            .await
    }
}
