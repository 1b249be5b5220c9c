use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::access::store::slug_of;
use crate::access::{
    retain_accessible, AccessError, AccessStore, Action, OwningRegionLookup, PermissionUpdate, Region, RegionScope,
    RolePermission, ScopedTable, Section, UserAccount,
};
use crate::auth::password::hash_password;
use crate::database::manager::DatabaseError;
use crate::database::models::{Case, CaseUpdate, LookupRecord, NewCase};
use crate::database::records::{lookup_table, RecordStore};
use crate::filter::{ListParams, Sortable};

#[derive(Default)]
struct AccessState {
    regions: BTreeMap<i32, Region>,
    users: HashMap<Uuid, UserAccount>,
    memberships: BTreeSet<(Uuid, i32)>,
    roles: BTreeMap<String, i32>,
    user_roles: HashMap<Uuid, BTreeSet<String>>,
    permissions: BTreeMap<(i32, i32, Section), RolePermission>,
    unavailable: bool,
}

impl AccessState {
    fn check_available(&self) -> Result<(), AccessError> {
        if self.unavailable {
            return Err(AccessError::Store("access store unavailable".to_string()));
        }
        Ok(())
    }

    fn role_id(&self, name: &str) -> Option<(i32, String)> {
        self.roles
            .iter()
            .find(|(role, _)| role.eq_ignore_ascii_case(name))
            .map(|(role, id)| (*id, role.clone()))
    }
}

/// In-process [`AccessStore`] used by tests and local runs without a database.
#[derive(Default)]
pub struct MemoryAccessStore {
    state: RwLock<AccessState>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_region(&self, id: i32, name: &str, domain_url: &str, is_active: bool) {
        let region = Region { id, name: name.to_string(), domain_url: domain_url.to_string(), is_active };
        self.state.write().await.regions.insert(id, region);
    }

    pub async fn set_region_active(&self, id: i32, is_active: bool) {
        if let Some(region) = self.state.write().await.regions.get_mut(&id) {
            region.is_active = is_active;
        }
    }

    pub async fn add_user(&self, username: &str, password: &str) -> Result<Uuid, AccessError> {
        let password_hash = hash_password(password).map_err(|e| AccessError::Store(e.to_string()))?;
        let account = UserAccount {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            is_active: true,
            token_version: 0,
        };
        let id = account.id;
        self.state.write().await.users.insert(id, account);
        Ok(id)
    }

    pub async fn set_user_active(&self, user_id: Uuid, is_active: bool) {
        if let Some(user) = self.state.write().await.users.get_mut(&user_id) {
            user.is_active = is_active;
        }
    }

    pub async fn add_membership(&self, user_id: Uuid, region_id: i32) {
        self.state.write().await.memberships.insert((user_id, region_id));
    }

    pub async fn remove_membership(&self, user_id: Uuid, region_id: i32) {
        self.state.write().await.memberships.remove(&(user_id, region_id));
    }

    pub async fn add_role(&self, name: &str) -> i32 {
        let mut state = self.state.write().await;
        if let Some((id, _)) = state.role_id(name) {
            return id;
        }
        let id = state.roles.len() as i32 + 1;
        state.roles.insert(name.to_string(), id);
        id
    }

    pub async fn assign_role(&self, user_id: Uuid, role: &str) {
        self.add_role(role).await;
        self.state.write().await.user_roles.entry(user_id).or_default().insert(role.to_string());
    }

    /// Adds `actions` to the role's grant in one region; existing flags are kept.
    pub async fn grant(&self, role: &str, region_id: i32, section: Section, actions: impl IntoIterator<Item = Action>) {
        let role_id = self.add_role(role).await;
        let mut state = self.state.write().await;
        let role_name = state.role_id(role).map(|(_, name)| name).unwrap_or_else(|| role.to_string());
        let entry = state.permissions.entry((region_id, role_id, section)).or_insert_with(|| RolePermission {
            role_id,
            role_name,
            region_id,
            section,
            can_view: false,
            can_create: false,
            can_edit: false,
            can_delete: false,
        });
        for action in actions {
            match action {
                Action::View => entry.can_view = true,
                Action::Create => entry.can_create = true,
                Action::Edit => entry.can_edit = true,
                Action::Delete => entry.can_delete = true,
            }
        }
    }

    /// Makes every subsequent call fail, to exercise fail-closed paths.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.users.values().find(|u| u.username.eq_ignore_ascii_case(username)).cloned())
    }

    async fn token_version(&self, user_id: Uuid) -> Result<Option<i64>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.users.get(&user_id).filter(|u| u.is_active).map(|u| u.token_version))
    }

    async fn bump_token_version(&self, user_id: Uuid) -> Result<Option<i64>, AccessError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        Ok(state.users.get_mut(&user_id).map(|u| {
            u.token_version += 1;
            u.token_version
        }))
    }

    async fn user_roles(&self, user_id: Uuid) -> Result<Vec<String>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.user_roles.get(&user_id).map(|roles| roles.iter().cloned().collect()).unwrap_or_default())
    }

    async fn accessible_regions(&self, user_id: Uuid) -> Result<BTreeSet<i32>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state
            .memberships
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, region_id)| *region_id)
            .filter(|region_id| state.regions.get(region_id).map(|r| r.is_active).unwrap_or(false))
            .collect())
    }

    async fn regions(&self, ids: &BTreeSet<i32>) -> Result<Vec<Region>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(ids.iter().filter_map(|id| state.regions.get(id).cloned()).collect())
    }

    async fn region_by_slug(&self, slug: &str) -> Result<Option<Region>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        let wanted = slug.to_ascii_lowercase();
        Ok(state.regions.values().find(|r| slug_of(&r.domain_url).as_deref() == Some(wanted.as_str())).cloned())
    }

    async fn role_grants(
        &self,
        roles: &[String],
        region_id: i32,
        section: Section,
    ) -> Result<Vec<RolePermission>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state
            .permissions
            .values()
            .filter(|p| p.region_id == region_id && p.section == section)
            .filter(|p| roles.iter().any(|role| role.eq_ignore_ascii_case(&p.role_name)))
            .cloned()
            .collect())
    }

    async fn role_permissions(&self, region_id: i32) -> Result<Vec<RolePermission>, AccessError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.permissions.values().filter(|p| p.region_id == region_id).cloned().collect())
    }

    async fn upsert_role_permission(
        &self,
        region_id: i32,
        update: &PermissionUpdate,
    ) -> Result<Option<RolePermission>, AccessError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let Some((role_id, role_name)) = state.role_id(&update.role) else {
            return Ok(None);
        };
        let permission = RolePermission {
            role_id,
            role_name,
            region_id,
            section: update.section,
            can_view: update.can_view,
            can_create: update.can_create,
            can_edit: update.can_edit,
            can_delete: update.can_delete,
        };
        state.permissions.insert((region_id, role_id, update.section), permission.clone());
        Ok(Some(permission))
    }
}

#[derive(Default)]
struct RecordState {
    cases: BTreeMap<i64, Case>,
    lookups: HashMap<ScopedTable, BTreeMap<i64, LookupRecord>>,
    next_id: i64,
}

impl RecordState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process [`RecordStore`]. Reads apply the same [`RegionScope`] rules as
/// the SQL predicate through [`retain_accessible`].
#[derive(Default)]
pub struct MemoryRecordStore {
    state: RwLock<RecordState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a case with a fixed id; `region_id` may be null for legacy rows.
    pub async fn add_case(&self, id: i64, region_id: Option<i32>, case_number: &str, title: &str) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(id);
        state.cases.insert(
            id,
            Case {
                id,
                region_id,
                case_number: case_number.to_string(),
                title: title.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    pub async fn add_lookup(&self, table: ScopedTable, id: i64, region_id: Option<i32>, name: &str) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(id);
        state
            .lookups
            .entry(table)
            .or_default()
            .insert(id, LookupRecord { id, region_id, name: name.to_string() });
    }

    pub async fn case(&self, id: i64) -> Option<Case> {
        self.state.read().await.cases.get(&id).cloned()
    }
}

fn page<T: Sortable>(records: Vec<T>, params: &ListParams) -> Result<Vec<T>, DatabaseError> {
    Ok(params.resolve::<T>()?.apply(records))
}

#[async_trait]
impl OwningRegionLookup for MemoryRecordStore {
    async fn owning_region(&self, table: ScopedTable, id: i64) -> Result<Option<Option<i32>>, AccessError> {
        let state = self.state.read().await;
        Ok(match table {
            ScopedTable::Cases => state.cases.get(&id).map(|c| c.region_id),
            other => state.lookups.get(&other).and_then(|rows| rows.get(&id)).map(|r| r.region_id),
        })
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_cases(&self, scope: &RegionScope, params: &ListParams) -> Result<Vec<Case>, DatabaseError> {
        let state = self.state.read().await;
        let visible = retain_accessible(state.cases.values().cloned(), scope);
        page(visible, params)
    }

    async fn count_cases(&self, scope: &RegionScope) -> Result<i64, DatabaseError> {
        let state = self.state.read().await;
        Ok(retain_accessible(state.cases.values().cloned(), scope).len() as i64)
    }

    async fn get_case(&self, scope: &RegionScope, id: i64) -> Result<Option<Case>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.cases.get(&id).filter(|c| scope.admits(c.region_id)).cloned())
    }

    async fn create_case(&self, region_id: i32, case: &NewCase) -> Result<Case, DatabaseError> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let created = Case {
            id,
            region_id: Some(region_id),
            case_number: case.case_number.clone(),
            title: case.title.clone(),
            created_at: Utc::now(),
        };
        state.cases.insert(id, created.clone());
        Ok(created)
    }

    async fn update_case(&self, id: i64, update: &CaseUpdate) -> Result<Option<Case>, DatabaseError> {
        let mut state = self.state.write().await;
        let Some(case) = state.cases.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(case_number) = &update.case_number {
            case.case_number = case_number.clone();
        }
        if let Some(title) = &update.title {
            case.title = title.clone();
        }
        if let Some(region_id) = update.region_id {
            case.region_id = Some(region_id);
        }
        Ok(Some(case.clone()))
    }

    async fn delete_case(&self, id: i64) -> Result<bool, DatabaseError> {
        Ok(self.state.write().await.cases.remove(&id).is_some())
    }

    async fn list_lookup(
        &self,
        table: ScopedTable,
        scope: &RegionScope,
        params: &ListParams,
    ) -> Result<Vec<LookupRecord>, DatabaseError> {
        lookup_table(table)?;
        let state = self.state.read().await;
        let rows = state.lookups.get(&table).map(|rows| rows.values().cloned().collect::<Vec<_>>()).unwrap_or_default();
        page(retain_accessible(rows, scope), params)
    }

    async fn get_lookup(
        &self,
        table: ScopedTable,
        scope: &RegionScope,
        id: i64,
    ) -> Result<Option<LookupRecord>, DatabaseError> {
        lookup_table(table)?;
        let state = self.state.read().await;
        Ok(state
            .lookups
            .get(&table)
            .and_then(|rows| rows.get(&id))
            .filter(|r| scope.admits(r.region_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RegionPolicy;

    #[tokio::test]
    async fn inactive_regions_are_not_accessible() {
        let store = MemoryAccessStore::new();
        store.add_region(5, "North", "north.test", true).await;
        store.add_region(8, "Closed", "closed.test", false).await;
        let user = store.add_user("ana", "pw").await.unwrap();
        store.add_membership(user, 5).await;
        store.add_membership(user, 8).await;

        assert_eq!(store.accessible_regions(user).await.unwrap(), BTreeSet::from([5]));
        store.set_region_active(5, false).await;
        assert!(store.accessible_regions(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_for_unknown_role_is_none() {
        let store = MemoryAccessStore::new();
        let update = PermissionUpdate {
            role: "Ghost".into(),
            section: Section::Chat,
            can_view: true,
            can_create: false,
            can_edit: false,
            can_delete: false,
        };
        assert!(store.upsert_role_permission(5, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryAccessStore::new();
        store.set_unavailable(true).await;
        assert!(store.find_user("ana").await.is_err());
    }

    #[tokio::test]
    async fn record_reads_honor_scope() {
        let records = MemoryRecordStore::new();
        records.add_case(1, Some(5), "C-1", "North case").await;
        records.add_case(2, Some(9), "C-2", "Foreign case").await;
        records.add_case(3, None, "C-3", "Legacy case").await;

        let strict = RegionScope::new([5, 7], RegionPolicy::MembersOnly);
        let ids: Vec<i64> = records.list_cases(&strict, &ListParams::default()).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1]);
        assert!(records.get_case(&strict, 2).await.unwrap().is_none());

        let global = RegionScope::new([5], RegionPolicy::MembersAndGlobal);
        assert_eq!(records.count_cases(&global).await.unwrap(), 2);

        let created = records.create_case(5, &NewCase { case_number: "C-4".into(), title: "New".into() }).await.unwrap();
        assert_eq!(created.id, 4);
    }
}
