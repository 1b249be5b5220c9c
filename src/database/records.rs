use async_trait::async_trait;

use crate::access::{OwningRegionLookup, RegionScope, ScopedTable};
use crate::database::manager::DatabaseError;
use crate::database::models::{Case, CaseUpdate, LookupRecord, NewCase};
use crate::filter::ListParams;

/// Region-scoped business records. Every read takes the caller's scope so
/// a record outside it is indistinguishable from a missing one.
#[async_trait]
pub trait RecordStore: OwningRegionLookup {
    async fn list_cases(&self, scope: &RegionScope, params: &ListParams) -> Result<Vec<Case>, DatabaseError>;

    async fn count_cases(&self, scope: &RegionScope) -> Result<i64, DatabaseError>;

    async fn get_case(&self, scope: &RegionScope, id: i64) -> Result<Option<Case>, DatabaseError>;

    async fn create_case(&self, region_id: i32, case: &NewCase) -> Result<Case, DatabaseError>;

    async fn update_case(&self, id: i64, update: &CaseUpdate) -> Result<Option<Case>, DatabaseError>;

    async fn delete_case(&self, id: i64) -> Result<bool, DatabaseError>;

    async fn list_lookup(
        &self,
        table: ScopedTable,
        scope: &RegionScope,
        params: &ListParams,
    ) -> Result<Vec<LookupRecord>, DatabaseError>;

    async fn get_lookup(
        &self,
        table: ScopedTable,
        scope: &RegionScope,
        id: i64,
    ) -> Result<Option<LookupRecord>, DatabaseError>;
}

/// Lookup tables only; cases have their own shape.
pub(crate) fn lookup_table(table: ScopedTable) -> Result<&'static str, DatabaseError> {
    match table {
        ScopedTable::Cases => Err(DatabaseError::QueryError("cases is not a lookup table".to_string())),
        other => Ok(other.table_name()),
    }
}
