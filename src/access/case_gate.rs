use async_trait::async_trait;
use std::sync::Arc;

use super::{AccessContext, AccessError, AuthzFailure, Rejection};

/// Region-scoped tables whose rows can be addressed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopedTable {
    Cases,
    Judges,
    CaseTypes,
}

impl ScopedTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            ScopedTable::Cases => "cases",
            ScopedTable::Judges => "judges",
            ScopedTable::CaseTypes => "case_types",
        }
    }
}

/// Direct owning-region lookup for one record.
#[async_trait]
pub trait OwningRegionLookup: Send + Sync {
    /// `None` when the record does not exist; `Some(None)` when it has no region.
    async fn owning_region(&self, table: ScopedTable, id: i64) -> Result<Option<Option<i32>>, AccessError>;
}

/// Checkpoint for operations that address a single record by id and so
/// never pass through a collection filter.
#[derive(Clone)]
pub struct CaseAccessGate {
    lookup: Arc<dyn OwningRegionLookup>,
}

impl CaseAccessGate {
    pub fn new(lookup: Arc<dyn OwningRegionLookup>) -> Self {
        Self { lookup }
    }

    /// Missing and out-of-scope records both surface as `NotFound`.
    pub async fn assert_case_access(
        &self,
        ctx: &AccessContext,
        table: ScopedTable,
        id: i64,
    ) -> Result<(), AuthzFailure> {
        match self.lookup.owning_region(table, id).await? {
            None => {
                tracing::debug!(
                    operation = %ctx.operation,
                    table = table.table_name(),
                    id,
                    "Record not found"
                );
                Err(Rejection::NotFound.into())
            }
            Some(region_id) if ctx.scope.admits(region_id) => Ok(()),
            Some(region_id) => {
                tracing::warn!(
                    operation = %ctx.operation,
                    table = table.table_name(),
                    id,
                    record_region = ?region_id,
                    user_id = ?ctx.principal.user_id,
                    "Cross-region record access refused"
                );
                Err(Rejection::NotFound.into())
            }
        }
    }
}
