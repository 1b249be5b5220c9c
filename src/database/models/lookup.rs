use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;

use crate::access::RegionScoped;
use crate::filter::{nulls_last, Sortable};

/// Region-scoped reference data row (judges, case types).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LookupRecord {
    pub id: i64,
    pub region_id: Option<i32>,
    pub name: String,
}

impl RegionScoped for LookupRecord {
    fn region_id(&self) -> Option<i32> {
        self.region_id
    }
}

impl Sortable for LookupRecord {
    const COLUMNS: &'static [&'static str] = &["id", "region_id", "name"];

    fn compare_by(&self, other: &Self, column: &str) -> Ordering {
        match column {
            "region_id" => nulls_last(&self.region_id, &other.region_id),
            "name" => self.name.cmp(&other.name),
            _ => self.id.cmp(&other.id),
        }
    }
}
