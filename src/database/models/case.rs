use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;

use crate::access::RegionScoped;
use crate::filter::{nulls_last, Sortable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Case {
    pub id: i64,
    pub region_id: Option<i32>,
    pub case_number: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl RegionScoped for Case {
    fn region_id(&self) -> Option<i32> {
        self.region_id
    }
}

impl Sortable for Case {
    const COLUMNS: &'static [&'static str] = &["id", "region_id", "case_number", "title", "created_at"];

    fn compare_by(&self, other: &Self, column: &str) -> Ordering {
        match column {
            "region_id" => nulls_last(&self.region_id, &other.region_id),
            "case_number" => self.case_number.cmp(&other.case_number),
            "title" => self.title.cmp(&other.title),
            "created_at" => self.created_at.cmp(&other.created_at),
            _ => self.id.cmp(&other.id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCase {
    pub case_number: String,
    pub title: String,
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseUpdate {
    pub case_number: Option<String>,
    pub title: Option<String>,
    pub region_id: Option<i32>,
}
