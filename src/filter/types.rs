use serde::Deserialize;
use std::cmp::Ordering;

use super::error::FilterError;
use super::filter_order::FilterOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Record type that can be listed with an `order` parameter.
///
/// `compare_by` must order like Postgres does: NULLs after every value ascending.
pub trait Sortable {
    const COLUMNS: &'static [&'static str];

    fn compare_by(&self, other: &Self, column: &str) -> Ordering;
}

/// `None` sorts last, matching Postgres' default for ascending order.
pub fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

/// List parameters accepted from the query string of collection endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub order: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl ListParams {
    /// Validates against `T`'s sortable columns and applies the configured limit cap.
    /// Without an explicit order, rows come back by `id`.
    pub fn resolve<T: Sortable>(&self) -> Result<Paging, FilterError> {
        let mut order = match self.order.as_deref() {
            Some(spec) => FilterOrder::parse(spec)?,
            None => Vec::new(),
        };
        if let Some(unknown) = order.iter().find(|info| !T::COLUMNS.contains(&info.column.as_str())) {
            return Err(FilterError::InvalidColumn(unknown.column.clone()));
        }
        if order.is_empty() {
            order.push(FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc });
        }

        if matches!(self.limit, Some(limit) if limit < 0) {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if matches!(self.offset, Some(offset) if offset < 0) {
            return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
        }

        let max_limit = crate::config::CONFIG.filter.max_limit;
        let limit = match (self.limit, max_limit) {
            (Some(limit), Some(max)) if limit > max => {
                if crate::config::CONFIG.filter.debug_logging {
                    tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max);
                }
                Some(max)
            }
            (limit, _) => limit,
        };

        Ok(Paging { order, limit, offset: self.offset.filter(|offset| *offset > 0) })
    }
}

/// Validated ordering and window of a list request, shared by every backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Paging {
    pub order: Vec<FilterOrderInfo>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl Paging {
    /// Sorts, then skips `offset` and keeps at most `limit`.
    pub fn apply<T: Sortable>(&self, mut records: Vec<T>) -> Vec<T> {
        records.sort_by(|a, b| {
            self.order.iter().fold(Ordering::Equal, |acc, info| {
                acc.then_with(|| {
                    let ord = a.compare_by(b, &info.column);
                    match info.sort {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
            })
        });
        let offset = self.offset.unwrap_or(0) as usize;
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        records.into_iter().skip(offset).take(limit).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        region_id: Option<i32>,
    }

    impl Sortable for Row {
        const COLUMNS: &'static [&'static str] = &["id", "region_id"];

        fn compare_by(&self, other: &Self, column: &str) -> Ordering {
            match column {
                "region_id" => nulls_last(&self.region_id, &other.region_id),
                _ => self.id.cmp(&other.id),
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: 3, region_id: None },
            Row { id: 1, region_id: Some(7) },
            Row { id: 2, region_id: Some(5) },
        ]
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn offset_applies_without_limit() {
        let params = ListParams { offset: Some(1), ..Default::default() };
        let paging = params.resolve::<Row>().unwrap();
        assert_eq!(paging.limit, None);
        assert_eq!(paging.offset, Some(1));
        assert_eq!(ids(&paging.apply(rows())), vec![2, 3]);
    }

    #[test]
    fn defaults_to_id_order() {
        let paging = ListParams::default().resolve::<Row>().unwrap();
        assert_eq!(paging.order, vec![FilterOrderInfo { column: "id".into(), sort: SortDirection::Asc }]);
        assert_eq!(ids(&paging.apply(rows())), vec![1, 2, 3]);
    }

    #[test]
    fn nulls_sort_last_ascending_and_first_descending() {
        let asc = ListParams { order: Some("region_id".into()), ..Default::default() };
        assert_eq!(ids(&asc.resolve::<Row>().unwrap().apply(rows())), vec![2, 1, 3]);

        let desc = ListParams { order: Some("region_id desc".into()), ..Default::default() };
        assert_eq!(ids(&desc.resolve::<Row>().unwrap().apply(rows())), vec![3, 1, 2]);
    }

    #[test]
    fn unknown_order_column_and_negative_window_are_rejected() {
        let unknown = ListParams { order: Some("password_hash".into()), ..Default::default() };
        assert!(matches!(unknown.resolve::<Row>(), Err(FilterError::InvalidColumn(c)) if c == "password_hash"));

        let negative = ListParams { offset: Some(-1), ..Default::default() };
        assert!(matches!(negative.resolve::<Row>(), Err(FilterError::InvalidOffset(_))));
    }
}
