use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::is_valid_identifier;
use super::predicate::Predicate;
use super::types::{FilterOrderInfo, Paging, SqlResult};

pub struct Filter {
    table_name: String,
    predicate: Predicate,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !is_valid_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(table_name));
        }
        Ok(Self {
            table_name,
            predicate: Predicate::True,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    /// Takes ordering and window from an already validated [`Paging`].
    pub fn page(&mut self, paging: &Paging) -> &mut Self {
        self.order_data = paging.order.clone();
        self.limit = paging.limit;
        self.offset = paging.offset;
        self
    }

    /// ANDs `predicate` onto the current condition. Restrictions only ever narrow.
    pub fn restrict(&mut self, predicate: Predicate) -> Result<&mut Self, FilterError> {
        predicate.validate()?;
        let current = std::mem::replace(&mut self.predicate, Predicate::True);
        self.predicate = current.and(predicate);
        Ok(self)
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut params = Vec::new();
        let where_clause = self.predicate.to_sql(&mut params);

        let query = [
            "SELECT *".to_string(),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let mut params = Vec::new();
        let where_clause = self.predicate.to_sql(&mut params);
        SqlResult {
            query: format!("SELECT COUNT(*) as count FROM \"{}\" WHERE {}", self.table_name, where_clause),
            params,
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
