use serde_json::Value;

use super::error::FilterError;
use super::is_valid_identifier;

/// Composable WHERE-clause predicate.
///
/// Rendering is deterministic and appends bound values to the caller's
/// parameter list, numbering placeholders `$n` from the list's current length.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    Eq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull(column.into())
    }

    /// Conjunction that collapses trivially true/false members.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::False, _) | (_, Predicate::False) => Predicate::False,
            (Predicate::True, p) | (p, Predicate::True) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::True, _) | (_, Predicate::True) => Predicate::True,
            (Predicate::False, p) | (p, Predicate::False) => p,
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (a, b) => Predicate::Or(vec![a, b]),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        match self {
            Predicate::True | Predicate::False => Ok(()),
            Predicate::Eq(column, _)
            | Predicate::In(column, _)
            | Predicate::IsNull(column)
            | Predicate::IsNotNull(column) => {
                if is_valid_identifier(column) {
                    Ok(())
                } else {
                    Err(FilterError::InvalidColumn(column.clone()))
                }
            }
            Predicate::And(parts) | Predicate::Or(parts) => parts.iter().try_for_each(Predicate::validate),
        }
    }

    pub fn to_sql(&self, params: &mut Vec<Value>) -> String {
        match self {
            Predicate::True => "1=1".to_string(),
            Predicate::False => "1=0".to_string(),
            Predicate::Eq(column, value) => {
                if value.is_null() {
                    format!("\"{}\" IS NULL", column)
                } else {
                    format!("\"{}\" = {}", column, push_param(params, value.clone()))
                }
            }
            Predicate::In(column, values) => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let placeholders: Vec<String> = values.iter().map(|v| push_param(params, v.clone())).collect();
                format!("\"{}\" IN ({})", column, placeholders.join(", "))
            }
            Predicate::IsNull(column) => format!("\"{}\" IS NULL", column),
            Predicate::IsNotNull(column) => format!("\"{}\" IS NOT NULL", column),
            Predicate::And(parts) => join_parts(parts, " AND ", "1=1", params),
            Predicate::Or(parts) => join_parts(parts, " OR ", "1=0", params),
        }
    }
}

fn join_parts(parts: &[Predicate], joiner: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts.iter().map(|p| format!("({})", p.to_sql(params))).collect();
    rendered.join(joiner)
}

fn push_param(params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    format!("${}", params.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_in_list_with_numbered_params() {
        let mut params = vec![json!("already-bound")];
        let sql = Predicate::in_list("region_id", [5, 7]).to_sql(&mut params);
        assert_eq!(sql, "\"region_id\" IN ($2, $3)");
        assert_eq!(params, vec![json!("already-bound"), json!(5), json!(7)]);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut params = vec![];
        let sql = Predicate::In("region_id".into(), vec![]).to_sql(&mut params);
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn and_collapses_constants() {
        let p = Predicate::True.and(Predicate::is_not_null("region_id"));
        assert_eq!(p, Predicate::is_not_null("region_id"));
        let p = Predicate::is_not_null("region_id").and(Predicate::False);
        assert_eq!(p, Predicate::False);
    }

    #[test]
    fn nested_groups_are_parenthesised() {
        let p = Predicate::is_null("region_id")
            .or(Predicate::in_list("region_id", [0, 5]))
            .and(Predicate::eq("id", 42));
        let mut params = vec![];
        assert_eq!(
            p.to_sql(&mut params),
            "((\"region_id\" IS NULL) OR (\"region_id\" IN ($1, $2))) AND (\"id\" = $3)"
        );
    }

    #[test]
    fn rejects_unsafe_columns() {
        assert!(Predicate::eq("region_id; drop", 1).validate().is_err());
        assert!(Predicate::is_null("region_id").or(Predicate::eq("id", 1)).validate().is_ok());
    }
}
