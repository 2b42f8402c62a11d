//! Built-in custom filters.
//!
//! Register these with [`ListParams::add_custom_filter`] for fields whose
//! wire values need translating before they reach the column, e.g.
//! `filter[active]=true` against a `TINYINT` column.
//!
//! Every filter renders an empty fragment when no value was supplied, so
//! the engine omits it.

use crate::extension::CustomFilter;
use crate::list_params::ListParams;
use crate::types::BindValue;

// ---------------------------------------------------------------------------
// BoolFilter
// ---------------------------------------------------------------------------

/// `column = ?` bound to `"1"` when the first value is `true`, `"0"`
/// otherwise.
#[derive(Debug, Clone)]
pub struct BoolFilter {
    column: String,
}

impl BoolFilter {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl CustomFilter for BoolFilter {
    fn build_condition(&self, values: &[String], _params: &ListParams) -> (String, BindValue) {
        let Some(first) = values.first() else {
            return (String::new(), BindValue::List(Vec::new()));
        };
        let value = if first == "true" { "1" } else { "0" };
        (format!("{} = ?", self.column), BindValue::from(value))
    }
}

// ---------------------------------------------------------------------------
// DateFromFilter / DateToFilter
// ---------------------------------------------------------------------------

/// Inclusive lower bound: `column >= ?` on the first value.
#[derive(Debug, Clone)]
pub struct DateFromFilter {
    column: String,
}

impl DateFromFilter {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl CustomFilter for DateFromFilter {
    fn build_condition(&self, values: &[String], _params: &ListParams) -> (String, BindValue) {
        first_value_condition(&self.column, ">=", values)
    }
}

/// Exclusive upper bound: `column < ?` on the first value.
#[derive(Debug, Clone)]
pub struct DateToFilter {
    column: String,
}

impl DateToFilter {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl CustomFilter for DateToFilter {
    fn build_condition(&self, values: &[String], _params: &ListParams) -> (String, BindValue) {
        first_value_condition(&self.column, "<", values)
    }
}

fn first_value_condition(column: &str, operator: &str, values: &[String]) -> (String, BindValue) {
    match values.first() {
        Some(value) => (
            format!("{column} {operator} ?"),
            BindValue::from(value.as_str()),
        ),
        None => (String::new(), BindValue::List(Vec::new())),
    }
}

// ---------------------------------------------------------------------------
// ContainsFilter
// ---------------------------------------------------------------------------

/// Substring match on any value: `(column LIKE ? OR column LIKE ?)`, one
/// `%value%` argument per value.
#[derive(Debug, Clone)]
pub struct ContainsFilter {
    column: String,
}

impl ContainsFilter {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl CustomFilter for ContainsFilter {
    fn build_condition(&self, values: &[String], _params: &ListParams) -> (String, BindValue) {
        if values.is_empty() {
            return (String::new(), BindValue::List(Vec::new()));
        }

        let conditions: Vec<String> = values
            .iter()
            .map(|_| format!("{} LIKE ?", self.column))
            .collect();
        let patterns = values
            .iter()
            .map(|value| BindValue::Text(format!("%{value}%")))
            .collect();

        (
            format!("({})", conditions.join(" OR ")),
            BindValue::List(patterns),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::RecordDescriptor;

    fn params() -> ListParams {
        ListParams::new(RecordDescriptor::new("User"))
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bool_filter_maps_true_to_one() {
        let filter = BoolFilter::new("users.active");
        let (sql, value) = filter.build_condition(&values(&["true"]), &params());
        assert_eq!(sql, "users.active = ?");
        assert_eq!(value, BindValue::from("1"));

        let (_, value) = filter.build_condition(&values(&["yes"]), &params());
        assert_eq!(value, BindValue::from("0"));
    }

    #[test]
    fn date_bounds_use_first_value() {
        let from = DateFromFilter::new("orders.created_at");
        let (sql, value) =
            from.build_condition(&values(&["2024-01-01", "2025-01-01"]), &params());
        assert_eq!(sql, "orders.created_at >= ?");
        assert_eq!(value, BindValue::from("2024-01-01"));

        let to = DateToFilter::new("orders.created_at");
        let (sql, _) = to.build_condition(&values(&["2024-02-01"]), &params());
        assert_eq!(sql, "orders.created_at < ?");
    }

    #[test]
    fn contains_filter_or_joins_patterns() {
        let filter = ContainsFilter::new("users.name");
        let (sql, value) = filter.build_condition(&values(&["ann", "bo"]), &params());
        assert_eq!(sql, "(users.name LIKE ? OR users.name LIKE ?)");
        assert_eq!(
            value,
            BindValue::List(vec![BindValue::from("%ann%"), BindValue::from("%bo%")])
        );
    }

    #[test]
    fn no_values_render_nothing() {
        let empty: Vec<String> = Vec::new();
        let p = params();
        assert!(BoolFilter::new("a").build_condition(&empty, &p).0.is_empty());
        assert!(DateFromFilter::new("a").build_condition(&empty, &p).0.is_empty());
        assert!(DateToFilter::new("a").build_condition(&empty, &p).0.is_empty());
        assert!(ContainsFilter::new("a").build_condition(&empty, &p).0.is_empty());
    }
}
