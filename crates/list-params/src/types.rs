//! List parameter types.
//!
//! Provides the data model shared by the parser and the renderers:
//! - FilterListParameter / SortingListParameter / PaginationListParameter
//! - BindValue: positional bind arguments for rendered SQL
//! - Join: manually registered JOIN clauses

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::operators::Operator;

/// Page number used when `page[number]` is absent or malformed.
pub const DEFAULT_PAGE_NUMBER: u32 = 1;

/// Page size used when `page[size]` is absent or malformed.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A filterable field together with its comparison operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldOperatorPair {
    /// Field name as presented on the wire. Nested models use
    /// `relation.field`.
    pub field: String,

    /// Comparison operator.
    pub operator: Operator,
}

impl FieldOperatorPair {
    pub fn new(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
        }
    }
}

/// One requested filter: `filter[field:op]=v1,v2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterListParameter {
    #[serde(flatten)]
    pub pair: FieldOperatorPair,

    /// Raw values in the order they were supplied.
    pub values: Vec<String>,
}

impl FilterListParameter {
    pub fn new(field: impl Into<String>, operator: Operator, values: Vec<String>) -> Self {
        Self {
            pair: FieldOperatorPair::new(field, operator),
            values,
        }
    }

    pub fn field(&self) -> &str {
        &self.pair.field
    }

    pub fn operator(&self) -> Operator {
        self.pair.operator
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn is_desc(self) -> bool {
        self == SortDirection::Desc
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested sorting: `sort=field` or `sort=-field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingListParameter {
    pub field: String,
    pub direction: SortDirection,
}

impl SortingListParameter {
    /// Parse a single wire token. A leading `-` means descending.
    pub fn from_token(token: &str) -> Self {
        match token.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                direction: SortDirection::Desc,
            },
            None => Self {
                field: token.to_string(),
                direction: SortDirection::Asc,
            },
        }
    }
}

/// Requested page. A page size of 0 means "no limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationListParameter {
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for PaginationListParameter {
    fn default() -> Self {
        Self {
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// SQL join types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    #[default]
    Left,
    Right,
    Inner,
}

impl JoinType {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Inner => "INNER",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JoinType> for sea_query::JoinType {
    fn from(join_type: JoinType) -> Self {
        match join_type {
            JoinType::Left => sea_query::JoinType::LeftJoin,
            JoinType::Right => sea_query::JoinType::RightJoin,
            JoinType::Inner => sea_query::JoinType::InnerJoin,
        }
    }
}

/// Manually registered JOIN. Two joins are the same join when every
/// component matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub on: String,
    pub join_type: JoinType,
}

impl Join {
    pub fn new(table: impl Into<String>, on: impl Into<String>, join_type: JoinType) -> Self {
        Self {
            table: table.into(),
            on: on.into(),
            join_type,
        }
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} JOIN {} ON {}", self.join_type, self.table, self.on)
    }
}

/// Positional bind argument for a rendered `?` placeholder.
///
/// A `List` bound to a single placeholder is expanded by the storage
/// layer (`IN (?)` becomes `IN (?, ?, ?)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    /// String value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// List of values, bound to one expandable placeholder.
    List(Vec<BindValue>),
}

impl BindValue {
    /// Return the value as a string slice if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BindValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Split a value into positional arguments: a list contributes one
    /// argument per element, anything else contributes itself.
    pub fn into_arguments(self) -> Vec<BindValue> {
        match self {
            BindValue::List(items) => items,
            other => vec![other],
        }
    }

    /// Collect scalar SQL values, flattening nested lists.
    pub(crate) fn collect_sql_values(&self, out: &mut Vec<sea_query::Value>) {
        match self {
            BindValue::Text(s) => out.push(sea_query::Value::from(s.clone())),
            BindValue::Integer(i) => out.push(sea_query::Value::from(*i)),
            BindValue::Boolean(b) => out.push(sea_query::Value::from(*b)),
            BindValue::List(items) => {
                for item in items {
                    item.collect_sql_values(out);
                }
            }
        }
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(value.to_string())
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(value)
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Integer(value)
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Boolean(value)
    }
}

impl From<Vec<String>> for BindValue {
    fn from(values: Vec<String>) -> Self {
        BindValue::List(values.into_iter().map(BindValue::Text).collect())
    }
}

impl From<&[String]> for BindValue {
    fn from(values: &[String]) -> Self {
        BindValue::List(values.iter().cloned().map(BindValue::Text).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sorting_token_direction() {
        let desc = SortingListParameter::from_token("-createdAt");
        assert_eq!(desc.field, "createdAt");
        assert_eq!(desc.direction, SortDirection::Desc);

        let asc = SortingListParameter::from_token("name");
        assert_eq!(asc.field, "name");
        assert_eq!(asc.direction, SortDirection::Asc);
    }

    #[test]
    fn pagination_defaults() {
        let page = PaginationListParameter::default();
        assert_eq!(page.page_number, 1);
        assert_eq!(page.page_size, 20);
    }

    #[test]
    fn join_renders_clause() {
        let join = Join::new("orders", "orders.id = users.order_id", JoinType::Inner);
        assert_eq!(
            join.to_string(),
            "INNER JOIN orders ON orders.id = users.order_id"
        );
    }

    #[test]
    fn list_value_splits_into_arguments() {
        let list = BindValue::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            list.into_arguments(),
            vec![BindValue::from("a"), BindValue::from("b")]
        );
        assert_eq!(BindValue::from(3).into_arguments(), vec![BindValue::Integer(3)]);
    }

    #[test]
    fn bind_value_serialization() {
        let value = BindValue::List(vec![BindValue::from("x"), BindValue::from(true)]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["x",true]"#);

        let parsed: BindValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn filter_parameter_serialization_flattens_pair() {
        let filter = FilterListParameter::new("status", Operator::In, vec!["a".to_string()]);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["field"], "status");
        assert_eq!(json["operator"], "in");
        assert_eq!(json["values"][0], "a");
    }
}
