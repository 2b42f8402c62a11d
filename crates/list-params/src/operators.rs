//! Filter operators and their SQL renderings.
//!
//! Every operator maps to a static rendering function that turns a column
//! and the raw filter values into a fragment with `?` placeholders plus the
//! bind arguments for those placeholders.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::BindValue;

/// Separates the field name from the operator in `filter[field:op]`.
pub const OPERATOR_DELIMITER: char = ':';

/// Comparison operators accepted in `filter[field:op]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal; several values are OR-joined.
    #[default]
    Eq,
    /// Not equal; several values are OR-joined.
    Neq,
    /// Less than; several values are AND-joined.
    Lt,
    /// Greater than; several values are AND-joined.
    Gt,
    /// Less than or equal; several values are AND-joined.
    Lte,
    /// Greater than or equal; several values are AND-joined.
    Gte,
    /// Value in list.
    In,
    /// Value not in list.
    Nin,
    /// Substring match on the first value (`LIKE %value%`).
    Like,
}

/// Renders a column and raw values into `(fragment, arguments)`.
type Operation = fn(&str, &[String]) -> (String, Vec<BindValue>);

/// Wire token, operator, rendering.
static OPERATORS: [(&str, Operator, Operation); 9] = [
    ("eq", Operator::Eq, render_eq),
    ("neq", Operator::Neq, render_neq),
    ("lt", Operator::Lt, render_lt),
    ("gt", Operator::Gt, render_gt),
    ("lte", Operator::Lte, render_lte),
    ("gte", Operator::Gte, render_gte),
    ("in", Operator::In, render_in),
    ("nin", Operator::Nin, render_nin),
    ("like", Operator::Like, render_like),
];

impl Operator {
    /// All known operators in table order.
    pub fn all() -> impl Iterator<Item = Operator> {
        OPERATORS.iter().map(|(_, op, _)| *op)
    }

    /// Resolve a wire token (`"gte"`). Unknown tokens yield `None`.
    pub fn from_token(token: &str) -> Option<Operator> {
        OPERATORS
            .iter()
            .find(|(name, _, _)| *name == token)
            .map(|(_, op, _)| *op)
    }

    pub fn as_str(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op, _)| *op == self)
            .map_or("eq", |(name, _, _)| *name)
    }

    /// Render `field <op> ?` for the given values.
    ///
    /// Returns an empty fragment when there is nothing to compare against;
    /// callers must omit such fragments.
    pub fn render(self, field: &str, values: &[String]) -> (String, Vec<BindValue>) {
        match OPERATORS.iter().find(|(_, op, _)| *op == self) {
            Some((_, _, operation)) => operation(field, values),
            None => (String::new(), Vec::new()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn render_eq(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    expression_template(field, "OR", "=", values)
}

// OR-joined like `eq`: with two or more distinct values this matches
// every non-NULL row.
fn render_neq(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    expression_template(field, "OR", "!=", values)
}

fn render_lt(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    expression_template(field, "AND", "<", values)
}

fn render_gt(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    expression_template(field, "AND", ">", values)
}

fn render_lte(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    expression_template(field, "AND", "<=", values)
}

fn render_gte(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    expression_template(field, "AND", ">=", values)
}

fn render_in(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    list_template(field, "IN", values)
}

fn render_nin(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    list_template(field, "NOT IN", values)
}

fn render_like(field: &str, values: &[String]) -> (String, Vec<BindValue>) {
    match values.first() {
        Some(value) => (
            format!("{field} LIKE ?"),
            vec![BindValue::Text(format!("%{value}%"))],
        ),
        None => (String::new(), Vec::new()),
    }
}

/// `field op ? <connector> field op ?`, one placeholder per value.
fn expression_template(
    field: &str,
    connector: &str,
    operator: &str,
    values: &[String],
) -> (String, Vec<BindValue>) {
    if values.is_empty() {
        return (String::new(), Vec::new());
    }
    let template = format!("{field} {operator} ?");
    let fragment = vec![template; values.len()].join(format!(" {connector} ").as_str());
    let arguments = values.iter().cloned().map(BindValue::Text).collect();
    (fragment, arguments)
}

/// `field IN (?)` with the whole value list as one expandable argument.
fn list_template(field: &str, operator: &str, values: &[String]) -> (String, Vec<BindValue>) {
    if values.is_empty() {
        return (String::new(), Vec::new());
    }
    (
        format!("{field} {operator} (?)"),
        vec![BindValue::from(values)],
    )
}

/// Build an allow-list entry `"field:op"`.
pub fn filter_key(field: &str, operator: Operator) -> String {
    format!("{field}{OPERATOR_DELIMITER}{operator}")
}

pub fn filter_eq(field: &str) -> String {
    filter_key(field, Operator::Eq)
}

pub fn filter_neq(field: &str) -> String {
    filter_key(field, Operator::Neq)
}

pub fn filter_lt(field: &str) -> String {
    filter_key(field, Operator::Lt)
}

pub fn filter_gt(field: &str) -> String {
    filter_key(field, Operator::Gt)
}

pub fn filter_lte(field: &str) -> String {
    filter_key(field, Operator::Lte)
}

pub fn filter_gte(field: &str) -> String {
    filter_key(field, Operator::Gte)
}

pub fn filter_in(field: &str) -> String {
    filter_key(field, Operator::In)
}

pub fn filter_nin(field: &str) -> String {
    filter_key(field, Operator::Nin)
}

pub fn filter_like(field: &str) -> String {
    filter_key(field, Operator::Like)
}

/// Split `"field:op"` into its parts. A missing or unknown operator
/// defaults to `eq`; the field name is kept either way.
pub fn parse_field_operator(value: &str) -> (String, Operator) {
    let mut parts = value.split(OPERATOR_DELIMITER);
    let field = parts.next().unwrap_or_default().to_string();
    let operator = parts
        .next()
        .and_then(Operator::from_token)
        .unwrap_or_default();
    (field, operator)
}
