//! Rendering adapter.
//!
//! Turns a [`ListParams`] into a [`ListQuery`] (the find/preload/select
//! request a storage layer executes), runs it against a [`ListStore`], and
//! applies the requested custom includes to the loaded records.
//!
//! [`ListQuery::select_statement`] assembles the same request as a SeaQuery
//! `SELECT` for stores that speak SQL directly.

use anyhow::Result;
use sea_query::{Alias, Expr, Order, PostgresQueryBuilder, Query, SelectStatement, Values};
use serde_json::Value;

use crate::error::{LoadError, SchemaError};
use crate::list_params::ListParams;
use crate::schema::RecordDescriptor;
use crate::types::{BindValue, Join};

/// Storage layer executing list queries.
pub trait ListStore {
    /// Run `query` and return the matching records, preloads attached.
    fn find(&self, query: &ListQuery) -> Result<Vec<Value>>;
}

/// Everything a storage layer needs to load one page of records.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub table: String,

    /// Qualified select columns, or `["*"]`.
    pub select: Vec<String>,

    pub joins: Vec<Join>,

    /// WHERE clause without the keyword; empty for no condition.
    pub where_clause: String,

    /// Positional arguments for the `?` placeholders of `where_clause`. A
    /// list argument fills one placeholder.
    pub arguments: Vec<BindValue>,

    /// ORDER BY parts, each `expression [ASC|DESC]`.
    pub order_by: Vec<String>,

    pub group_by: Option<String>,

    /// `None` when the page size is 0.
    pub limit: Option<u32>,

    pub offset: u32,

    /// Relations to eager-load, UpperCamelCase and dot-nested.
    pub preloads: Vec<String>,
}

impl ListQuery {
    /// Collect the rendered parts of `params` for `table`.
    pub fn from_params(params: &ListParams, table: &str) -> Result<Self, LoadError> {
        let (where_clause, arguments) = params.where_condition();
        let limit = match params.limit() {
            0 => None,
            size => Some(size),
        };

        Ok(Self {
            table: table.to_string(),
            select: transform_select_query(&params.select_query(), params.descriptor(), table)?,
            joins: params.joins().to_vec(),
            where_clause,
            arguments,
            order_by: params.order_by_parts()?,
            group_by: params.group_by().map(str::to_string),
            limit,
            offset: params.offset(),
            preloads: params.preloads(),
        })
    }

    /// Assemble a SeaQuery `SELECT`. Every list argument is expanded into
    /// one placeholder per element.
    pub fn select_statement(&self) -> SelectStatement {
        let mut query = Query::select();

        for column in &self.select {
            query.expr(Expr::cust(column.as_str()));
        }

        query.from(Alias::new(&self.table));

        for join in &self.joins {
            query.join(
                join.join_type.into(),
                Alias::new(&join.table),
                Expr::cust(join.on.as_str()),
            );
        }

        if !self.where_clause.is_empty() {
            let (sql, values) = expand_placeholders(&self.where_clause, &self.arguments);
            query.and_where(Expr::cust_with_values(sql, values));
        }

        if let Some(group_by) = &self.group_by {
            query.add_group_by([Expr::cust(group_by.as_str())]);
        }

        for part in &self.order_by {
            let (expr, order) = split_order_direction(part);
            query.order_by_expr(Expr::cust(expr), order);
        }

        if let Some(limit) = self.limit {
            query.limit(u64::from(limit));
        }
        query.offset(u64::from(self.offset));

        query
    }

    /// PostgreSQL statement with `$n` placeholders and its bound values.
    pub fn build_sql(&self) -> (String, Values) {
        self.select_statement().build(PostgresQueryBuilder)
    }

    /// PostgreSQL statement with values inlined, for logging.
    pub fn to_sql_string(&self) -> String {
        self.select_statement().to_string(PostgresQueryBuilder)
    }
}

/// Qualify select columns for `table`. `"*"` passes through; root fields
/// become `table.column`; `relation.field` is resolved through the
/// descriptor and prefixed with the related record's table.
pub fn transform_select_query(
    columns: &[String],
    descriptor: &RecordDescriptor,
    table: &str,
) -> Result<Vec<String>, SchemaError> {
    if columns.first().is_some_and(|column| column == "*") {
        return Ok(columns.to_vec());
    }
    columns
        .iter()
        .map(|column| transform_root_field(column, descriptor, table))
        .collect()
}

fn transform_root_field(
    field: &str,
    descriptor: &RecordDescriptor,
    table: &str,
) -> Result<String, SchemaError> {
    if field.contains('.') {
        transform_field(field, descriptor)
    } else {
        Ok(format!("{table}.{}", descriptor.column_for(field)?))
    }
}

/// `relation.[relation.]field`: walk the relations and qualify the column
/// with the innermost related table only.
fn transform_field(field: &str, descriptor: &RecordDescriptor) -> Result<String, SchemaError> {
    let mut segments: Vec<&str> = field.split('.').collect();
    let column = segments.pop().unwrap_or_default();

    let mut current = descriptor;
    for relation in segments {
        current = current.relation(relation)?;
    }
    Ok(format!("{}.{}", current.table_name(), current.column_for(column)?))
}

/// Split `expr DESC` into the expression and its direction. Parts without
/// a direction sort ascending.
fn split_order_direction(part: &str) -> (String, Order) {
    let trimmed = part.trim();
    let upper = trimmed.to_ascii_uppercase();
    if upper.ends_with(" DESC") {
        (trimmed[..trimmed.len() - 5].trim_end().to_string(), Order::Desc)
    } else if upper.ends_with(" ASC") {
        (trimmed[..trimmed.len() - 4].trim_end().to_string(), Order::Asc)
    } else {
        (trimmed.to_string(), Order::Asc)
    }
}

/// Rewrite the `?` placeholders of `sql` as numbered `$n` placeholders for
/// [`Expr::cust_with_values`] and flatten the arguments into SQL values. A
/// list argument becomes one placeholder per element, or `NULL` when empty.
///
/// Quoted literals are copied verbatim. `??` is a literal `?` (for
/// operators such as `?|`), a `$` starting a token is escaped as `$$`, and
/// a `?` with no argument left stays a literal `?`.
fn expand_placeholders(sql: &str, arguments: &[BindValue]) -> (String, Vec<sea_query::Value>) {
    let mut expanded = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut pending = arguments.iter();
    let mut chars = sql.chars().peekable();
    let mut quote = None;
    let mut in_word = false;

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            expanded.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    expanded.push(escaped);
                }
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                expanded.push(c);
            }
            '$' if !in_word => expanded.push_str("$$"),
            '?' if chars.peek() == Some(&'?') => {
                chars.next();
                expanded.push('?');
            }
            '?' => match pending.next() {
                Some(argument) => {
                    let first = values.len();
                    argument.collect_sql_values(&mut values);
                    if values.len() == first {
                        expanded.push_str("NULL");
                    } else {
                        let placeholders: Vec<String> =
                            (first + 1..=values.len()).map(|n| format!("${n}")).collect();
                        expanded.push_str(&placeholders.join(", "));
                    }
                }
                None => expanded.push('?'),
            },
            _ => expanded.push(c),
        }

        in_word = c.is_alphanumeric() || (in_word && matches!(c, '_' | '$'));
    }

    (expanded, values)
}

/// Loads lists through a [`ListStore`].
pub struct ListLoader<S> {
    store: S,
}

impl<S: ListStore> ListLoader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the records `params` describe from `table` into `records`,
    /// then run every requested custom include in registration order. The
    /// first failing include aborts the load.
    pub fn load_list(
        &self,
        records: &mut Vec<Value>,
        params: &ListParams,
        table: &str,
    ) -> Result<(), LoadError> {
        let query = ListQuery::from_params(params, table)?;
        tracing::debug!(table, sql = %query.to_sql_string(), "loading list");

        *records = self.store.find(&query).map_err(LoadError::Storage)?;

        for include in params.custom_includes_functions() {
            include.apply(records).map_err(|e| {
                tracing::error!(field = include.field(), error = %e, "custom include failed");
                LoadError::CustomInclude {
                    field: include.field().to_string(),
                    source: e,
                }
            })?;
        }

        tracing::debug!(table, records = records.len(), "list loaded");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn descriptors() -> RecordDescriptor {
        let author = RecordDescriptor::new("Author")
            .field(FieldDescriptor::new("Name", "name"))
            .field(FieldDescriptor::new("Email", "email").with_column("email_address"));
        RecordDescriptor::new("Post")
            .field(FieldDescriptor::new("ID", "id"))
            .field(FieldDescriptor::new("Title", "title"))
            .field(FieldDescriptor::new("Author", "author").with_relation(author))
    }

    fn columns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn star_passes_through() {
        let select = transform_select_query(&columns(&["*"]), &descriptors(), "posts").unwrap();
        assert_eq!(select, vec!["*"]);
    }

    #[test]
    fn root_and_nested_fields_are_qualified() {
        let select = transform_select_query(
            &columns(&["ID", "title", "author.Email"]),
            &descriptors(),
            "posts",
        )
        .unwrap();
        assert_eq!(
            select,
            vec!["posts.id", "posts.title", "authors.email_address"]
        );
    }

    #[test]
    fn unknown_field_fails() {
        let err = transform_select_query(&columns(&["views"]), &descriptors(), "posts")
            .unwrap_err();
        assert!(matches!(err, SchemaError::FieldNotFound { .. }));

        let err = transform_select_query(&columns(&["editor.name"]), &descriptors(), "posts")
            .unwrap_err();
        assert!(matches!(err, SchemaError::RelationNotFound { .. }));
    }

    #[test]
    fn order_direction_split() {
        assert_eq!(
            split_order_direction("posts.created_at DESC"),
            ("posts.created_at".to_string(), Order::Desc)
        );
        assert_eq!(
            split_order_direction("likes_count asc"),
            ("likes_count".to_string(), Order::Asc)
        );
        assert_eq!(
            split_order_direction("random()"),
            ("random()".to_string(), Order::Asc)
        );
    }

    #[test]
    fn list_arguments_expand_placeholders() {
        let arguments = vec![
            BindValue::from(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
            BindValue::from("x"),
        ];
        let (sql, values) = expand_placeholders("s IN (?) AND n = ?", &arguments);
        assert_eq!(sql, "s IN ($1, $2, $3) AND n = $4");
        assert_eq!(values.len(), 4);

        let (sql, values) = expand_placeholders("s IN (?)", &[BindValue::List(Vec::new())]);
        assert_eq!(sql, "s IN (NULL)");
        assert!(values.is_empty());
    }

    #[test]
    fn literals_are_not_placeholders() {
        let arguments = vec![BindValue::from("a"), BindValue::from("b")];
        let (sql, values) = expand_placeholders(
            "note = 'why?' AND tags ??| ? AND price_$ > $ AND name = ?",
            &arguments,
        );
        assert_eq!(
            sql,
            "note = 'why?' AND tags ?| $1 AND price_$ > $$ AND name = $2"
        );
        assert_eq!(values.len(), 2);

        let (sql, values) = expand_placeholders("a = ? OR b = ?", &arguments[..1]);
        assert_eq!(sql, "a = $1 OR b = ?");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn where_values_are_bound() {
        let query = ListQuery::from_params(
            &ListParams::from_query("filter[title]=it's?&filter[id:in]=1,2", descriptors()),
            "posts",
        )
        .unwrap();

        let (sql, values) = query.build_sql();
        assert!(sql.contains("WHERE (posts.title = $1) AND (posts.id IN ($2, $3))"));
        assert_eq!(
            values.0[..3],
            [
                sea_query::Value::from("it's?".to_string()),
                sea_query::Value::from("1".to_string()),
                sea_query::Value::from("2".to_string()),
            ]
        );
    }

    #[test]
    fn nested_relations_use_innermost_table() {
        let user = RecordDescriptor::new("User")
            .field(FieldDescriptor::new("Email", "email").with_column("email_address"));
        let comment = RecordDescriptor::new("Comment")
            .field(FieldDescriptor::new("Body", "body"))
            .field(FieldDescriptor::new("Author", "author").with_relation(user));
        let post = descriptors().field(FieldDescriptor::new("Comments", "comments").with_relation(comment));

        let select = transform_select_query(
            &columns(&["comments.body", "comments.author.email"]),
            &post,
            "posts",
        )
        .unwrap();
        assert_eq!(select, vec!["comments.body", "users.email_address"]);
    }

    #[test]
    fn statement_contains_every_part() {
        let mut params = ListParams::from_query(
            "filter[status:in]=draft,live&sort=-title&page[number]=2&page[size]=10",
            descriptors(),
        );
        params.add_left_join("authors", "authors.id = posts.author_id");
        params.set_group_by("posts.id");

        let query = ListQuery::from_params(&params, "posts").unwrap();
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, 10);

        let sql = query.to_sql_string();
        assert!(sql.contains("FROM \"posts\""));
        assert!(sql.contains("LEFT JOIN \"authors\" ON authors.id = posts.author_id"));
        assert!(sql.contains("posts.status IN ('draft', 'live')"));
        assert!(sql.contains("GROUP BY posts.id"));
        assert!(sql.contains("ORDER BY posts.title DESC"));
        assert!(sql.contains("LIMIT 10"));
        assert!(sql.contains("OFFSET 10"));

        let (sql, values) = query.build_sql();
        assert!(sql.contains("WHERE posts.status IN ($1, $2)"));
        assert!(sql.contains("LIMIT $3 OFFSET $4"));
        assert_eq!(values.0.len(), 4);
        assert_eq!(values.0[0], sea_query::Value::from("draft".to_string()));
    }

    #[test]
    fn zero_page_size_has_no_limit() {
        let params = ListParams::from_query("page[size]=0", descriptors());
        let query = ListQuery::from_params(&params, "posts").unwrap();
        assert_eq!(query.limit, None);
        assert!(!query.to_sql_string().contains("LIMIT"));
    }
}
