//! The list parameters engine.
//!
//! [`ListParams`] is built once per request from the raw query string and
//! the [`RecordDescriptor`] of the listed record type. The caller then
//! registers policy (allow-lists, custom hooks, joins), validates, and
//! reads the rendered SQL fragments.
//!
//! Wire grammar:
//! - `sort=name,-createdAt` (leading `-` means descending)
//! - `filter[field]=v1,v2` and `filter[field:op]=v1,v2`
//! - `include=author,comments.likes`
//! - `page[number]=N&page[size]=M` (size 0 means no limit)

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use url::form_urlencoded;

use crate::config::ListParamsConfig;
use crate::error::{RenderError, ValidationError};
use crate::extension::{
    CustomFilter, CustomInclude, CustomSorting, RegisteredFilter, RegisteredInclude,
    RegisteredSorting,
};
use crate::fields::Fields;
use crate::includes::{Includes, VALUE_DELIMITER};
use crate::operators::{Operator, parse_field_operator};
use crate::schema::{DescribeRecord, RecordDescriptor};
use crate::types::{
    BindValue, FieldOperatorPair, FilterListParameter, Join, JoinType, PaginationListParameter,
    SortingListParameter,
};

/// Separates a table name from a column name.
const TABLE_FIELD_DELIMITER: char = '.';

#[allow(clippy::expect_used)]
static FILTER_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^filter\[(.*)\]$").expect("filter key pattern is valid"));

/// What the caller has permitted.
#[derive(Debug, Default)]
struct AllowedListParams {
    sortings: Vec<String>,
    filters: Vec<FieldOperatorPair>,
    pagination: bool,
}

/// Parsed and validated list parameters for one request.
pub struct ListParams {
    /// Requested sortings, in encounter order.
    pub sortings: Vec<SortingListParameter>,

    /// Requested filters, in encounter order. A field may appear more than
    /// once.
    pub filters: Vec<FilterListParameter>,

    /// Requested includes and their policy.
    pub includes: Includes,

    pub pagination: PaginationListParameter,

    descriptor: RecordDescriptor,
    config: ListParamsConfig,
    allowed: AllowedListParams,
    custom_filters: Vec<RegisteredFilter>,
    custom_sortings: Vec<RegisteredSorting>,
    parse_errors: Vec<ValidationError>,
    joins: Vec<Join>,
    group_by: Option<String>,
}

impl ListParams {
    /// Empty parameters for a record type: no sortings, no filters, default
    /// pagination.
    pub fn new(descriptor: RecordDescriptor) -> Self {
        Self::with_config(descriptor, ListParamsConfig::default())
    }

    fn with_config(descriptor: RecordDescriptor, config: ListParamsConfig) -> Self {
        Self {
            sortings: Vec::new(),
            filters: Vec::new(),
            includes: Includes::new(),
            pagination: PaginationListParameter {
                page_number: config.default_page_number,
                page_size: config.default_page_size,
            },
            descriptor,
            config,
            allowed: AllowedListParams::default(),
            custom_filters: Vec::new(),
            custom_sortings: Vec::new(),
            parse_errors: Vec::new(),
            joins: Vec::new(),
            group_by: None,
        }
    }

    /// Parse a raw query string with the default configuration.
    pub fn from_query(query: &str, descriptor: RecordDescriptor) -> Self {
        Self::from_query_with_config(query, descriptor, &ListParamsConfig::default())
    }

    /// Parse a raw query string for a self-describing record type.
    pub fn for_record<T: DescribeRecord>(query: &str) -> Self {
        Self::from_query(query, T::describe())
    }

    /// Parse a raw query string. The query is unescaped twice; a malformed
    /// `%XX` escape in either pass, or invalid UTF-8, is recorded as
    /// [`ValidationError::InvalidQuery`] and leaves every parameter at its
    /// default.
    pub fn from_query_with_config(
        query: &str,
        descriptor: RecordDescriptor,
        config: &ListParamsConfig,
    ) -> Self {
        let mut params = Self::with_config(descriptor, config.clone());

        if !has_valid_escapes(query) {
            tracing::warn!(query, "list params: malformed escape in query string");
            params.parse_errors.push(ValidationError::InvalidQuery);
            return params;
        }

        let unescaped = match urlencoding::decode(query) {
            Ok(unescaped) => unescaped,
            Err(e) => {
                tracing::warn!(error = %e, "list params: query string could not be unescaped");
                params.parse_errors.push(ValidationError::InvalidQuery);
                return params;
            }
        };

        if !has_valid_escapes(&unescaped) {
            tracing::warn!(query, "list params: malformed escape in unescaped query string");
            params.parse_errors.push(ValidationError::InvalidQuery);
            return params;
        }

        let pairs: Vec<(String, String)> = form_urlencoded::parse(unescaped.as_bytes())
            .into_owned()
            .collect();

        params.set_sortings(&pairs);
        params.set_filters(&pairs);
        params.includes = Includes::from_pairs(&pairs);
        params.set_pagination(&pairs);

        tracing::debug!(
            record = params.descriptor.type_name(),
            sortings = params.sortings.len(),
            filters = params.filters.len(),
            includes = params.includes.requested().len(),
            page_number = params.pagination.page_number,
            page_size = params.pagination.page_size,
            "parsed list params"
        );

        params
    }

    fn set_sortings(&mut self, pairs: &[(String, String)]) {
        self.sortings = pairs
            .iter()
            .filter(|(key, _)| key == "sort")
            .flat_map(|(_, value)| value.split(VALUE_DELIMITER))
            .filter(|token| !token.is_empty())
            .map(SortingListParameter::from_token)
            .collect();
    }

    fn set_filters(&mut self, pairs: &[(String, String)]) {
        self.filters = pairs
            .iter()
            .filter_map(|(key, value)| {
                let captures = FILTER_KEY.captures(key)?;
                let (field, operator) = parse_field_operator(captures.get(1)?.as_str());
                Some(FilterListParameter::new(field, operator, split_values(value)))
            })
            .collect();
    }

    /// First `page[number]` / `page[size]` wins. Absent or malformed values
    /// fall back to the configured defaults.
    fn set_pagination(&mut self, pairs: &[(String, String)]) {
        let first = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.parse::<u32>().ok())
        };
        self.pagination = PaginationListParameter {
            page_number: first("page[number]").unwrap_or(self.config.default_page_number),
            page_size: first("page[size]").unwrap_or(self.config.default_page_size),
        };
    }

    // -- policy --------------------------------------------------------------

    /// Replace the filter allow-list. Entries are `"field"` (eq) or
    /// `"field:op"`; see [`crate::operators::filter_key`].
    pub fn allow_filters<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed.filters = fields
            .into_iter()
            .map(|entry| {
                let (field, operator) = parse_field_operator(entry.as_ref());
                FieldOperatorPair::new(field, operator)
            })
            .collect();
    }

    /// Replace the sorting allow-list.
    pub fn allow_sortings<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.sortings = fields.into_iter().map(Into::into).collect();
    }

    /// Replace the include allow-list.
    pub fn allow_includes<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.allow(fields);
    }

    pub fn allow_pagination(&mut self) {
        self.allowed.pagination = true;
    }

    /// Declare every field the record can expose.
    pub fn allow_select_fields(&mut self, fields: Fields) {
        self.includes.allow_select_fields(fields);
    }

    /// Restrict output to a sparse fieldset.
    pub fn select_fields(&mut self, fields: Fields) {
        self.includes.select_fields(fields);
    }

    /// Render filters on `field` with `filter` instead of the operator
    /// table.
    pub fn add_custom_filter(
        &mut self,
        field: impl Into<String>,
        filter: impl CustomFilter + 'static,
    ) {
        self.custom_filters.push(RegisteredFilter {
            field: field.into(),
            handler: Box::new(filter),
        });
    }

    /// Render sortings on `field` with `sorting`.
    pub fn add_custom_sorting(
        &mut self,
        field: impl Into<String>,
        sorting: impl CustomSorting + 'static,
    ) {
        self.custom_sortings.push(RegisteredSorting {
            field: field.into(),
            handler: Box::new(sorting),
        });
    }

    /// Resolve the `field` include with a post-load callback.
    pub fn add_custom_include(
        &mut self,
        field: impl Into<String>,
        include: impl CustomInclude + 'static,
    ) {
        self.includes.add_custom_includes(field, include);
    }

    /// Register a join. Adding an identical join twice is a no-op.
    pub fn add_join(
        &mut self,
        table: impl Into<String>,
        on: impl Into<String>,
        join_type: JoinType,
    ) {
        let join = Join::new(table, on, join_type);
        if !self.joins.contains(&join) {
            self.joins.push(join);
        }
    }

    pub fn add_left_join(&mut self, table: impl Into<String>, on: impl Into<String>) {
        self.add_join(table, on, JoinType::Left);
    }

    pub fn add_right_join(&mut self, table: impl Into<String>, on: impl Into<String>) {
        self.add_join(table, on, JoinType::Right);
    }

    pub fn add_inner_join(&mut self, table: impl Into<String>, on: impl Into<String>) {
        self.add_join(table, on, JoinType::Inner);
    }

    /// Append a filter manually. `operator` defaults to eq.
    pub fn add_filter(
        &mut self,
        field: impl Into<String>,
        values: Vec<String>,
        operator: Option<Operator>,
    ) {
        self.filters.push(FilterListParameter::new(
            field,
            operator.unwrap_or_default(),
            values,
        ));
    }

    pub fn set_group_by(&mut self, group_by: impl Into<String>) {
        self.group_by = Some(group_by.into());
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    // -- validation ----------------------------------------------------------

    /// Every rejected parameter, parse failures first. Never short-circuits.
    pub fn errors(&self) -> Vec<ValidationError> {
        let mut errors = self.parse_errors.clone();

        for sorting in &self.sortings {
            if !self.allowed.sortings.contains(&sorting.field) {
                errors.push(ValidationError::SortingNotAllowed {
                    field: sorting.field.clone(),
                });
            }
        }

        for filter in &self.filters {
            if !self.allowed.filters.contains(&filter.pair) {
                errors.push(ValidationError::FilterNotAllowed {
                    field: filter.field().to_string(),
                    operator: filter.operator(),
                });
            }
        }

        errors.extend(self.includes.errors());

        if !self.allowed.pagination && self.has_custom_pagination() {
            errors.push(ValidationError::PaginationNotAllowed);
        }

        errors
    }

    /// `Ok` when every requested parameter is allowed.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors = self.errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn has_custom_pagination(&self) -> bool {
        let page = self.pagination;
        page.page_number != self.config.default_page_number
            || (page.page_size != self.config.default_page_size && page.page_size != 0)
    }

    // -- rendering -----------------------------------------------------------

    /// WHERE clause (without the keyword) and its positional arguments.
    /// Filters rendering an empty fragment are omitted. When several
    /// fragments are AND-joined, each one not already enclosed in
    /// parentheses is wrapped, so an OR inside a fragment stays local.
    pub fn where_condition(&self) -> (String, Vec<BindValue>) {
        let mut parts = Vec::new();
        let mut arguments = Vec::new();

        for filter in &self.filters {
            let (part, args) = match self.custom_filter(filter.field()) {
                Some(custom) => {
                    let (part, value) = custom.build_condition(&filter.values, self);
                    (part, value.into_arguments())
                }
                None => self.condition_part_from_usual_filter(filter),
            };
            if part.is_empty() {
                continue;
            }
            parts.push(part);
            arguments.extend(args);
        }

        if parts.len() > 1 {
            for part in &mut parts {
                if !is_parenthesized(part) {
                    *part = format!("({part})");
                }
            }
        }

        (parts.join(" AND "), arguments)
    }

    /// Render one filter through the operator table, ignoring custom
    /// filters.
    pub fn condition_part_from_usual_filter(
        &self,
        filter: &FilterListParameter,
    ) -> (String, Vec<BindValue>) {
        let column = self.add_table_prefix(&self.transform_name(filter.field()));
        filter.operator().render(&column, &filter.values)
    }

    /// ORDER BY clause (without the keyword), parts joined with `,`.
    pub fn order_by_string(&self) -> Result<String, RenderError> {
        Ok(self.order_by_parts()?.join(","))
    }

    /// One `expression DIRECTION` part per sorting. A failing custom
    /// sorting aborts rendering.
    pub fn order_by_parts(&self) -> Result<Vec<String>, RenderError> {
        let mut parts = Vec::with_capacity(self.sortings.len());

        for sorting in &self.sortings {
            match self.custom_sorting(&sorting.field) {
                Some(custom) => {
                    let part = custom.build_order(sorting.direction, self).map_err(|e| {
                        tracing::warn!(
                            field = %sorting.field,
                            error = %e,
                            "custom sorting failed"
                        );
                        RenderError::CustomSorting {
                            field: sorting.field.clone(),
                            source: e,
                        }
                    })?;
                    parts.push(part);
                }
                None => {
                    let column = self.add_table_prefix(&self.transform_name(&sorting.field));
                    parts.push(format!("{column} {}", sorting.direction));
                }
            }
        }

        Ok(parts)
    }

    /// Every registered join, space-separated.
    pub fn join_condition(&self) -> String {
        self.joins
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Page size; 0 means no limit.
    pub fn limit(&self) -> u32 {
        self.pagination.page_size
    }

    pub fn offset(&self) -> u32 {
        self.pagination
            .page_size
            .saturating_mul(self.pagination.page_number.saturating_sub(1))
    }

    pub fn preloads(&self) -> Vec<String> {
        self.includes.preloads()
    }

    pub fn select_query(&self) -> Vec<String> {
        self.includes.select_query()
    }

    pub fn output_fields(&self) -> Fields {
        self.includes.output_fields()
    }

    pub fn custom_includes_functions(&self) -> Vec<&RegisteredInclude> {
        self.includes.custom_include_functions()
    }

    /// Storage column for a wire field name.
    pub fn transform_name(&self, wire_name: &str) -> String {
        self.descriptor.transform_name(wire_name)
    }

    /// Qualify an unqualified column with the record's table name.
    pub fn add_table_prefix(&self, column: &str) -> String {
        if column.contains(TABLE_FIELD_DELIMITER) {
            column.to_string()
        } else {
            format!(
                "{}{TABLE_FIELD_DELIMITER}{column}",
                self.descriptor.table_name()
            )
        }
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn descriptor(&self) -> &RecordDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ListParamsConfig {
        &self.config
    }

    fn custom_filter(&self, field: &str) -> Option<&dyn CustomFilter> {
        self.custom_filters
            .iter()
            .find(|custom| custom.field == field)
            .map(|custom| custom.handler.as_ref())
    }

    fn custom_sorting(&self, field: &str) -> Option<&dyn CustomSorting> {
        self.custom_sortings
            .iter()
            .find(|custom| custom.field == field)
            .map(|custom| custom.handler.as_ref())
    }
}

impl fmt::Debug for ListParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListParams")
            .field("record", &self.descriptor.type_name())
            .field("sortings", &self.sortings)
            .field("filters", &self.filters)
            .field("includes", &self.includes)
            .field("pagination", &self.pagination)
            .field("joins", &self.joins)
            .field("group_by", &self.group_by)
            .finish_non_exhaustive()
    }
}

/// Comma-split filter values, dropping empty entries.
fn split_values(value: &str) -> Vec<String> {
    value
        .split(VALUE_DELIMITER)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every `%` starts a two-digit hex escape.
fn has_valid_escapes(query: &str) -> bool {
    let bytes = query.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// True when `fragment` is one parenthesized group, as in `(a OR b)` but
/// not `(a) OR (b)`. Parentheses inside single-quoted literals are ignored.
fn is_parenthesized(fragment: &str) -> bool {
    let Some(inner) = fragment
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return false;
    };

    let mut depth = 0usize;
    let mut quoted = false;
    for c in inner.chars() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0 && !quoted
}
