//! List parameters for REST list endpoints.
//!
//! Translates JSON:API-style query strings (`sort`, `filter[...]`,
//! `include`, `page[...]`) into a validated [`ListParams`] value and
//! renders it as SQL fragments (WHERE, ORDER BY, JOIN, SELECT) plus a
//! tree of fields to serialize.
//!
//! Typical flow:
//! 1. [`ListParams::from_query`] parses the raw query string.
//! 2. The caller registers policy: `allow_*`, `add_custom_*`, `add_join`.
//! 3. [`ListParams::validate`] reports every disallowed parameter.
//! 4. [`ListLoader::load_list`] runs the query against a [`ListStore`].

pub mod adapter;
pub mod config;
pub mod error;
pub mod extension;
pub mod fields;
pub mod handlers;
pub mod includes;
pub mod list_params;
pub mod operators;
pub mod schema;
pub mod types;

pub use adapter::{ListLoader, ListQuery, ListStore};
pub use config::ListParamsConfig;
pub use error::{LoadError, RenderError, SchemaError, ValidationError};
pub use extension::{CustomFilter, CustomInclude, CustomSorting, RegisteredInclude};
pub use fields::{FieldNode, Fields};
pub use handlers::{BoolFilter, ContainsFilter, DateFromFilter, DateToFilter};
pub use includes::Includes;
pub use list_params::ListParams;
pub use operators::Operator;
pub use schema::{DescribeRecord, FieldDescriptor, RecordDescriptor};
pub use types::{
    BindValue, FieldOperatorPair, FilterListParameter, Join, JoinType, PaginationListParameter,
    SortDirection, SortingListParameter,
};
