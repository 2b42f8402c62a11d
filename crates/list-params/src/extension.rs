//! Custom filter, sorting, and include hooks.
//!
//! A custom hook registered for a field replaces the default handling of
//! that field entirely: filters and sortings render their own SQL, and
//! includes are resolved by a post-load callback instead of a preload.
//! Closures with the matching signature implement the traits directly.

use anyhow::Result;
use serde_json::Value;
use std::fmt;

use crate::list_params::ListParams;
use crate::types::{BindValue, SortDirection};

/// Renders the WHERE fragment for one filtered field.
pub trait CustomFilter: Send + Sync {
    /// Build `(fragment, value)` for the raw filter values. A
    /// [`BindValue::List`] contributes one positional argument per element;
    /// any other value is a single argument. An empty fragment omits the
    /// filter. Write a literal `?` (as in the `?|` operator) as `??`.
    fn build_condition(&self, values: &[String], params: &ListParams) -> (String, BindValue);
}

impl<F> CustomFilter for F
where
    F: Fn(&[String], &ListParams) -> (String, BindValue) + Send + Sync,
{
    fn build_condition(&self, values: &[String], params: &ListParams) -> (String, BindValue) {
        self(values, params)
    }
}

/// Renders the ORDER BY fragment for one sorted field, direction included.
pub trait CustomSorting: Send + Sync {
    fn build_order(&self, direction: SortDirection, params: &ListParams) -> Result<String>;
}

impl<F> CustomSorting for F
where
    F: Fn(SortDirection, &ListParams) -> Result<String> + Send + Sync,
{
    fn build_order(&self, direction: SortDirection, params: &ListParams) -> Result<String> {
        self(direction, params)
    }
}

/// Post-load callback that fills one included field on every loaded record.
pub trait CustomInclude: Send + Sync {
    fn apply(&self, records: &mut [Value]) -> Result<()>;
}

impl<F> CustomInclude for F
where
    F: Fn(&mut [Value]) -> Result<()> + Send + Sync,
{
    fn apply(&self, records: &mut [Value]) -> Result<()> {
        self(records)
    }
}

/// A custom include bound to the include name it serves.
pub struct RegisteredInclude {
    field: String,
    handler: Box<dyn CustomInclude>,
}

impl RegisteredInclude {
    pub fn new(field: impl Into<String>, handler: impl CustomInclude + 'static) -> Self {
        Self {
            field: field.into(),
            handler: Box::new(handler),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn apply(&self, records: &mut [Value]) -> Result<()> {
        self.handler.apply(records)
    }
}

impl fmt::Debug for RegisteredInclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredInclude")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

pub(crate) struct RegisteredFilter {
    pub(crate) field: String,
    pub(crate) handler: Box<dyn CustomFilter>,
}

pub(crate) struct RegisteredSorting {
    pub(crate) field: String,
    pub(crate) handler: Box<dyn CustomSorting>,
}
