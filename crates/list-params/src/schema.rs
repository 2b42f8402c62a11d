//! Record descriptors.
//!
//! A [`RecordDescriptor`] declares how a record type is exposed: for every
//! field its in-memory name, its wire name, and an optional storage column,
//! plus an optional explicit table name. List parameters use it to turn
//! API-facing names into column names.

use heck::ToSnakeCase;
use std::sync::Arc;

use crate::error::SchemaError;

/// One declared field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// In-memory name (e.g. `CreatedAt` or `created_at`).
    pub name: String,

    /// Name used on the wire (e.g. `createdAt`).
    pub wire_name: String,

    /// Explicit storage column, overriding the snake_case default.
    pub column: Option<String>,

    /// Descriptor of the related record when this field is a relation.
    pub relation: Option<Arc<RecordDescriptor>>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, wire_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wire_name: wire_name.into(),
            column: None,
            relation: None,
        }
    }

    /// Set an explicit storage column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Mark this field as a relation to another record type.
    pub fn with_relation(mut self, related: impl Into<Arc<RecordDescriptor>>) -> Self {
        self.relation = Some(related.into());
        self
    }

    /// Storage column: the explicit override, else the snake_cased name.
    pub fn column_name(&self) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| self.name.to_snake_case())
    }
}

/// Statically declared shape of a record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDescriptor {
    type_name: String,
    table_name: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Set an explicit table name instead of the pluralized type name.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Append a field declaration.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Table name: the explicit one, else the snake_cased plural of the
    /// type name (`BlogPost` -> `blog_posts`).
    pub fn table_name(&self) -> String {
        match &self.table_name {
            Some(table_name) => table_name.clone(),
            None => pluralizer::pluralize(&self.type_name.to_snake_case(), 2, false),
        }
    }

    /// Look up a field by its wire name.
    pub fn find_by_wire_name(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.wire_name == wire_name)
    }

    /// Look up a field by its in-memory name.
    pub fn find_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Storage column for a wire name. Never fails: unknown names are
    /// snake_cased segment by segment, so `orderItems.unitPrice` keeps its
    /// qualifier as `order_items.unit_price`.
    pub fn transform_name(&self, wire_name: &str) -> String {
        match self.find_by_wire_name(wire_name) {
            Some(field) => field.column_name(),
            None => wire_name
                .split('.')
                .map(|segment| segment.to_snake_case())
                .collect::<Vec<_>>()
                .join("."),
        }
    }

    /// Storage column for a declared field, matched by in-memory name
    /// first and wire name second.
    pub fn column_for(&self, name: &str) -> Result<String, SchemaError> {
        self.find_by_name(name)
            .or_else(|| self.find_by_wire_name(name))
            .map(FieldDescriptor::column_name)
            .ok_or_else(|| SchemaError::FieldNotFound {
                record: self.type_name.clone(),
                field: name.to_string(),
            })
    }

    /// Descriptor of a related record. `relation` is compared in snake_case
    /// against declared in-memory names and wire names.
    pub fn relation(&self, relation: &str) -> Result<&RecordDescriptor, SchemaError> {
        let wanted = relation.to_snake_case();
        self.fields
            .iter()
            .find(|field| {
                field.name.to_snake_case() == wanted || field.wire_name.to_snake_case() == wanted
            })
            .and_then(|field| field.relation.as_deref())
            .ok_or_else(|| SchemaError::RelationNotFound {
                record: self.type_name.clone(),
                relation: relation.to_string(),
            })
    }
}

/// Record types that can describe themselves.
pub trait DescribeRecord {
    fn describe() -> RecordDescriptor;
}
