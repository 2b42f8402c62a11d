//! Error types for parsing, validation, rendering, and loading.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

use crate::operators::Operator;

/// A rejected list parameter. Validation collects one of these per
/// offending item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The query string could not be unescaped.
    #[error("Query format is invalid")]
    InvalidQuery,

    #[error("Filter {field} is not allowed with operator {operator}")]
    FilterNotAllowed { field: String, operator: Operator },

    #[error("Sorting by {field} is not allowed")]
    SortingNotAllowed { field: String },

    #[error("Including of {field} is not allowed")]
    IncludeNotAllowed { field: String },

    /// Non-default pagination was requested but never allowed.
    #[error("Pagination is not allowed")]
    PaginationNotAllowed,
}

/// Serializes as `{"error": "<message>"}` for HTTP error bodies.
impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationError", 1)?;
        state.serialize_field("error", &self.to_string())?;
        state.end()
    }
}

/// Lookup failures against a record descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field {field} can not be found on {record}")]
    FieldNotFound { record: String, field: String },

    #[error("relation {relation} can not be found on {record}")]
    RelationNotFound { record: String, relation: String },
}

/// Failures while rendering SQL from list parameters.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("custom sorting for {field} failed")]
    CustomSorting {
        field: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures while loading a list through a storage adapter.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("storage query failed")]
    Storage(#[source] anyhow::Error),

    #[error("custom include for {field} failed")]
    CustomInclude {
        field: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages() {
        let err = ValidationError::FilterNotAllowed {
            field: "age".to_string(),
            operator: Operator::Gte,
        };
        assert_eq!(err.to_string(), "Filter age is not allowed with operator gte");

        let err = ValidationError::IncludeNotAllowed {
            field: "comments".to_string(),
        };
        assert_eq!(err.to_string(), "Including of comments is not allowed");

        assert_eq!(
            ValidationError::PaginationNotAllowed.to_string(),
            "Pagination is not allowed"
        );
    }

    #[test]
    fn validation_error_serializes_as_error_object() {
        let err = ValidationError::SortingNotAllowed {
            field: "name".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Sorting by name is not allowed"}));
    }

    #[test]
    fn load_error_keeps_source() {
        let err = LoadError::CustomInclude {
            field: "likesCount".to_string(),
            source: anyhow::anyhow!("counter unavailable"),
        };
        assert_eq!(err.to_string(), "custom include for likesCount failed");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "counter unavailable");
    }
}
