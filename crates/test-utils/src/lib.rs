//! list-params test utilities.
//!
//! Helpers for integration testing: record descriptors for a small blog
//! schema, JSON record builders, and in-memory list stores that record the
//! queries they receive.

use std::cell::RefCell;

use list_params::{DescribeRecord, FieldDescriptor, ListQuery, ListStore, RecordDescriptor};
use serde_json::{Value, json};

/// Descriptor of `User` (table `users`).
///
/// `Email` is stored in `email_address`; `FullName` has no column of its
/// own and is meant to be served by a custom filter.
pub fn user_descriptor() -> RecordDescriptor {
    RecordDescriptor::new("User")
        .field(FieldDescriptor::new("ID", "id"))
        .field(FieldDescriptor::new("FirstName", "firstName"))
        .field(FieldDescriptor::new("LastName", "lastName"))
        .field(FieldDescriptor::new("FullName", "fullName"))
        .field(FieldDescriptor::new("Email", "email").with_column("email_address"))
        .field(FieldDescriptor::new("CreatedAt", "createdAt"))
}

/// Descriptor of `Comment` (table `comments`).
pub fn comment_descriptor() -> RecordDescriptor {
    RecordDescriptor::new("Comment")
        .field(FieldDescriptor::new("ID", "id"))
        .field(FieldDescriptor::new("Body", "body"))
        .field(FieldDescriptor::new("Author", "author").with_relation(user_descriptor()))
}

/// Descriptor of `BlogPost`, stored in the explicit table `posts`.
pub fn post_descriptor() -> RecordDescriptor {
    RecordDescriptor::new("BlogPost")
        .with_table_name("posts")
        .field(FieldDescriptor::new("ID", "id"))
        .field(FieldDescriptor::new("Title", "title"))
        .field(FieldDescriptor::new("Status", "status"))
        .field(FieldDescriptor::new("PublishedAt", "publishedAt"))
        .field(FieldDescriptor::new("Author", "author").with_relation(user_descriptor()))
        .field(FieldDescriptor::new("Comments", "comments").with_relation(comment_descriptor()))
}

/// Marker type describing itself as [`user_descriptor`].
pub struct User;

impl DescribeRecord for User {
    fn describe() -> RecordDescriptor {
        user_descriptor()
    }
}

/// Create a user record.
pub fn test_user(id: i64, first_name: &str, last_name: &str) -> Value {
    json!({
        "id": id,
        "firstName": first_name,
        "lastName": last_name,
        "email": format!("{}@example.com", first_name.to_lowercase()),
    })
}

/// Create a post record.
pub fn test_post(id: i64, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "status": status,
    })
}

/// Store returning fixed records and remembering every query it ran.
#[derive(Debug, Default)]
pub struct RecordingStore {
    records: Vec<Value>,
    queries: RefCell<Vec<ListQuery>>,
}

impl RecordingStore {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Queries received so far, oldest first.
    pub fn queries(&self) -> Vec<ListQuery> {
        self.queries.borrow().clone()
    }

    pub fn last_query(&self) -> Option<ListQuery> {
        self.queries.borrow().last().cloned()
    }
}

impl ListStore for RecordingStore {
    fn find(&self, query: &ListQuery) -> anyhow::Result<Vec<Value>> {
        self.queries.borrow_mut().push(query.clone());
        Ok(self.records.clone())
    }
}

/// Store whose every query fails.
#[derive(Debug, Clone)]
pub struct FailingStore {
    pub message: String,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl ListStore for FailingStore {
    fn find(&self, _query: &ListQuery) -> anyhow::Result<Vec<Value>> {
        anyhow::bail!("{}", self.message)
    }
}

/// Assertion helpers for rendered SQL.
pub mod assert {
    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}
