//! Include requests (`include=author,comments.likes`).
//!
//! [`Includes`] tracks which relations a request asked for and decides:
//! - which of them may be requested at all (allow-list validation)
//! - which must be eager-loaded by the storage layer ([`Includes::preloads`])
//! - which are resolved by a registered post-load callback instead
//! - which fields survive into the response ([`Includes::output_fields`])
//! - which columns the SQL select list needs ([`Includes::select_query`])

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use url::form_urlencoded;

use crate::error::ValidationError;
use crate::extension::{CustomInclude, RegisteredInclude};
use crate::fields::{FIELDS_DELIMITER, Fields};

/// Separates repeated values inside one query parameter.
pub(crate) const VALUE_DELIMITER: char = ',';

/// Requested includes plus the policy they are checked against.
#[derive(Debug, Default)]
pub struct Includes {
    requested: Vec<String>,
    allowed: Vec<String>,
    custom: Vec<RegisteredInclude>,
    fields_set: Fields,
    selected: Option<Fields>,
}

impl Includes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every `include` value of a query string, comma-split, in
    /// encounter order.
    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self::from_pairs(&pairs)
    }

    pub(crate) fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut includes = Self::default();
        for (key, value) in pairs {
            if key == "include" {
                includes.add_includes(value);
            }
        }
        includes
    }

    /// Request more includes. `names` may hold several comma-separated
    /// entries; empty entries are skipped.
    pub fn add_includes(&mut self, names: &str) {
        self.requested.extend(
            names
                .split(VALUE_DELIMITER)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );
    }

    /// Replace the allow-list.
    pub fn allow<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = names.into_iter().map(Into::into).collect();
    }

    /// Declare every field the model can expose.
    pub fn allow_select_fields(&mut self, fields: Fields) {
        self.fields_set = fields;
    }

    /// Restrict output to a sparse fieldset.
    pub fn select_fields(&mut self, fields: Fields) {
        self.selected = Some(fields);
    }

    /// Resolve `field` with a post-load callback instead of a preload.
    pub fn add_custom_includes(
        &mut self,
        field: impl Into<String>,
        handler: impl CustomInclude + 'static,
    ) {
        self.custom.push(RegisteredInclude::new(field, handler));
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// One error per requested include missing from the allow-list.
    pub fn errors(&self) -> Vec<ValidationError> {
        self.requested
            .iter()
            .filter(|name| !self.allowed.contains(*name))
            .map(|name| ValidationError::IncludeNotAllowed {
                field: name.clone(),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors = self.errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.requested.iter().any(|requested| requested == name)
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.custom.iter().any(|include| include.field() == name)
    }

    /// Relations to eager-load: every requested non-custom include, each
    /// segment in UpperCamelCase (`comments.likes` -> `Comments.Likes`).
    pub fn preloads(&self) -> Vec<String> {
        self.requested
            .iter()
            .filter(|name| !self.is_custom(name))
            .map(|name| {
                name.split(FIELDS_DELIMITER)
                    .map(|segment| segment.to_upper_camel_case())
                    .collect::<Vec<_>>()
                    .join(".")
            })
            .collect()
    }

    /// Callbacks of the custom includes that were actually requested, in
    /// registration order.
    pub fn custom_include_functions(&self) -> Vec<&RegisteredInclude> {
        self.custom
            .iter()
            .filter(|include| self.is_included(include.field()))
            .collect()
    }

    /// Fields to serialize. The declared tree is first narrowed to the
    /// sparse fieldset, if any; nested groups then survive only when their
    /// lowerCamel dotted path was requested as an include.
    pub fn output_fields(&self) -> Fields {
        match &self.selected {
            Some(selected) if !selected.is_empty() => {
                let narrowed = intersect(&self.fields_set, selected);
                self.prune_unincluded(&narrowed, &[])
            }
            _ => self.prune_unincluded(&self.fields_set, &[]),
        }
    }

    /// Columns for the SQL select list, `["*"]` when no fields were
    /// declared. Root leaves are unprefixed; nested leaves are prefixed
    /// with their snake_case relation path. Custom includes are skipped.
    pub fn select_query(&self) -> Vec<String> {
        if self.fields_set.is_empty() {
            return vec!["*".to_string()];
        }
        let mut columns = Vec::new();
        let output = self.output_fields();
        self.collect_select(&output, &mut Vec::new(), &mut Vec::new(), &mut columns);
        columns
    }

    fn prune_unincluded(&self, node: &Fields, path: &[String]) -> Fields {
        let mut pruned = Fields::new(node.prop_name.clone());
        pruned.list = node.list.clone();

        for child in &node.nested {
            let mut child_path = path.to_vec();
            child_path.push(child.prop_name.to_lower_camel_case());
            if self.is_included(&child_path.join(".")) {
                pruned.nested.push(self.prune_unincluded(child, &child_path));
            }
        }
        pruned
    }

    fn collect_select(
        &self,
        node: &Fields,
        include_path: &mut Vec<String>,
        prefix: &mut Vec<String>,
        columns: &mut Vec<String>,
    ) {
        for leaf in &node.list {
            if prefix.is_empty() {
                columns.push(leaf.clone());
            } else {
                columns.push(format!("{}{FIELDS_DELIMITER}{leaf}", prefix.join(".")));
            }
        }

        for child in &node.nested {
            include_path.push(child.prop_name.to_lower_camel_case());
            if !self.is_custom(&include_path.join(".")) {
                prefix.push(child.prop_name.to_snake_case());
                self.collect_select(child, include_path, prefix, columns);
                prefix.pop();
            }
            include_path.pop();
        }
    }
}

/// Keep the leaves and groups of `allowed` that `selected` also names. A
/// group named by the selection is kept even when nothing inside it
/// matches.
fn intersect(allowed: &Fields, selected: &Fields) -> Fields {
    let mut result = Fields::new(allowed.prop_name.clone());
    result.list = allowed
        .list
        .iter()
        .filter(|leaf| selected.has_leaf(leaf))
        .cloned()
        .collect();
    result.nested = allowed
        .nested
        .iter()
        .filter_map(|child| {
            selected
                .child(&child.prop_name)
                .map(|selected_child| intersect(child, selected_child))
        })
        .collect();
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fields::FieldNode;
    use serde_json::Value;

    fn noop_include(_: &mut [Value]) -> anyhow::Result<()> {
        Ok(())
    }

    fn model_fields() -> Fields {
        Fields::from_tokens([
            "id",
            "title",
            "author.name",
            "author.email",
            "comments.body",
            "comments.likes.count",
        ])
    }

    #[test]
    fn from_query_collects_repeated_keys() {
        let includes = Includes::from_query("include=author,comments.likes&include=tags");
        assert_eq!(includes.requested(), ["author", "comments.likes", "tags"]);
    }

    #[test]
    fn disallowed_include_yields_one_error() {
        let mut includes = Includes::from_query("include=comments");
        includes.allow(["posts"]);

        let errors = includes.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("comments"));
    }

    #[test]
    fn allowed_includes_validate() {
        let mut includes = Includes::from_query("include=author,comments");
        includes.allow(["author", "comments"]);
        assert!(includes.validate().is_ok());
    }

    #[test]
    fn preloads_camel_case_and_skip_custom() {
        let mut includes = Includes::from_query("include=author,comments.likes,likesCount");
        includes.add_custom_includes("likesCount", noop_include);
        assert_eq!(includes.preloads(), vec!["Author", "Comments.Likes"]);
    }

    #[test]
    fn custom_functions_only_when_requested() {
        let mut includes = Includes::from_query("include=stats");
        includes.add_custom_includes("likesCount", noop_include);
        includes.add_custom_includes("stats", noop_include);

        let functions = includes.custom_include_functions();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].field(), "stats");
    }

    #[test]
    fn output_fields_drop_groups_not_included() {
        let mut includes = Includes::from_query("include=author");
        includes.allow_select_fields(model_fields());

        let output = includes.output_fields();
        assert_eq!(output.list, vec!["id", "title"]);
        assert_eq!(output.nested.len(), 1);
        assert_eq!(output.child("author").unwrap().list, vec!["name", "email"]);
    }

    #[test]
    fn nested_group_needs_full_path_include() {
        let mut includes = Includes::from_query("include=comments");
        includes.allow_select_fields(model_fields());
        let comments = includes.output_fields();
        assert!(comments.child("comments").unwrap().child("likes").is_none());

        includes.add_includes("comments.likes");
        let output = includes.output_fields();
        assert!(output.child("comments").unwrap().child("likes").is_some());
    }

    #[test]
    fn sparse_fieldset_intersects_before_include_filter() {
        let mut includes = Includes::from_query("include=author");
        includes.allow_select_fields(model_fields());
        includes.select_fields(Fields::from_nodes(&[
            FieldNode::leaf("title"),
            FieldNode::leaf("unknown"),
            FieldNode::group("author", vec![FieldNode::leaf("name")]),
            FieldNode::group("comments", vec![FieldNode::leaf("body")]),
        ]));

        let output = includes.output_fields();
        assert_eq!(output.list, vec!["title"]);
        assert_eq!(output.nested.len(), 1);
        assert_eq!(output.child("author").unwrap().list, vec!["name"]);
    }

    #[test]
    fn select_query_without_declared_fields_is_star() {
        let includes = Includes::from_query("include=author");
        assert_eq!(includes.select_query(), vec!["*"]);
    }

    #[test]
    fn select_query_prefixes_nested_and_skips_custom() {
        let mut includes = Includes::from_query("include=author,likeStats");
        includes.allow_select_fields(Fields::from_tokens([
            "id",
            "author.fullName",
            "likeStats.total",
        ]));
        includes.add_custom_includes("likeStats", noop_include);

        assert_eq!(includes.select_query(), vec!["id", "author.fullName"]);
    }

    #[test]
    fn select_query_snake_cases_relation_segments() {
        let mut includes = Includes::from_query("include=blogPosts");
        includes.allow_select_fields(Fields::from_tokens(["id", "blogPosts.title"]));
        assert_eq!(includes.select_query(), vec!["id", "blog_posts.title"]);
    }
}
