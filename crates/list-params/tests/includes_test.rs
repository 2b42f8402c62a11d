#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Includes and field selection integration tests.

use list_params::{FieldNode, Fields, Includes, ListParams, ValidationError};
use list_params_test_utils::post_descriptor;
use serde_json::{Value, json};

fn post_fields() -> Fields {
    Fields::from_tokens([
        "ID",
        "Title",
        "Status",
        "author.FirstName",
        "author.Email",
        "comments.Body",
        "comments.author.FirstName",
    ])
}

fn count_comments(records: &mut [Value]) -> anyhow::Result<()> {
    for record in records.iter_mut() {
        record["commentsCount"] = json!(0);
    }
    Ok(())
}

#[test]
fn include_not_in_allow_list_fails_once() {
    let mut params = ListParams::from_query("include=comments", post_descriptor());
    params.allow_includes(["posts"]);

    let errors = params.validate().unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::IncludeNotAllowed {
            field: "comments".to_string()
        }]
    );
    assert!(errors[0].to_string().contains("comments"));
}

#[test]
fn preloads_exclude_custom_includes() {
    let mut params = ListParams::from_query(
        "include=author,comments.author&include=commentsCount",
        post_descriptor(),
    );
    params.allow_includes(["author", "comments.author", "commentsCount"]);
    params.add_custom_include("commentsCount", count_comments);

    assert!(params.validate().is_ok());
    assert_eq!(params.preloads(), vec!["Author", "Comments.Author"]);
    assert_eq!(params.custom_includes_functions().len(), 1);
}

#[test]
fn output_fields_follow_includes() {
    let mut params = ListParams::from_query("include=comments,comments.author", post_descriptor());
    params.allow_select_fields(post_fields());

    let output = params.output_fields();
    let expected = json!([
        "ID",
        "Title",
        "Status",
        {"comments": ["Body", {"author": ["FirstName"]}]}
    ]);
    let expected: Fields = serde_json::from_value(expected).unwrap();
    assert!(output.is_equivalent(&expected));
}

#[test]
fn sparse_fieldset_narrows_output_and_select() {
    let mut params = ListParams::from_query("include=author", post_descriptor());
    params.allow_select_fields(post_fields());
    params.select_fields(Fields::from_nodes(&[
        FieldNode::leaf("Title"),
        FieldNode::group("author", vec![FieldNode::leaf("Email")]),
    ]));

    let output = params.output_fields();
    assert_eq!(output.to_tokens(), vec!["Title", "author.Email"]);
    assert_eq!(params.select_query(), vec!["Title", "author.Email"]);
}

#[test]
fn select_query_is_star_without_declared_fields() {
    let params = ListParams::from_query("include=author", post_descriptor());
    assert_eq!(params.select_query(), vec!["*"]);
}

#[test]
fn nested_representation_from_json() {
    let fields: Fields = serde_json::from_value(json!([
        "id",
        {"author": ["name", {"likes": ["count"]}]},
        {"author": ["email"]}
    ]))
    .unwrap();

    let author = fields.child("author").unwrap();
    assert_eq!(author.list, vec!["name", "email"]);
    assert_eq!(author.child("likes").unwrap().list, vec!["count"]);
    assert!(fields.is_equivalent(&Fields::from_tokens([
        "author.email",
        "id",
        "author.likes.count",
        "author.name",
    ])));
}

#[test]
fn standalone_includes_from_query() {
    let mut includes = Includes::from_query("include=author&include=comments,tags");
    includes.allow(["author", "comments"]);

    let errors = includes.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "Including of tags is not allowed");
}
