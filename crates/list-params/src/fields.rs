//! Nested field selection trees.
//!
//! A [`Fields`] node holds the leaf field names of one model plus one child
//! node per nested relation, e.g. `["id", "author.name", "author.likes.count"]`
//! becomes:
//!
//! ```text
//! (root) id
//!   author: name
//!     likes: count
//! ```
//!
//! The same tree has a nested representation as a sequence of
//! [`FieldNode`]s, serialized as JSON `["id", {"author": ["name", {"likes": ["count"]}]}]`.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separates nesting levels in a dotted field path.
pub const FIELDS_DELIMITER: char = '.';

/// One tree node: a set of leaf fields plus nested relation groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<FieldNode>", into = "Vec<FieldNode>")]
pub struct Fields {
    /// Relation name of this node; empty for the root.
    pub prop_name: String,

    /// Leaf field names, in insertion order.
    pub list: Vec<String>,

    /// Child nodes. `prop_name` is unique among siblings.
    pub nested: Vec<Fields>,
}

impl Fields {
    pub fn new(prop_name: impl Into<String>) -> Self {
        Self {
            prop_name: prop_name.into(),
            list: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Build a root tree from dotted paths (`"author.likes.count"`).
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = Self::default();
        for token in tokens {
            fields.insert(token.as_ref());
        }
        fields
    }

    /// Build a root tree from its nested representation. Groups sharing a
    /// name at the same level are merged.
    pub fn from_nodes(nodes: &[FieldNode]) -> Self {
        let mut fields = Self::default();
        fields.extend_from_nodes(nodes);
        fields
    }

    /// Insert one dotted path below this node.
    pub fn insert(&mut self, path: &str) {
        match path.split_once(FIELDS_DELIMITER) {
            None => self.list.push(path.to_string()),
            Some((head, rest)) => self.child_entry(head).insert(rest),
        }
    }

    /// Nested representation of this node's contents.
    pub fn to_nodes(&self) -> Vec<FieldNode> {
        let leaves = self.list.iter().cloned().map(FieldNode::Leaf);
        let groups = self
            .nested
            .iter()
            .map(|child| FieldNode::Group(child.prop_name.clone(), child.to_nodes()));
        leaves.chain(groups).collect()
    }

    pub fn child(&self, prop_name: &str) -> Option<&Fields> {
        self.nested.iter().find(|child| child.prop_name == prop_name)
    }

    pub fn has_leaf(&self, name: &str) -> bool {
        self.list.iter().any(|leaf| leaf == name)
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty() && self.nested.is_empty()
    }

    /// Compare two trees ignoring the order of leaves and children.
    pub fn is_equivalent(&self, other: &Fields) -> bool {
        if self.prop_name != other.prop_name || self.nested.len() != other.nested.len() {
            return false;
        }

        let mut left: Vec<&String> = self.list.iter().collect();
        let mut right: Vec<&String> = other.list.iter().collect();
        left.sort();
        right.sort();
        if left != right {
            return false;
        }

        self.nested.iter().all(|child| {
            other
                .child(&child.prop_name)
                .is_some_and(|theirs| child.is_equivalent(theirs))
        })
    }

    /// Flatten back to dotted paths, leaves before nested groups.
    pub fn to_tokens(&self) -> Vec<String> {
        let mut tokens = self.list.clone();
        for child in &self.nested {
            tokens.extend(
                child
                    .to_tokens()
                    .into_iter()
                    .map(|token| format!("{}{FIELDS_DELIMITER}{token}", child.prop_name)),
            );
        }
        tokens
    }

    fn extend_from_nodes(&mut self, nodes: &[FieldNode]) {
        for node in nodes {
            match node {
                FieldNode::Leaf(name) => self.list.push(name.clone()),
                FieldNode::Group(name, children) => {
                    self.child_entry(name).extend_from_nodes(children);
                }
            }
        }
    }

    fn child_entry(&mut self, prop_name: &str) -> &mut Fields {
        let index = match self
            .nested
            .iter()
            .position(|child| child.prop_name == prop_name)
        {
            Some(index) => index,
            None => {
                self.nested.push(Fields::new(prop_name));
                self.nested.len() - 1
            }
        };
        &mut self.nested[index]
    }
}

impl From<Vec<FieldNode>> for Fields {
    fn from(nodes: Vec<FieldNode>) -> Self {
        Fields::from_nodes(&nodes)
    }
}

impl From<Fields> for Vec<FieldNode> {
    fn from(fields: Fields) -> Self {
        fields.to_nodes()
    }
}

/// Element of the nested representation: a leaf field name or a named
/// group of child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldNode {
    Leaf(String),
    Group(String, Vec<FieldNode>),
}

impl FieldNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        FieldNode::Leaf(name.into())
    }

    pub fn group(name: impl Into<String>, children: Vec<FieldNode>) -> Self {
        FieldNode::Group(name.into(), children)
    }

    pub fn name(&self) -> &str {
        match self {
            FieldNode::Leaf(name) | FieldNode::Group(name, _) => name,
        }
    }
}

impl Serialize for FieldNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldNode::Leaf(name) => serializer.serialize_str(name),
            FieldNode::Group(name, children) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, children)?;
                map.end()
            }
        }
    }
}

/// Wire shape: a string, or a single-key object mapping a group name to
/// its children.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldNode {
    Leaf(String),
    Group(BTreeMap<String, Vec<FieldNode>>),
}

impl<'de> Deserialize<'de> for FieldNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawFieldNode::deserialize(deserializer)? {
            RawFieldNode::Leaf(name) => Ok(FieldNode::Leaf(name)),
            RawFieldNode::Group(map) => {
                if map.len() != 1 {
                    return Err(de::Error::custom(format!(
                        "field group must have exactly one key, found {}",
                        map.len()
                    )));
                }
                let (name, children) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| de::Error::custom("empty field group"))?;
                Ok(FieldNode::Group(name, children))
            }
        }
    }
}
