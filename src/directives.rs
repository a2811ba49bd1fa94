//! Federation directive model and declaration helpers
//!
//! Directives are attached to schema members at declaration time and read back
//! verbatim by entity discovery and SDL rendering. Both the list of directives
//! on a member and the arguments within a directive keep their declaration
//! order; nothing here re-sorts.

use async_graphql::Value;
use serde::{Deserialize, Serialize};

use crate::field_set::FieldSet;

/// One named argument of a federation directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveArgument {
    pub name: String,
    pub value: Value,
}

/// A federation directive as declared on a schema member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederationDirective {
    pub name: String,
    pub arguments: Vec<DirectiveArgument>,
}

impl FederationDirective {
    /// Create a directive with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        FederationDirective {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    /// Append an argument, keeping declaration order
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.push(DirectiveArgument {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Look up an argument value by name
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|argument| argument.name == name)
            .map(|argument| &argument.value)
    }
}

/// The ordered directives of one schema member, immutable after construction.
///
/// Inheritance from a parent member is an explicit concatenation done once at
/// construction, parent directives first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectiveList(Vec<FederationDirective>);

impl DirectiveList {
    /// Build a list from directives in declaration order
    pub fn new(directives: impl IntoIterator<Item = FederationDirective>) -> Self {
        DirectiveList(directives.into_iter().collect())
    }

    /// Build a list that inherits a parent member's directives, parent first
    pub fn inherited(
        parent: &DirectiveList,
        own: impl IntoIterator<Item = FederationDirective>,
    ) -> Self {
        DirectiveList(parent.0.iter().cloned().chain(own).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FederationDirective> {
        self.0.iter()
    }

    /// Whether any directive with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|directive| directive.name == name)
    }

    /// First directive with this name
    pub fn find(&self, name: &str) -> Option<&FederationDirective> {
        self.0.iter().find(|directive| directive.name == name)
    }

    /// All directives with this name, in declaration order
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FederationDirective> {
        self.0.iter().filter(move |directive| directive.name == name)
    }
}

impl<'a> IntoIterator for &'a DirectiveList {
    type Item = &'a FederationDirective;
    type IntoIter = std::slice::Iter<'a, FederationDirective>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// `@key(fields: "...")` - declares the fields that identify an entity
pub fn key(fields: &FieldSet) -> FederationDirective {
    FederationDirective::new("key").with_argument("fields", fields.to_string())
}

/// `@external` - the field is owned by another subgraph
pub fn external() -> FederationDirective {
    FederationDirective::new("external")
}

/// `@requires(fields: "...")` - the resolver needs these external fields
pub fn requires(fields: &FieldSet) -> FederationDirective {
    FederationDirective::new("requires").with_argument("fields", fields.to_string())
}

/// `@provides(fields: "...")` - this subgraph can resolve these fields of the
/// referenced entity
pub fn provides(fields: &FieldSet) -> FederationDirective {
    FederationDirective::new("provides").with_argument("fields", fields.to_string())
}

/// `@shareable` - the field may be resolved by multiple subgraphs
pub fn shareable() -> FederationDirective {
    FederationDirective::new("shareable")
}

/// `@inaccessible` - hidden from the composed graph
pub fn inaccessible() -> FederationDirective {
    FederationDirective::new("inaccessible")
}

/// `@extends` - federation v1 style type extension
pub fn extends() -> FederationDirective {
    FederationDirective::new("extends")
}

/// `@override(from: "...")` - take ownership of the field from another subgraph
pub fn override_from(subgraph: impl Into<String>) -> FederationDirective {
    FederationDirective::new("override").with_argument("from", subgraph.into())
}

/// `@tag(name: "...")`
pub fn tag(name: impl Into<String>) -> FederationDirective {
    FederationDirective::new("tag").with_argument("name", name.into())
}

/// `@policy(policies: [[...]])`
pub fn policy(policies: Vec<Vec<String>>) -> FederationDirective {
    let value = Value::List(
        policies
            .into_iter()
            .map(|group| Value::List(group.into_iter().map(Value::from).collect()))
            .collect(),
    );
    FederationDirective::new("policy").with_argument("policies", value)
}

/// `@cost(weight: ...)`
pub fn cost(weight: i64) -> FederationDirective {
    FederationDirective::new("cost").with_argument("weight", weight)
}

/// Options for the `@listSize` directive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSize {
    pub assumed_size: Option<i64>,
    pub slicing_arguments: Option<Vec<String>>,
    pub require_one_slicing_argument: Option<bool>,
    pub sized_fields: Option<Vec<String>>,
}

/// `@listSize(...)` - static list size estimation for cost analysis.
///
/// Returns `None` when no option is set; `requireOneSlicingArgument` is only
/// emitted alongside `slicingArguments`.
pub fn list_size(options: &ListSize) -> Option<FederationDirective> {
    let mut directive = FederationDirective::new("listSize");
    if let Some(assumed_size) = options.assumed_size {
        directive = directive.with_argument("assumedSize", assumed_size);
    }
    if let Some(slicing_arguments) = &options.slicing_arguments {
        directive = directive.with_argument(
            "slicingArguments",
            Value::List(slicing_arguments.iter().cloned().map(Value::from).collect()),
        );
        if let Some(require_one) = options.require_one_slicing_argument {
            directive = directive.with_argument("requireOneSlicingArgument", require_one);
        }
    }
    if let Some(sized_fields) = &options.sized_fields {
        directive = directive.with_argument(
            "sizedFields",
            Value::List(sized_fields.iter().cloned().map(Value::from).collect()),
        );
    }
    if directive.arguments.is_empty() {
        None
    } else {
        Some(directive)
    }
}
