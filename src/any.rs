//! The `_Any` representation scalar
//!
//! A representation is the opaque, key-bearing record a gateway sends to
//! `_entities(representations: [_Any!]!)`. It must carry a `__typename`
//! string; everything else is key fields the owning subgraph declared. Field
//! order is preserved end to end.

use async_graphql::{Name, Value};
use indexmap::IndexMap;

use crate::{FederationError, Result};

/// Field every representation must carry
pub const TYPENAME_FIELD: &str = "__typename";

/// One entity reference as sent by the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    typename: String,
    fields: IndexMap<Name, Value>,
}

impl Representation {
    /// Coerce a GraphQL value into a representation.
    ///
    /// The value must be an object with a string `__typename` field.
    pub fn from_value(value: Value) -> Result<Self> {
        Self::coerce(value, false)
    }

    /// Coerce a GraphQL value, optionally converting camelCase keys to
    /// snake_case for Rust-side resolvers. `__typename` is never renamed.
    pub fn coerce(value: Value, underscore_keys: bool) -> Result<Self> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => return Err(FederationError::IncoercibleAnyValue(other.to_string())),
        };
        let fields: IndexMap<Name, Value> = if underscore_keys {
            fields
                .into_iter()
                .map(|(name, value)| (Name::new(underscore(&name)), value))
                .collect()
        } else {
            fields
        };
        let typename = match fields.get(TYPENAME_FIELD) {
            Some(Value::String(typename)) => typename.clone(),
            _ => return Err(FederationError::MissingTypename),
        };
        Ok(Representation { typename, fields })
    }

    /// Coerce a JSON value into a representation
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let value = Value::from_json(value)
            .map_err(|error| FederationError::IncoercibleAnyValue(error.to_string()))?;
        Self::from_value(value)
    }

    /// Coerce a `[_Any!]!` list into representations, preserving order
    pub fn many_from_value(value: Value) -> Result<Vec<Self>> {
        match value {
            Value::List(items) => items.into_iter().map(Self::from_value).collect(),
            other => Err(FederationError::IncoercibleAnyValue(other.to_string())),
        }
    }

    /// The entity type this reference identifies
    pub fn typename(&self) -> &str {
        &self.typename
    }

    /// Look up a key field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// All fields, including `__typename`, in input order
    pub fn fields(&self) -> &IndexMap<Name, Value> {
        &self.fields
    }

    /// Give the representation back as a value, unchanged. This is what the
    /// passthrough resolution strategy returns.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// camelCase to snake_case, the inverse of field-set camelization
fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_lower_or_digit = false;
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let next_is_lower = chars.get(i + 1).is_some_and(|next| next.is_ascii_lowercase());
            let previous_upper = i > 0 && chars[i - 1].is_ascii_uppercase();
            if previous_lower_or_digit || (previous_upper && next_is_lower) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            previous_lower_or_digit = false;
        } else {
            out.push(c);
            previous_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}
