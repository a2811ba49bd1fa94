//! Key field-set model
//!
//! A field set is the selection shape carried by `@key`, `@requires` and
//! `@provides` arguments, e.g. `id organization { id }`. Field sets are built
//! programmatically and rendered in federation SDL form; they can also be
//! matched against an incoming representation to find which key it satisfies.

use std::fmt;

use async_graphql::{Name, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One selected field, with optional nested selections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub field: String,
    pub selections: Vec<Selection>,
}

impl Selection {
    /// Select a single field
    pub fn new(field: impl Into<String>) -> Self {
        Selection {
            field: field.into(),
            selections: Vec::new(),
        }
    }

    /// Select a field with nested selections
    pub fn with_selections(
        field: impl Into<String>,
        selections: impl IntoIterator<Item = Selection>,
    ) -> Self {
        Selection {
            field: field.into(),
            selections: selections.into_iter().collect(),
        }
    }
}

/// An ordered set of selections identifying an entity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldSet(Vec<Selection>);

impl FieldSet {
    /// Create a field set from selections
    pub fn new(selections: impl IntoIterator<Item = Selection>) -> Self {
        FieldSet(selections.into_iter().collect())
    }

    /// Create a flat field set from field names
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet(fields.into_iter().map(Selection::new).collect())
    }

    /// Parse a field set from its SDL form, e.g. `"id organization { id }"`.
    ///
    /// Returns `None` if braces are unbalanced or a token is not a valid
    /// GraphQL name.
    pub fn parse(input: &str) -> Option<FieldSet> {
        let mut tokens = tokenize(input)?.into_iter().peekable();
        let selections = parse_selections(&mut tokens, false)?;
        if tokens.next().is_some() {
            return None;
        }
        Some(FieldSet(selections))
    }

    pub fn selections(&self) -> &[Selection] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert every snake_case field name to camelCase, recursively
    pub fn camelized(&self) -> FieldSet {
        FieldSet(self.0.iter().map(camelize_selection).collect())
    }

    /// Checks that every field of this set is present in the given
    /// representation object. Nested selections require the field to hold an
    /// object (or null, which is assumed nullable-but-matching).
    pub fn all_fields_present(&self, object: &IndexMap<Name, Value>) -> bool {
        selections_are_present(object, &self.0)
    }
}

fn selections_are_present(object: &IndexMap<Name, Value>, selections: &[Selection]) -> bool {
    selections.iter().all(|selection| {
        match object.get(selection.field.as_str()) {
            None => false,
            Some(_) if selection.selections.is_empty() => true,
            Some(Value::Object(nested)) => selections_are_present(nested, &selection.selections),
            Some(Value::Null) => true,
            Some(_) => false,
        }
    })
}

fn camelize_selection(selection: &Selection) -> Selection {
    Selection {
        field: camelize(&selection.field),
        selections: selection.selections.iter().map(camelize_selection).collect(),
    }
}

/// snake_case to camelCase, preserving leading underscores
pub(crate) fn camelize(name: &str) -> String {
    if !name.contains('_') {
        return name.to_string();
    }
    let leading = name.chars().take_while(|c| *c == '_').count();
    let mut camelized = String::with_capacity(name.len());
    for part in name[leading..].split('_') {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            camelized.push(first.to_ascii_uppercase());
            camelized.extend(chars);
        }
    }
    let mut out = String::with_capacity(name.len());
    out.extend(std::iter::repeat('_').take(leading));
    let mut chars = camelized.chars();
    if let Some(first) = chars.next() {
        out.push(first.to_ascii_lowercase());
        out.extend(chars);
    }
    out
}

#[derive(Debug, PartialEq)]
enum Token {
    Name(String),
    Open,
    Close,
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '{' => {
                chars.next();
                tokens.push(Token::Open);
            }
            '}' => {
                chars.next();
                tokens.push(Token::Close);
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

fn parse_selections(
    tokens: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
    nested: bool,
) -> Option<Vec<Selection>> {
    let mut selections = Vec::new();
    loop {
        match tokens.peek() {
            Some(Token::Name(_)) => {
                let field = match tokens.next() {
                    Some(Token::Name(name)) => name,
                    _ => return None,
                };
                let nested_selections = if matches!(tokens.peek(), Some(Token::Open)) {
                    tokens.next();
                    let inner = parse_selections(tokens, true)?;
                    if !matches!(tokens.next(), Some(Token::Close)) {
                        return None;
                    }
                    inner
                } else {
                    Vec::new()
                };
                selections.push(Selection {
                    field,
                    selections: nested_selections,
                });
            }
            Some(Token::Close) if nested => return Some(selections),
            Some(_) => return None,
            None if nested => return None,
            None => return Some(selections),
        }
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selection) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{selection}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Selection { field, selections } = self;
        write!(f, "{field}")?;
        if !selections.is_empty() {
            write!(f, " {{")?;
            for selection in selections {
                write!(f, " {selection}")?;
            }
            write!(f, " }}")?;
        }
        Ok(())
    }
}
