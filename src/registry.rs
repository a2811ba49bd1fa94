//! Subgraph type registry
//!
//! The registry is the set of object and interface types this subgraph
//! declares, in registration order. Every member (type, field, argument) owns
//! its federation directives, attached at declaration time and read-only
//! afterwards. Entity discovery walks this registry when the schema is
//! finalized.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::directives::DirectiveList;

/// Read accessor shared by everything that can carry federation directives
pub trait SchemaMember {
    fn name(&self) -> &str;
    fn federation_directives(&self) -> &DirectiveList;
}

/// An argument of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDefinition {
    pub name: String,
    pub ty: String,
    pub directives: DirectiveList,
}

impl ArgumentDefinition {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        ArgumentDefinition {
            name: name.into(),
            ty: ty.into(),
            directives: DirectiveList::default(),
        }
    }

    pub fn with_directives(mut self, directives: DirectiveList) -> Self {
        self.directives = directives;
        self
    }
}

/// A field of an object or interface type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: String,
    pub arguments: Vec<ArgumentDefinition>,
    pub directives: DirectiveList,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        FieldDefinition {
            name: name.into(),
            ty: ty.into(),
            arguments: Vec::new(),
            directives: DirectiveList::default(),
        }
    }

    pub fn with_argument(mut self, argument: ArgumentDefinition) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_directives(mut self, directives: DirectiveList) -> Self {
        self.directives = directives;
        self
    }
}

/// An object type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    pub name: String,
    pub directives: DirectiveList,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDefinition>,
}

impl ObjectDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectDefinition {
            name: name.into(),
            directives: DirectiveList::default(),
            interfaces: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Attach the member's directives; set once at declaration
    pub fn with_directives(mut self, directives: DirectiveList) -> Self {
        self.directives = directives;
        self
    }

    /// Declare that this object implements an interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// An interface type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    pub directives: DirectiveList,
    pub fields: Vec<FieldDefinition>,
}

impl InterfaceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        InterfaceDefinition {
            name: name.into(),
            directives: DirectiveList::default(),
            fields: Vec::new(),
        }
    }

    pub fn with_directives(mut self, directives: DirectiveList) -> Self {
        self.directives = directives;
        self
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }
}

/// A registered type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeDefinition {
    Object(ObjectDefinition),
    Interface(InterfaceDefinition),
}

impl TypeDefinition {
    pub fn as_object(&self) -> Option<&ObjectDefinition> {
        match self {
            TypeDefinition::Object(object) => Some(object),
            TypeDefinition::Interface(_) => None,
        }
    }

    pub fn as_interface(&self) -> Option<&InterfaceDefinition> {
        match self {
            TypeDefinition::Object(_) => None,
            TypeDefinition::Interface(interface) => Some(interface),
        }
    }
}

impl SchemaMember for ObjectDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn federation_directives(&self) -> &DirectiveList {
        &self.directives
    }
}

impl SchemaMember for InterfaceDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn federation_directives(&self) -> &DirectiveList {
        &self.directives
    }
}

impl SchemaMember for FieldDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn federation_directives(&self) -> &DirectiveList {
        &self.directives
    }
}

impl SchemaMember for ArgumentDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn federation_directives(&self) -> &DirectiveList {
        &self.directives
    }
}

impl SchemaMember for TypeDefinition {
    fn name(&self) -> &str {
        match self {
            TypeDefinition::Object(object) => &object.name,
            TypeDefinition::Interface(interface) => &interface.name,
        }
    }

    fn federation_directives(&self) -> &DirectiveList {
        match self {
            TypeDefinition::Object(object) => &object.directives,
            TypeDefinition::Interface(interface) => &interface.directives,
        }
    }
}

/// All types declared by this subgraph, in registration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDefinition>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn register_object(&mut self, object: ObjectDefinition) {
        self.types
            .insert(object.name.clone(), TypeDefinition::Object(object));
    }

    pub fn register_interface(&mut self, interface: InterfaceDefinition) {
        self.types
            .insert(interface.name.clone(), TypeDefinition::Interface(interface));
    }

    /// Resolve a type name
    pub fn lookup(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    /// All registered types, in registration order
    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    /// Registered object types, in registration order
    pub fn objects(&self) -> impl Iterator<Item = &ObjectDefinition> {
        self.types.values().filter_map(TypeDefinition::as_object)
    }

    /// Registered interface types, in registration order
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceDefinition> {
        self.types.values().filter_map(TypeDefinition::as_interface)
    }

    /// Object types implementing the given interface, in registration order
    pub fn implementers(&self, interface: &str) -> Vec<&ObjectDefinition> {
        self.objects()
            .filter(|object| object.interfaces.iter().any(|name| name == interface))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
