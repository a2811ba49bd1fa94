//! The `_Entity` union and its members
//!
//! Discovery produces [`Entity`] members (object types, plus interface
//! entities, which are legal members of this union even though plain GraphQL
//! unions only admit objects). Resolved values carry their owning entity as an
//! explicit tag ([`EntityValue`]), so union type resolution is a lookup and
//! never inspects the value's shape.

use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use indexmap::IndexMap;

use crate::any::Representation;
use crate::field_set::FieldSet;
use crate::resolver::ResolverStrategy;

/// Whether an entity is an object type or an interface entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Object,
    Interface,
}

/// One member of the `_Entity` union
pub struct Entity {
    name: String,
    kind: EntityKind,
    keys: Vec<FieldSet>,
    resolver: ResolverStrategy,
}

impl Entity {
    pub(crate) fn new(
        name: String,
        kind: EntityKind,
        keys: Vec<FieldSet>,
        resolver: ResolverStrategy,
    ) -> Self {
        Entity {
            name,
            kind,
            keys,
            resolver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Declared keys, in declaration order
    pub fn keys(&self) -> &[FieldSet] {
        &self.keys
    }

    pub(crate) fn resolver(&self) -> &ResolverStrategy {
        &self.resolver
    }

    /// The first declared key whose fields are all present in the
    /// representation, if any. Resolution does not require a match; this is
    /// for callers that want to validate references themselves.
    pub fn matching_key(&self, representation: &Representation) -> Option<&FieldSet> {
        self.keys
            .iter()
            .find(|key| key.all_fields_present(representation.fields()))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("keys", &self.keys)
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// A resolved value tagged with the entity it belongs to.
///
/// The tag is attached exactly once, when the value settles; the value itself
/// is never modified. Union type resolution reads the tag back.
#[derive(Debug, Clone)]
pub struct EntityValue {
    entity: Arc<Entity>,
    value: Value,
}

impl EntityValue {
    pub(crate) fn new(entity: Arc<Entity>, value: Value) -> Self {
        EntityValue { entity, value }
    }

    /// The owning entity, as tagged at resolution time
    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// The entity type name the value resolves to. For interface entities
    /// this is the interface; concrete type selection is the host engine's
    /// interface resolution.
    pub fn typename(&self) -> &str {
        self.entity.name()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// The polymorphic `_Entity` union, built once per schema.
///
/// Members are the discovered entities in discovery order; the set never
/// changes after finalization. Interface entities are accepted as members
/// here, relaxing the usual objects-only union rule.
pub struct EntityUnion {
    members: Vec<Arc<Entity>>,
    by_name: IndexMap<String, usize>,
}

impl EntityUnion {
    /// GraphQL name of the union
    pub const NAME: &'static str = "_Entity";

    pub(crate) fn new(members: Vec<Entity>) -> Self {
        let members: Vec<Arc<Entity>> = members.into_iter().map(Arc::new).collect();
        let by_name = members
            .iter()
            .enumerate()
            .map(|(index, member)| (member.name().to_string(), index))
            .collect();
        EntityUnion { members, by_name }
    }

    /// Union members, in discovery order
    pub fn members(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.members.iter()
    }

    /// Look up a member by type name
    pub fn member(&self, typename: &str) -> Option<&Arc<Entity>> {
        self.by_name
            .get(typename)
            .map(|&index| &self.members[index])
    }

    /// Resolve the concrete union member for a value. This reads the tag the
    /// resolver attached; the value's own fields are never consulted.
    pub fn resolve_type<'a>(&self, value: &'a EntityValue) -> &'a Arc<Entity> {
        value.entity()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for EntityUnion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityUnion")
            .field("members", &self.members)
            .finish()
    }
}
