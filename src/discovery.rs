//! Entity discovery
//!
//! Runs once, when the schema is finalized. Walks the type registry and
//! classifies key-bearing object types as entities. An interface carrying a
//! `@key` is an entity candidate; it is only valid if every object type
//! implementing it is itself an entity, otherwise finalization fails.

use std::fmt;

use crate::entity::EntityKind;
use crate::field_set::FieldSet;
use crate::registry::{SchemaMember, TypeRegistry};

const KEY_DIRECTIVE: &str = "key";

/// An interface entity has implementers without their own `@key` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionError {
    pub interface: String,
    /// Offending implementers, in discovery order
    pub offenders: Vec<String>,
}

impl std::error::Error for CompositionError {}

impl fmt::Display for CompositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interface {} is not valid. Types `{}` do not have a @key directive. \
             All types that implement an interface with a @key directive must also have a @key directive.",
            self.interface,
            self.offenders.join("`, `"),
        )
    }
}

/// A type classified as an entity, before resolver selection
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredEntity {
    pub name: String,
    pub kind: EntityKind,
    pub keys: Vec<FieldSet>,
}

/// Walk the registry and produce the entity set, in discovery order: objects
/// first as registered, then validated interface entities.
///
/// An empty result means the schema gets no `_entities` field and no
/// `_Entity` union at all.
pub fn discover_entities(
    registry: &TypeRegistry,
) -> Result<Vec<DiscoveredEntity>, CompositionError> {
    let mut entities = Vec::new();

    for object in registry.objects() {
        if object.federation_directives().contains(KEY_DIRECTIVE) {
            entities.push(DiscoveredEntity {
                name: object.name.clone(),
                kind: EntityKind::Object,
                keys: declared_keys(object.name.as_str(), object.federation_directives()),
            });
        }
    }

    for interface in registry.interfaces() {
        if !interface.federation_directives().contains(KEY_DIRECTIVE) {
            continue;
        }
        let offenders: Vec<String> = registry
            .implementers(&interface.name)
            .into_iter()
            .filter(|implementer| {
                !implementer.federation_directives().contains(KEY_DIRECTIVE)
            })
            .map(|implementer| implementer.name.clone())
            .collect();
        if !offenders.is_empty() {
            return Err(CompositionError {
                interface: interface.name.clone(),
                offenders,
            });
        }
        entities.push(DiscoveredEntity {
            name: interface.name.clone(),
            kind: EntityKind::Interface,
            keys: declared_keys(interface.name.as_str(), interface.federation_directives()),
        });
    }

    tracing::debug!(entities = entities.len(), "entity discovery complete");
    Ok(entities)
}

/// Parse every `@key(fields:)` argument on a member. A key whose fields
/// argument is not a parseable field set still marks the type as an entity
/// but contributes no structured key.
fn declared_keys(member: &str, directives: &crate::directives::DirectiveList) -> Vec<FieldSet> {
    directives
        .find_all(KEY_DIRECTIVE)
        .filter_map(|directive| {
            let fields = match directive.argument("fields") {
                Some(async_graphql::Value::String(fields)) => fields,
                _ => {
                    tracing::warn!(member, "key directive has no fields argument");
                    return None;
                }
            };
            let parsed = FieldSet::parse(fields);
            if parsed.is_none() {
                tracing::warn!(member, fields = %fields, "key directive fields do not parse");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::{self, DirectiveList};
    use crate::registry::{InterfaceDefinition, ObjectDefinition};

    fn keyed(name: &str) -> ObjectDefinition {
        ObjectDefinition::new(name)
            .with_directives(DirectiveList::new([directives::key(&FieldSet::fields(
                ["id"],
            ))]))
    }

    #[test]
    fn test_objects_with_key_become_entities() {
        let mut registry = TypeRegistry::new();
        registry.register_object(keyed("Product"));
        registry.register_object(ObjectDefinition::new("Plain"));
        registry.register_object(keyed("Review"));

        let entities = discover_entities(&registry).unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Product", "Review"]);
        assert!(entities.iter().all(|e| e.kind == EntityKind::Object));
        assert_eq!(entities[0].keys[0].to_string(), "id");
    }

    #[test]
    fn test_no_key_directives_means_no_entities() {
        let mut registry = TypeRegistry::new();
        registry.register_object(ObjectDefinition::new("Plain"));
        assert!(discover_entities(&registry).unwrap().is_empty());
    }

    #[test]
    fn test_valid_interface_entity_is_promoted() {
        let mut registry = TypeRegistry::new();
        registry.register_interface(
            InterfaceDefinition::new("Product")
                .with_directives(DirectiveList::new([directives::key(&FieldSet::fields(
                    ["id"],
                ))])),
        );
        registry.register_object(keyed("Book").implements("Product"));
        registry.register_object(keyed("Movie").implements("Product"));

        let entities = discover_entities(&registry).unwrap();
        let names: Vec<(&str, EntityKind)> = entities
            .iter()
            .map(|e| (e.name.as_str(), e.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Book", EntityKind::Object),
                ("Movie", EntityKind::Object),
                ("Product", EntityKind::Interface),
            ],
        );
    }

    #[test]
    fn test_interface_with_keyless_implementer_fails_composition() {
        let mut registry = TypeRegistry::new();
        registry.register_interface(
            InterfaceDefinition::new("User")
                .with_directives(DirectiveList::new([directives::key(&FieldSet::fields(
                    ["id"],
                ))])),
        );
        registry.register_object(keyed("Admin").implements("User"));
        registry.register_object(ObjectDefinition::new("Manager").implements("User"));

        let error = discover_entities(&registry).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Interface User is not valid. Types `Manager` do not have a @key directive. \
             All types that implement an interface with a @key directive must also have a @key directive.",
        );
    }

    #[test]
    fn test_composition_error_joins_offenders_in_discovery_order() {
        let mut registry = TypeRegistry::new();
        registry.register_interface(
            InterfaceDefinition::new("User")
                .with_directives(DirectiveList::new([directives::key(&FieldSet::fields(
                    ["id"],
                ))])),
        );
        registry.register_object(ObjectDefinition::new("Manager").implements("User"));
        registry.register_object(ObjectDefinition::new("Intern").implements("User"));

        let error = discover_entities(&registry).unwrap_err();
        assert_eq!(error.offenders, vec!["Manager", "Intern"]);
        assert!(error
            .to_string()
            .contains("Types `Manager`, `Intern` do not have a @key directive"));
    }

    #[test]
    fn test_interface_without_key_is_not_a_candidate() {
        let mut registry = TypeRegistry::new();
        registry.register_interface(InterfaceDefinition::new("Node"));
        // Implementer without a key would fail composition if Node were a
        // candidate, but a keyless interface is simply not one.
        registry.register_object(ObjectDefinition::new("Widget").implements("Node"));

        assert!(discover_entities(&registry).unwrap().is_empty());
    }
}
