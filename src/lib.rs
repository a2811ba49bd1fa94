//! # pleme-federation
//!
//! Apollo Federation v2 subgraph library for Pleme platform services.
//!
//! ## Features
//!
//! - **Entity Discovery** - Finds entity types (and interface entities) at
//!   schema finalization and builds the `_Entity` union
//! - **Entity Resolution** - Order-preserving, batched resolution of
//!   `_entities` representations with per-reference error isolation
//! - **Federation Directives** - Typed declaration helpers for `@key`,
//!   `@external`, `@requires`, `@provides`, `@shareable` and friends
//! - **Deferred Values** - Uniform handling of synchronous and asynchronous
//!   reference resolvers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pleme_federation::{directives, DirectiveList, FieldSet, ObjectDefinition, SubgraphSchema};
//!
//! # async fn example() -> pleme_federation::Result<()> {
//! let schema = SubgraphSchema::build()
//!     .object(
//!         ObjectDefinition::new("Product")
//!             .with_directives(DirectiveList::new([directives::key(&FieldSet::fields(["id"]))])),
//!     )
//!     .finish()?;
//!
//! let representations = vec![pleme_federation::Representation::from_json(
//!     serde_json::json!({ "__typename": "Product", "id": "1" }),
//! )?];
//! let resolved = schema.resolve_entities(representations).await?;
//! assert_eq!(resolved.entities.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod any;
pub mod deferred;
pub mod directives;
pub mod discovery;
pub mod entity;
pub mod field_set;
pub mod registry;
pub mod resolver;
pub mod schema;

pub use any::Representation;
pub use deferred::Deferred;
pub use directives::{DirectiveArgument, DirectiveList, FederationDirective};
pub use discovery::CompositionError;
pub use entity::{Entity, EntityKind, EntityUnion, EntityValue};
pub use field_set::{FieldSet, Selection};
pub use registry::{
    ArgumentDefinition, FieldDefinition, InterfaceDefinition, ObjectDefinition, SchemaMember,
    TypeDefinition, TypeRegistry,
};
pub use resolver::{
    EntitiesResolver, ReferenceResult, ResolveReference, ResolveReferences, ResolvedEntities,
    ResolverStrategy,
};
pub use schema::{ServiceDefinition, SubgraphSchema, SubgraphSchemaBuilder};

use thiserror::Error;

/// Federation errors
#[derive(Error, Debug)]
pub enum FederationError {
    /// Schema finalization failed because an interface entity has implementers
    /// without their own `@key`.
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// A `__typename` in the request does not name a known entity type.
    /// Fatal for the whole `_entities` call.
    #[error("The _entities resolver tried to load an entity for type \"{0}\", but no object type of that name was found in the schema")]
    UnknownEntityType(String),

    /// A representation could not be coerced to the `_Any` scalar.
    #[error("can't coerce value `{0}` to type _Any")]
    IncoercibleAnyValue(String),

    /// A representation has no `__typename` field.
    #[error("representation is missing the required \"__typename\" field")]
    MissingTypename,
}

/// Result type for federation operations
pub type Result<T> = std::result::Result<T, FederationError>;
