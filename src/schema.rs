//! Subgraph schema finalization
//!
//! [`SubgraphSchemaBuilder`] collects type declarations, reference resolvers
//! and the SDL provider; [`SubgraphSchemaBuilder::finish`] runs entity
//! discovery exactly once, builds the `_Entity` union, and attaches the
//! federation fields to the root query type (synthesizing one if the subgraph
//! declares no query type of its own). The resulting [`SubgraphSchema`] is the
//! surface a host execution engine dispatches `_entities` and `_service` to.

use std::collections::HashMap;
use std::sync::Arc;

use crate::any::Representation;
use crate::discovery::{discover_entities, DiscoveredEntity};
use crate::entity::{Entity, EntityUnion};
use crate::registry::{
    ArgumentDefinition, FieldDefinition, InterfaceDefinition, ObjectDefinition, TypeRegistry,
};
use crate::resolver::{
    EntitiesResolver, ResolveReference, ResolveReferences, ResolvedEntities, ResolverStrategy,
};
use crate::{FederationError, Result};

/// Default name for a synthesized root query type
const DEFAULT_QUERY_NAME: &str = "Query";

/// Payload of the `_service` field
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub sdl: Option<String>,
}

/// Renders the subgraph's federation SDL on demand. Rendering itself is the
/// host's concern; this library only carries the hook.
pub type SdlProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// The `_entities` operation registered on the root query type
pub struct EntitiesOperation {
    field: FieldDefinition,
    resolver: EntitiesResolver,
}

impl EntitiesOperation {
    /// The `_entities(representations: [_Any!]!): [_Entity]!` field definition
    pub fn field(&self) -> &FieldDefinition {
        &self.field
    }

    pub fn resolver(&self) -> &EntitiesResolver {
        &self.resolver
    }

    pub fn union(&self) -> &Arc<EntityUnion> {
        self.resolver.union()
    }
}

/// A finalized federation subgraph schema
pub struct SubgraphSchema {
    registry: TypeRegistry,
    query_type: ObjectDefinition,
    mutation_type: Option<ObjectDefinition>,
    subscription_type: Option<ObjectDefinition>,
    entities: Option<EntitiesOperation>,
    sdl_provider: Option<SdlProvider>,
}

impl std::fmt::Debug for SubgraphSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubgraphSchema")
            .field("registry", &self.registry)
            .field("query_type", &self.query_type)
            .field("mutation_type", &self.mutation_type)
            .field("subscription_type", &self.subscription_type)
            .field("entities", &self.entities.as_ref().map(|_| "..."))
            .field("sdl_provider", &self.sdl_provider.as_ref().map(|_| "..."))
            .finish()
    }
}

impl SubgraphSchema {
    pub fn build() -> SubgraphSchemaBuilder {
        SubgraphSchemaBuilder::new()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The root query type, carrying the federation fields. Synthesized when
    /// the subgraph declared no query type.
    pub fn query_type(&self) -> &ObjectDefinition {
        &self.query_type
    }

    /// The user-declared mutation type, untouched by finalization
    pub fn mutation_type(&self) -> Option<&ObjectDefinition> {
        self.mutation_type.as_ref()
    }

    /// The user-declared subscription type, untouched by finalization
    pub fn subscription_type(&self) -> Option<&ObjectDefinition> {
        self.subscription_type.as_ref()
    }

    /// The `_entities` operation, absent when discovery found no entities
    pub fn entities(&self) -> Option<&EntitiesOperation> {
        self.entities.as_ref()
    }

    /// The `_Entity` union, absent when discovery found no entities
    pub fn entity_union(&self) -> Option<&Arc<EntityUnion>> {
        self.entities.as_ref().map(EntitiesOperation::union)
    }

    /// Resolve a batch of representations against this schema.
    ///
    /// With no entities discovered there is no `_entities` field, so any
    /// non-empty input fails the same way an unknown typename does.
    pub async fn resolve_entities(
        &self,
        representations: Vec<Representation>,
    ) -> Result<ResolvedEntities> {
        match &self.entities {
            Some(operation) => operation.resolver().resolve_entities(representations).await,
            None => match representations.into_iter().next() {
                None => Ok(ResolvedEntities::empty()),
                Some(reference) => Err(FederationError::UnknownEntityType(
                    reference.typename().to_string(),
                )),
            },
        }
    }

    /// Resolve the `_service` field
    pub fn service(&self) -> ServiceDefinition {
        ServiceDefinition {
            sdl: self.sdl_provider.as_ref().map(|provider| provider()),
        }
    }
}

/// Collects subgraph declarations until finalization
#[derive(Default)]
pub struct SubgraphSchemaBuilder {
    registry: TypeRegistry,
    query: Option<ObjectDefinition>,
    mutation: Option<ObjectDefinition>,
    subscription: Option<ObjectDefinition>,
    batch_resolvers: HashMap<String, Arc<dyn ResolveReferences>>,
    reference_resolvers: HashMap<String, Arc<dyn ResolveReference>>,
    sdl_provider: Option<SdlProvider>,
}

impl SubgraphSchemaBuilder {
    pub fn new() -> Self {
        SubgraphSchemaBuilder::default()
    }

    /// Register an object type
    pub fn object(mut self, object: ObjectDefinition) -> Self {
        self.registry.register_object(object);
        self
    }

    /// Register an interface type
    pub fn interface(mut self, interface: InterfaceDefinition) -> Self {
        self.registry.register_interface(interface);
        self
    }

    /// Declare the root query type. Finalization appends the federation
    /// fields to it.
    pub fn query(mut self, query: ObjectDefinition) -> Self {
        self.query = Some(query);
        self
    }

    /// Declare the mutation type; finalization leaves it untouched
    pub fn mutation(mut self, mutation: ObjectDefinition) -> Self {
        self.mutation = Some(mutation);
        self
    }

    /// Declare the subscription type; finalization leaves it untouched
    pub fn subscription(mut self, subscription: ObjectDefinition) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Register a batch resolver for an entity type. Takes priority over a
    /// per-reference resolver registered for the same type.
    pub fn resolve_references(
        mut self,
        typename: impl Into<String>,
        resolver: impl ResolveReferences + 'static,
    ) -> Self {
        self.batch_resolvers
            .insert(typename.into(), Arc::new(resolver));
        self
    }

    /// Register a per-reference resolver for an entity type
    pub fn resolve_reference(
        mut self,
        typename: impl Into<String>,
        resolver: impl ResolveReference + 'static,
    ) -> Self {
        self.reference_resolvers
            .insert(typename.into(), Arc::new(resolver));
        self
    }

    /// Provide the federation SDL as a fixed string
    pub fn sdl(self, sdl: impl Into<String>) -> Self {
        let sdl = sdl.into();
        self.sdl_provider(move || sdl.clone())
    }

    /// Provide the federation SDL lazily
    pub fn sdl_provider(mut self, provider: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.sdl_provider = Some(Arc::new(provider));
        self
    }

    /// Finalize the schema: discover entities, build the `_Entity` union and
    /// attach the federation fields. Fails if an interface entity has
    /// implementers without their own key.
    pub fn finish(mut self) -> Result<SubgraphSchema> {
        let discovered = discover_entities(&self.registry)?;

        let entities = if discovered.is_empty() {
            None
        } else {
            let members: Vec<Entity> = discovered
                .into_iter()
                .map(|entity| self.select_strategy(entity))
                .collect();
            let union = Arc::new(EntityUnion::new(members));
            tracing::debug!(members = union.len(), "built _Entity union");
            Some(EntitiesOperation {
                field: entities_field(),
                resolver: EntitiesResolver::new(union),
            })
        };

        for typename in self
            .batch_resolvers
            .keys()
            .chain(self.reference_resolvers.keys())
        {
            tracing::warn!(
                typename = typename.as_str(),
                "resolver registered for a type that is not an entity"
            );
        }

        let mut query_type = self
            .query
            .unwrap_or_else(|| ObjectDefinition::new(DEFAULT_QUERY_NAME));
        if let Some(operation) = &entities {
            query_type = query_type.with_field(operation.field.clone());
        }
        query_type = query_type.with_field(service_field());

        Ok(SubgraphSchema {
            registry: self.registry,
            query_type,
            mutation_type: self.mutation,
            subscription_type: self.subscription,
            entities,
            sdl_provider: self.sdl_provider,
        })
    }

    /// Pick the resolution strategy for one discovered entity: batch wins,
    /// then per-reference, then passthrough.
    fn select_strategy(&mut self, entity: DiscoveredEntity) -> Entity {
        let strategy = if let Some(batch) = self.batch_resolvers.remove(&entity.name) {
            // A per-reference resolver shadowed by the batch resolver is not
            // a stray registration.
            self.reference_resolvers.remove(&entity.name);
            ResolverStrategy::Batch(batch)
        } else if let Some(per_reference) = self.reference_resolvers.remove(&entity.name) {
            ResolverStrategy::PerReference(per_reference)
        } else {
            ResolverStrategy::Passthrough
        };
        Entity::new(entity.name, entity.kind, entity.keys, strategy)
    }
}

fn entities_field() -> FieldDefinition {
    FieldDefinition::new("_entities", "[_Entity]!")
        .with_argument(ArgumentDefinition::new("representations", "[_Any!]!"))
}

fn service_field() -> FieldDefinition {
    FieldDefinition::new("_service", "_Service!")
}
