//! Request-time entity resolution
//!
//! [`EntitiesResolver::resolve_entities`] takes the ordered representation
//! list of an `_entities` call and produces an output list of exactly the same
//! length and order. References are grouped by `__typename` so each type's
//! resolver runs exactly once per call, however the input interleaves types;
//! every resolved value is written back at its original input index. A failure
//! while resolving one reference nulls that slot and records an error at
//! `["_entities", index]` without touching any sibling.

use std::fmt;
use std::sync::Arc;

use async_graphql::{PathSegment, ServerError, Value};
use async_trait::async_trait;
use futures::future;
use indexmap::IndexMap;

use crate::any::Representation;
use crate::deferred::Deferred;
use crate::entity::{Entity, EntityUnion, EntityValue};
use crate::{FederationError, Result};

/// Outcome of resolving one reference
pub type ReferenceResult = async_graphql::Result<Value>;

/// Resolves one reference at a time.
///
/// Invoked once per reference of the owning type, in input order.
#[async_trait]
pub trait ResolveReference: Send + Sync {
    async fn resolve_reference(&self, reference: Representation) -> ReferenceResult;
}

/// Resolves all same-type references of a call at once.
///
/// Invoked exactly once per call with the type's references in their relative
/// input order. The returned list must be index-aligned with the input and of
/// the same length; entries may individually be deferred.
#[async_trait]
pub trait ResolveReferences: Send + Sync {
    async fn resolve_references(
        &self,
        references: Vec<Representation>,
    ) -> async_graphql::Result<Vec<Deferred<ReferenceResult>>>;
}

/// How an entity type resolves its references, selected once at schema
/// finalization: a batch resolver wins over a per-reference resolver; with
/// neither, references pass through unchanged.
#[derive(Clone)]
pub enum ResolverStrategy {
    Batch(Arc<dyn ResolveReferences>),
    PerReference(Arc<dyn ResolveReference>),
    Passthrough,
}

impl ResolverStrategy {
    pub fn batch(resolver: impl ResolveReferences + 'static) -> Self {
        ResolverStrategy::Batch(Arc::new(resolver))
    }

    pub fn per_reference(resolver: impl ResolveReference + 'static) -> Self {
        ResolverStrategy::PerReference(Arc::new(resolver))
    }
}

impl fmt::Debug for ResolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverStrategy::Batch(_) => f.write_str("ResolverStrategy::Batch"),
            ResolverStrategy::PerReference(_) => f.write_str("ResolverStrategy::PerReference"),
            ResolverStrategy::Passthrough => f.write_str("ResolverStrategy::Passthrough"),
        }
    }
}

/// Result of one `_entities` call: an entities list positionally matching the
/// input representations, plus the per-reference errors collected on the way.
#[derive(Debug, Default)]
pub struct ResolvedEntities {
    /// One slot per input representation; `None` renders as null
    pub entities: Vec<Option<EntityValue>>,
    /// Per-reference error records, each with path `["_entities", index]`
    pub errors: Vec<ServerError>,
}

impl ResolvedEntities {
    pub fn empty() -> Self {
        ResolvedEntities::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// The `_entities` field resolver
pub struct EntitiesResolver {
    union: Arc<EntityUnion>,
}

impl EntitiesResolver {
    pub fn new(union: Arc<EntityUnion>) -> Self {
        EntitiesResolver { union }
    }

    pub fn union(&self) -> &Arc<EntityUnion> {
        &self.union
    }

    /// Resolve a batch of representations.
    ///
    /// Fails the whole call only when a `__typename` does not name a known
    /// entity type. Everything else degrades per reference.
    pub async fn resolve_entities(
        &self,
        representations: Vec<Representation>,
    ) -> Result<ResolvedEntities> {
        if representations.is_empty() {
            return Ok(ResolvedEntities::empty());
        }
        let total = representations.len();

        // Partition by typename; index order within a group follows the input.
        let mut groups: IndexMap<String, Vec<(usize, Representation)>> = IndexMap::new();
        for (index, reference) in representations.into_iter().enumerate() {
            groups
                .entry(reference.typename().to_string())
                .or_default()
                .push((index, reference));
        }
        tracing::debug!(
            references = total,
            types = groups.len(),
            "resolving entity references"
        );

        // Every typename must resolve to a union member before any resolver
        // runs; an unknown type is a request-level fault.
        let mut batches = Vec::with_capacity(groups.len());
        for (typename, group) in groups {
            let entity = self
                .union
                .member(&typename)
                .ok_or(FederationError::UnknownEntityType(typename))?;
            batches.push((Arc::clone(entity), group));
        }

        // Scatter-gather: groups settle concurrently, in any order; each
        // outcome lands at its original input index.
        let mut slots: Vec<Option<EntityValue>> = (0..total).map(|_| None).collect();
        let mut indexed_errors: Vec<(usize, ServerError)> = Vec::new();
        let group_results = future::join_all(
            batches
                .into_iter()
                .map(|(entity, group)| resolve_group(entity, group)),
        )
        .await;
        for group in group_results {
            for (index, outcome) in group {
                match outcome {
                    Ok(Some(value)) => slots[index] = Some(value),
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(index, error = %error.message, "entity reference failed");
                        indexed_errors.push((index, reference_error(error, index)));
                    }
                }
            }
        }
        indexed_errors.sort_by_key(|(index, _)| *index);

        Ok(ResolvedEntities {
            entities: slots,
            errors: indexed_errors.into_iter().map(|(_, error)| error).collect(),
        })
    }
}

/// Resolve one type's references and tag each settled value with its entity.
/// Failures stay confined to their own index.
async fn resolve_group(
    entity: Arc<Entity>,
    group: Vec<(usize, Representation)>,
) -> Vec<(usize, async_graphql::Result<Option<EntityValue>>)> {
    let (indices, references): (Vec<usize>, Vec<Representation>) = group.into_iter().unzip();

    let outcomes: Vec<ReferenceResult> = match entity.resolver() {
        ResolverStrategy::Batch(resolver) => {
            match resolver.resolve_references(references).await {
                Ok(items) if items.len() == indices.len() => {
                    Deferred::join_all(items).resolve().await
                }
                Ok(items) => {
                    let error = async_graphql::Error::new(format!(
                        "batch resolver for type \"{}\" returned {} results for {} references",
                        entity.name(),
                        items.len(),
                        indices.len(),
                    ));
                    vec![Err(error); indices.len()]
                }
                Err(error) => vec![Err(error); indices.len()],
            }
        }
        ResolverStrategy::PerReference(resolver) => {
            future::join_all(
                references
                    .into_iter()
                    .map(|reference| resolver.resolve_reference(reference)),
            )
            .await
        }
        ResolverStrategy::Passthrough => references
            .into_iter()
            .map(|reference| Ok(reference.into_value()))
            .collect(),
    };

    indices
        .into_iter()
        .zip(outcomes)
        .map(|(index, outcome)| {
            let tagged = outcome.map(|value| match value {
                // An explicit null resolves the slot to null without an error.
                Value::Null => None,
                value => Some(EntityValue::new(Arc::clone(&entity), value)),
            });
            (index, tagged)
        })
        .collect()
}

fn reference_error(error: async_graphql::Error, index: usize) -> ServerError {
    let mut record = ServerError::new(error.message, None);
    record.extensions = error.extensions;
    record.path = vec![
        PathSegment::Field("_entities".to_string()),
        PathSegment::Index(index),
    ];
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use crate::entity::EntityKind;
    use crate::field_set::FieldSet;

    fn representation(json: serde_json::Value) -> Representation {
        Representation::from_json(json).unwrap()
    }

    fn union(entities: Vec<(&str, ResolverStrategy)>) -> EntityUnion {
        EntityUnion::new(
            entities
                .into_iter()
                .map(|(name, resolver)| {
                    Entity::new(
                        name.to_string(),
                        EntityKind::Object,
                        vec![FieldSet::fields(["id"])],
                        resolver,
                    )
                })
                .collect(),
        )
    }

    fn id_of(reference: &Representation) -> i64 {
        match reference.get("id") {
            Some(Value::Number(id)) => id.as_i64().unwrap(),
            other => panic!("unexpected id: {other:?}"),
        }
    }

    fn widget_value(id: i64, name: &str) -> Value {
        Value::from_json(json!({ "id": id, "name": name })).unwrap()
    }

    /// Batch resolver that looks widgets up by id and counts its invocations
    struct WidgetBatch {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl ResolveReferences for WidgetBatch {
        async fn resolve_references(
            &self,
            references: Vec<Representation>,
        ) -> async_graphql::Result<Vec<Deferred<ReferenceResult>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(references
                .into_iter()
                .map(|reference| {
                    let id = id_of(&reference);
                    if id % 2 == 0 {
                        // Even ids settle later; odd ids are ready immediately.
                        Deferred::pending(async move {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            Ok(widget_value(id, "widget"))
                        })
                    } else {
                        Deferred::ready(Ok(widget_value(id, "widget")))
                    }
                })
                .collect())
        }
    }

    impl WidgetBatch {
        fn strategy(calls: &Arc<AtomicUsize>) -> ResolverStrategy {
            ResolverStrategy::batch(WidgetBatch {
                calls: Arc::clone(calls),
                delay: Duration::ZERO,
            })
        }
    }

    /// Per-reference resolver that fails for a configured id
    struct GadgetResolver {
        calls: Arc<AtomicUsize>,
        failing_id: Option<i64>,
    }

    #[async_trait]
    impl ResolveReference for GadgetResolver {
        async fn resolve_reference(&self, reference: Representation) -> ReferenceResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = id_of(&reference);
            if Some(id) == self.failing_id {
                return Err(async_graphql::Error::new(format!("gadget {id} not found")));
            }
            Ok(Value::from_json(json!({ "id": id, "kind": "gadget" })).unwrap())
        }
    }

    fn entities_json(resolved: &ResolvedEntities) -> Vec<serde_json::Value> {
        resolved
            .entities
            .iter()
            .map(|slot| match slot {
                Some(value) => value.value().clone().into_json().unwrap(),
                None => serde_json::Value::Null,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_input_is_empty_output() {
        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Widget",
            ResolverStrategy::Passthrough,
        )])));
        let resolved = resolver.resolve_entities(Vec::new()).await.unwrap();
        assert!(resolved.entities.is_empty());
        assert!(!resolved.has_errors());
    }

    #[tokio::test]
    async fn test_batch_resolver_resolves_group() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Widget",
            WidgetBatch::strategy(&calls),
        )])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Widget", "id": 1 })),
                representation(json!({ "__typename": "Widget", "id": 2 })),
            ])
            .await
            .unwrap();

        assert!(!resolved.has_errors());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            entities_json(&resolved),
            vec![
                json!({ "id": 1, "name": "widget" }),
                json!({ "id": 2, "name": "widget" }),
            ],
        );
    }

    #[tokio::test]
    async fn test_interleaved_types_resolve_once_per_type_in_input_order() {
        let widget_calls = Arc::new(AtomicUsize::new(0));
        let gadget_calls = Arc::new(AtomicUsize::new(0));
        let resolver = EntitiesResolver::new(Arc::new(union(vec![
            ("Widget", WidgetBatch::strategy(&widget_calls)),
            (
                "Gadget",
                ResolverStrategy::per_reference(GadgetResolver {
                    calls: Arc::clone(&gadget_calls),
                    failing_id: None,
                }),
            ),
        ])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Widget", "id": 1 })),
                representation(json!({ "__typename": "Gadget", "id": 9 })),
                representation(json!({ "__typename": "Widget", "id": 2 })),
            ])
            .await
            .unwrap();

        assert!(!resolved.has_errors());
        // One batch call for Widget covering both references, one
        // per-reference call for Gadget's single reference.
        assert_eq!(widget_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gadget_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            entities_json(&resolved),
            vec![
                json!({ "id": 1, "name": "widget" }),
                json!({ "id": 9, "kind": "gadget" }),
                json!({ "id": 2, "name": "widget" }),
            ],
        );
    }

    #[tokio::test]
    async fn test_output_order_is_independent_of_completion_order() {
        // The widget batch sleeps well past the gadget resolver, so the
        // gadget group settles first; positions must not move.
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = EntitiesResolver::new(Arc::new(union(vec![
            (
                "Widget",
                ResolverStrategy::batch(WidgetBatch {
                    calls: Arc::clone(&calls),
                    delay: Duration::from_millis(40),
                }),
            ),
            (
                "Gadget",
                ResolverStrategy::per_reference(GadgetResolver {
                    calls: Arc::new(AtomicUsize::new(0)),
                    failing_id: None,
                }),
            ),
        ])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Widget", "id": 1 })),
                representation(json!({ "__typename": "Gadget", "id": 9 })),
            ])
            .await
            .unwrap();

        assert_eq!(
            entities_json(&resolved),
            vec![
                json!({ "id": 1, "name": "widget" }),
                json!({ "id": 9, "kind": "gadget" }),
            ],
        );
    }

    #[tokio::test]
    async fn test_per_reference_failure_is_isolated() {
        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Gadget",
            ResolverStrategy::per_reference(GadgetResolver {
                calls: Arc::new(AtomicUsize::new(0)),
                failing_id: Some(2),
            }),
        )])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Gadget", "id": 1 })),
                representation(json!({ "__typename": "Gadget", "id": 2 })),
            ])
            .await
            .unwrap();

        assert_eq!(
            entities_json(&resolved),
            vec![json!({ "id": 1, "kind": "gadget" }), serde_json::Value::Null],
        );
        assert_eq!(resolved.errors.len(), 1);
        assert_eq!(resolved.errors[0].message, "gadget 2 not found");
        assert_eq!(
            resolved.errors[0].path,
            vec![
                PathSegment::Field("_entities".to_string()),
                PathSegment::Index(1),
            ],
        );
    }

    #[tokio::test]
    async fn test_failure_in_one_group_leaves_other_groups_alone() {
        let widget_calls = Arc::new(AtomicUsize::new(0));
        let resolver = EntitiesResolver::new(Arc::new(union(vec![
            ("Widget", WidgetBatch::strategy(&widget_calls)),
            (
                "Gadget",
                ResolverStrategy::per_reference(GadgetResolver {
                    calls: Arc::new(AtomicUsize::new(0)),
                    failing_id: Some(9),
                }),
            ),
        ])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Gadget", "id": 9 })),
                representation(json!({ "__typename": "Widget", "id": 1 })),
            ])
            .await
            .unwrap();

        assert_eq!(
            entities_json(&resolved),
            vec![serde_json::Value::Null, json!({ "id": 1, "name": "widget" })],
        );
        assert_eq!(resolved.errors.len(), 1);
        assert_eq!(
            resolved.errors[0].path,
            vec![
                PathSegment::Field("_entities".to_string()),
                PathSegment::Index(0),
            ],
        );
    }

    #[tokio::test]
    async fn test_unknown_typename_fails_the_whole_call() {
        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Widget",
            ResolverStrategy::Passthrough,
        )])));

        let error = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Widget", "id": 1 })),
                representation(json!({ "__typename": "Unknown", "id": 9 })),
            ])
            .await
            .unwrap_err();

        match error {
            FederationError::UnknownEntityType(typename) => assert_eq!(typename, "Unknown"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_passthrough_returns_references_unchanged() {
        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Widget",
            ResolverStrategy::Passthrough,
        )])));

        let resolved = resolver
            .resolve_entities(vec![representation(
                json!({ "__typename": "Widget", "id": 1, "extra": "kept" }),
            )])
            .await
            .unwrap();

        assert!(!resolved.has_errors());
        assert_eq!(
            entities_json(&resolved),
            vec![json!({ "__typename": "Widget", "id": 1, "extra": "kept" })],
        );
    }

    #[tokio::test]
    async fn test_explicit_null_from_resolver_is_null_without_error() {
        struct NullResolver;

        #[async_trait]
        impl ResolveReference for NullResolver {
            async fn resolve_reference(&self, _reference: Representation) -> ReferenceResult {
                Ok(Value::Null)
            }
        }

        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Widget",
            ResolverStrategy::per_reference(NullResolver),
        )])));

        let resolved = resolver
            .resolve_entities(vec![representation(
                json!({ "__typename": "Widget", "id": 404 }),
            )])
            .await
            .unwrap();

        assert_eq!(entities_json(&resolved), vec![serde_json::Value::Null]);
        assert!(!resolved.has_errors());
    }

    #[tokio::test]
    async fn test_batch_arity_mismatch_is_confined_to_the_group() {
        struct ShortBatch;

        #[async_trait]
        impl ResolveReferences for ShortBatch {
            async fn resolve_references(
                &self,
                _references: Vec<Representation>,
            ) -> async_graphql::Result<Vec<Deferred<ReferenceResult>>> {
                Ok(vec![Deferred::ready(Ok(widget_value(1, "only")))])
            }
        }

        let resolver = EntitiesResolver::new(Arc::new(union(vec![
            ("Widget", ResolverStrategy::batch(ShortBatch)),
            ("Gadget", ResolverStrategy::Passthrough),
        ])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Widget", "id": 1 })),
                representation(json!({ "__typename": "Gadget", "id": 9 })),
                representation(json!({ "__typename": "Widget", "id": 2 })),
            ])
            .await
            .unwrap();

        assert_eq!(resolved.entities.len(), 3);
        assert!(resolved.entities[0].is_none());
        assert!(resolved.entities[1].is_some());
        assert!(resolved.entities[2].is_none());
        assert_eq!(resolved.errors.len(), 2);
        assert!(resolved.errors[0]
            .message
            .contains("returned 1 results for 2 references"));
        assert_eq!(
            resolved.errors[1].path,
            vec![
                PathSegment::Field("_entities".to_string()),
                PathSegment::Index(2),
            ],
        );
    }

    #[tokio::test]
    async fn test_batch_level_error_is_confined_to_the_group() {
        struct FailingBatch;

        #[async_trait]
        impl ResolveReferences for FailingBatch {
            async fn resolve_references(
                &self,
                _references: Vec<Representation>,
            ) -> async_graphql::Result<Vec<Deferred<ReferenceResult>>> {
                Err(async_graphql::Error::new("widget store unavailable"))
            }
        }

        let resolver = EntitiesResolver::new(Arc::new(union(vec![
            ("Widget", ResolverStrategy::batch(FailingBatch)),
            ("Gadget", ResolverStrategy::Passthrough),
        ])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Widget", "id": 1 })),
                representation(json!({ "__typename": "Gadget", "id": 9 })),
            ])
            .await
            .unwrap();

        assert!(resolved.entities[0].is_none());
        assert!(resolved.entities[1].is_some());
        assert_eq!(resolved.errors.len(), 1);
        assert_eq!(resolved.errors[0].message, "widget store unavailable");
    }

    #[tokio::test]
    async fn test_resolved_values_are_tagged_with_their_entity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = EntitiesResolver::new(Arc::new(union(vec![
            ("Widget", WidgetBatch::strategy(&calls)),
            ("Gadget", ResolverStrategy::Passthrough),
        ])));

        let resolved = resolver
            .resolve_entities(vec![
                representation(json!({ "__typename": "Gadget", "id": 9 })),
                representation(json!({ "__typename": "Widget", "id": 1 })),
            ])
            .await
            .unwrap();

        let typenames: Vec<&str> = resolved
            .entities
            .iter()
            .map(|slot| slot.as_ref().unwrap().typename())
            .collect();
        assert_eq!(typenames, vec!["Gadget", "Widget"]);
    }

    #[tokio::test]
    async fn test_same_input_resolves_identically() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Widget",
            WidgetBatch::strategy(&calls),
        )])));
        let references = vec![
            representation(json!({ "__typename": "Widget", "id": 2 })),
            representation(json!({ "__typename": "Widget", "id": 1 })),
        ];

        let first = resolver
            .resolve_entities(references.clone())
            .await
            .unwrap();
        let second = resolver.resolve_entities(references).await.unwrap();

        assert_eq!(entities_json(&first), entities_json(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_output_length_always_matches_input_length() {
        let resolver = EntitiesResolver::new(Arc::new(union(vec![(
            "Gadget",
            ResolverStrategy::per_reference(GadgetResolver {
                calls: Arc::new(AtomicUsize::new(0)),
                failing_id: Some(3),
            }),
        )])));

        for count in [1usize, 4, 9] {
            let references: Vec<Representation> = (0..count)
                .map(|id| representation(json!({ "__typename": "Gadget", "id": id })))
                .collect();
            let resolved = resolver.resolve_entities(references).await.unwrap();
            assert_eq!(resolved.entities.len(), count);
        }
    }
}
