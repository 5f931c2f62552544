//! # Facet Store
//!
//! Attaches typed configuration documents to an Entity or a Relation.
//!
//! The owner is verified inside the same write transaction that inserts the
//! facet, so a facet can never be created against a missing or concurrently
//! deleted owner. The type tag is fixed at creation; only the configuration
//! can be replaced afterwards.

use crate::formats::{decode_document, encode_document};
use crate::graph::{GraphBackend, ReadTxn};
use crate::policy::GraphPolicy;
use crate::primitives::validate_facet_type;
use crate::{Document, Facet, FacetId, FacetRecord, GraphError, NewFacet, Owner};

/// Create, read, update and delete operations for facets.
pub struct FacetStore;

impl FacetStore {
    /// Attach a new facet to its owner.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty or oversized type tag or configuration
    /// - `NotFound` if the owner does not exist with the given kind
    /// - `Conflict` if `policy.unique_facet_types` is set and the owner already
    ///   carries a facet of this type
    pub fn add<B: GraphBackend>(
        store: &B,
        policy: &GraphPolicy,
        new: NewFacet,
    ) -> Result<Facet, GraphError> {
        validate_facet_type(&new.facet_type)?;
        let text = encode_document(&new.configuration)?;

        let record = FacetRecord {
            id: FacetId::new(),
            owner: new.owner,
            facet_type: new.facet_type,
            configuration: text,
        };

        store.write(|txn| {
            if !txn.contains_owner(record.owner)? {
                return Err(GraphError::owner_not_found(record.owner));
            }
            if policy.unique_facet_types
                && txn
                    .facets_of(record.owner)?
                    .iter()
                    .any(|existing| existing.facet_type == record.facet_type)
            {
                tracing::warn!(owner = %record.owner, facet_type = %record.facet_type, "duplicate facet type rejected");
                return Err(GraphError::Conflict(format!(
                    "{} already has a '{}' facet",
                    record.owner, record.facet_type
                )));
            }
            txn.put_facet(&record)
        })?;

        tracing::debug!(facet = %record.id, owner = %record.owner, facet_type = %record.facet_type, "facet added");
        Ok(Facet {
            id: record.id,
            owner: record.owner,
            facet_type: record.facet_type,
            configuration: new.configuration,
        })
    }

    /// Fetch a facet with its owner reference.
    pub fn get<B: GraphBackend>(store: &B, id: FacetId) -> Result<Facet, GraphError> {
        let record = store
            .read(|txn| txn.facet(id))?
            .ok_or_else(|| GraphError::facet_not_found(id))?;
        Ok(hydrate(record))
    }

    /// Replace a facet's configuration. The type tag is left as it was.
    pub fn update<B: GraphBackend>(
        store: &B,
        id: FacetId,
        configuration: Document,
    ) -> Result<Facet, GraphError> {
        let text = encode_document(&configuration)?;

        let record = store.write(|txn| {
            let mut record = txn.facet(id)?.ok_or_else(|| GraphError::facet_not_found(id))?;
            record.configuration = text;
            txn.put_facet(&record)?;
            Ok(record)
        })?;

        tracing::debug!(facet = %id, "facet configuration replaced");
        Ok(Facet {
            id: record.id,
            owner: record.owner,
            facet_type: record.facet_type,
            configuration,
        })
    }

    /// Remove a facet. Returns whether it existed; removing a missing facet
    /// is not an error.
    pub fn delete<B: GraphBackend>(store: &B, id: FacetId) -> Result<bool, GraphError> {
        let removed = store.write(|txn| txn.remove_facet(id))?;
        if removed {
            tracing::debug!(facet = %id, "facet deleted");
        }
        Ok(removed)
    }

    /// Facets owned by `owner`, ordered by (type, id).
    pub fn list_for<B: GraphBackend>(store: &B, owner: Owner) -> Result<Vec<Facet>, GraphError> {
        store.read(|txn| {
            if !txn.contains_owner(owner)? {
                return Err(GraphError::owner_not_found(owner));
            }
            load_for(txn, owner)
        })
    }
}

/// Decode a stored facet row.
pub(crate) fn hydrate(record: FacetRecord) -> Facet {
    let configuration = decode_document(record.id, &record.configuration);
    Facet {
        id: record.id,
        owner: record.owner,
        facet_type: record.facet_type,
        configuration,
    }
}

/// Load and decode every facet of `owner`, ordered by (type, id).
pub(crate) fn load_for<V: ReadTxn + ?Sized>(view: &V, owner: Owner) -> Result<Vec<Facet>, GraphError> {
    let mut records = view.facets_of(owner)?;
    records.sort_by(|a, b| a.facet_type.cmp(&b.facet_type).then(a.id.cmp(&b.id)));
    Ok(records.into_iter().map(hydrate).collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{MemoryGraph, WriteTxn};
    use crate::{EntityId, EntityRecord, RelationId, empty_document};
    use serde_json::json;

    fn graph_with_entity() -> (MemoryGraph, EntityId) {
        let graph = MemoryGraph::new();
        let record = EntityRecord {
            id: EntityId::new(),
            name: "Driver".to_string(),
            description: None,
        };
        graph.write(|txn| txn.put_entity(&record)).expect("seed");
        (graph, record.id)
    }

    #[test]
    fn add_then_get_roundtrips() {
        let (graph, entity) = graph_with_entity();
        let config = json!({ "name": "license_number", "dataType": "string" });

        let facet = FacetStore::add(
            &graph,
            &GraphPolicy::default(),
            NewFacet::new(entity, "property", config.clone()),
        )
        .expect("add");

        let fetched = FacetStore::get(&graph, facet.id).expect("get");
        assert_eq!(fetched, facet);
        assert_eq!(fetched.configuration, config);
        assert_eq!(fetched.owner, Owner::Entity(entity));
    }

    #[test]
    fn add_to_missing_owner_creates_nothing() {
        let graph = MemoryGraph::new();
        let ghost = EntityId::new();

        let result = FacetStore::add(
            &graph,
            &GraphPolicy::default(),
            NewFacet::new(ghost, "property", json!({})),
        );
        assert!(matches!(result, Err(GraphError::NotFound { .. })));

        let counts = graph.read(|txn| txn.counts()).expect("counts");
        assert_eq!(counts.facets, 0);
    }

    #[test]
    fn owner_kind_must_match() {
        let (graph, entity) = graph_with_entity();
        let wrong_kind = Owner::Relation(RelationId::from_uuid(entity.as_uuid()));

        let result = FacetStore::add(
            &graph,
            &GraphPolicy::default(),
            NewFacet::new(wrong_kind, "criteria", json!({})),
        );
        assert!(matches!(result, Err(GraphError::NotFound { .. })));
    }

    #[test]
    fn empty_type_rejected() {
        let (graph, entity) = graph_with_entity();
        let result = FacetStore::add(
            &graph,
            &GraphPolicy::default(),
            NewFacet::new(entity, "", json!({})),
        );
        assert!(matches!(result, Err(GraphError::InvalidArgument(_))));
    }

    #[test]
    fn duplicate_types_follow_policy() {
        let (graph, entity) = graph_with_entity();
        let permissive = GraphPolicy::default();
        let strict = GraphPolicy {
            unique_facet_types: true,
            ..GraphPolicy::default()
        };

        FacetStore::add(&graph, &strict, NewFacet::new(entity, "lifecycle", json!({})))
            .expect("first");
        let second = FacetStore::add(&graph, &strict, NewFacet::new(entity, "lifecycle", json!({})));
        assert!(matches!(second, Err(GraphError::Conflict(_))));

        FacetStore::add(&graph, &permissive, NewFacet::new(entity, "lifecycle", json!({})))
            .expect("permissive duplicate");
        FacetStore::add(&graph, &strict, NewFacet::new(entity, "property", json!({})))
            .expect("other type");

        let facets = FacetStore::list_for(&graph, Owner::Entity(entity)).expect("list");
        let types: Vec<_> = facets.iter().map(|f| f.facet_type.as_str()).collect();
        assert_eq!(types, vec!["lifecycle", "lifecycle", "property"]);
    }

    #[test]
    fn update_replaces_configuration_only() {
        let (graph, entity) = graph_with_entity();
        let facet = FacetStore::add(
            &graph,
            &GraphPolicy::default(),
            NewFacet::new(entity, "criteria", json!({ "rule": "x > 10" })),
        )
        .expect("add");

        let updated =
            FacetStore::update(&graph, facet.id, json!({ "rule": "x > 20" })).expect("update");
        assert_eq!(updated.facet_type, "criteria");
        assert_eq!(updated.configuration, json!({ "rule": "x > 20" }));
        assert_eq!(FacetStore::get(&graph, facet.id).expect("get"), updated);
    }

    #[test]
    fn update_missing_is_not_found() {
        let graph = MemoryGraph::new();
        let result = FacetStore::update(&graph, FacetId::new(), json!({}));
        assert!(matches!(result, Err(GraphError::NotFound { .. })));
    }

    #[test]
    fn delete_is_idempotent() {
        let (graph, entity) = graph_with_entity();
        let facet = FacetStore::add(
            &graph,
            &GraphPolicy::default(),
            NewFacet::new(entity, "property", json!({})),
        )
        .expect("add");

        assert!(FacetStore::delete(&graph, facet.id).expect("delete"));
        assert!(!FacetStore::delete(&graph, facet.id).expect("delete again"));
        assert!(matches!(
            FacetStore::get(&graph, facet.id),
            Err(GraphError::NotFound { .. })
        ));
    }

    #[test]
    fn malformed_stored_configuration_reads_as_empty() {
        let (graph, entity) = graph_with_entity();
        let record = FacetRecord {
            id: FacetId::new(),
            owner: Owner::Entity(entity),
            facet_type: "property".to_string(),
            configuration: "{\"name\": ".to_string(),
        };
        graph.write(|txn| txn.put_facet(&record)).expect("seed");

        let facet = FacetStore::get(&graph, record.id).expect("get");
        assert_eq!(facet.configuration, empty_document());
    }
}
