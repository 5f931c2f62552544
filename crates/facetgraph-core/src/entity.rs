//! # Entity Store
//!
//! Nodes of the domain graph. A fetched entity is hydrated with its facets
//! and every relation touching it, each relation carrying its own facets.
//! Deletion is delegated to the cascade deleter.

use crate::cascade::{CascadeDeleter, CascadeReport};
use crate::facet::load_for;
use crate::graph::{GraphBackend, ReadTxn};
use crate::policy::GraphPolicy;
use crate::primitives::{validate_description, validate_name};
use crate::relation;
use crate::{
    Entity, EntityId, EntityPatch, EntityRecord, GraphError, NewEntity, Owner, Relation,
    RelationRecord,
};

/// Create, read, update and delete operations for entities.
pub struct EntityStore;

impl EntityStore {
    /// Create an entity with no facets and no relations.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty or oversized name or description
    /// - `Conflict` if `policy.unique_entity_names` is set and the name is taken
    pub fn create<B: GraphBackend>(
        store: &B,
        policy: &GraphPolicy,
        new: NewEntity,
    ) -> Result<Entity, GraphError> {
        validate_name("entity name", &new.name)?;
        validate_description(new.description.as_deref())?;

        let record = EntityRecord {
            id: EntityId::new(),
            name: new.name,
            description: new.description,
        };

        store.write(|txn| {
            if policy.unique_entity_names && name_taken(&*txn, &record.name, None)? {
                tracing::warn!(name = %record.name, "duplicate entity name rejected");
                return Err(name_conflict(&record.name));
            }
            txn.put_entity(&record)
        })?;

        tracing::debug!(entity = %record.id, name = %record.name, "entity created");
        Ok(Entity::bare(record))
    }

    /// Fetch a fully hydrated entity.
    pub fn get<B: GraphBackend>(store: &B, id: EntityId) -> Result<Entity, GraphError> {
        store.read(|txn| {
            let record = txn.entity(id)?.ok_or_else(|| GraphError::entity_not_found(id))?;
            hydrate(txn, record)
        })
    }

    /// Every entity, without facets or relations, ordered by (name, id).
    pub fn list<B: GraphBackend>(store: &B) -> Result<Vec<Entity>, GraphError> {
        let mut records = store.read(|txn| txn.entities())?;
        records.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(records.into_iter().map(Entity::bare).collect())
    }

    /// Apply a partial update; absent fields are left unchanged.
    pub fn update<B: GraphBackend>(
        store: &B,
        policy: &GraphPolicy,
        id: EntityId,
        patch: EntityPatch,
    ) -> Result<Entity, GraphError> {
        if let Some(name) = &patch.name {
            validate_name("entity name", name)?;
        }
        validate_description(patch.description.as_deref())?;

        let entity = store.write(|txn| {
            let mut record = txn.entity(id)?.ok_or_else(|| GraphError::entity_not_found(id))?;

            if let Some(name) = patch.name {
                if policy.unique_entity_names
                    && name != record.name
                    && name_taken(&*txn, &name, Some(id))?
                {
                    return Err(name_conflict(&name));
                }
                record.name = name;
            }
            if let Some(description) = patch.description {
                record.description = Some(description);
            }

            txn.put_entity(&record)?;
            hydrate(&*txn, record)
        })?;

        tracing::debug!(entity = %id, "entity updated");
        Ok(entity)
    }

    /// Delete an entity and everything that depends on it.
    ///
    /// Succeeds with an empty report when the entity is already gone.
    pub fn delete<B: GraphBackend>(store: &B, id: EntityId) -> Result<CascadeReport, GraphError> {
        CascadeDeleter::delete_entity(store, id)
    }
}

fn hydrate<V: ReadTxn + ?Sized>(view: &V, record: EntityRecord) -> Result<Entity, GraphError> {
    let facets = load_for(view, Owner::Entity(record.id))?;
    let outgoing = hydrate_relations(view, view.outgoing(record.id)?)?;
    let incoming = hydrate_relations(view, view.incoming(record.id)?)?;

    Ok(Entity {
        facets,
        outgoing,
        incoming,
        ..Entity::bare(record)
    })
}

/// Hydrate relation rows, ordered by (name, id).
fn hydrate_relations<V: ReadTxn + ?Sized>(
    view: &V,
    mut records: Vec<RelationRecord>,
) -> Result<Vec<Relation>, GraphError> {
    records.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    records
        .into_iter()
        .map(|record| relation::hydrate(view, record))
        .collect()
}

fn name_taken<V: ReadTxn + ?Sized>(
    view: &V,
    name: &str,
    except: Option<EntityId>,
) -> Result<bool, GraphError> {
    Ok(view
        .entities()?
        .iter()
        .any(|existing| existing.name == name && Some(existing.id) != except))
}

fn name_conflict(name: &str) -> GraphError {
    GraphError::Conflict(format!("an entity named '{}' already exists", name))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetStore;
    use crate::graph::MemoryGraph;
    use crate::relation::RelationStore;
    use crate::{NewFacet, NewRelation};
    use serde_json::json;

    #[test]
    fn create_returns_bare_entity() {
        let graph = MemoryGraph::new();
        let entity = EntityStore::create(
            &graph,
            &GraphPolicy::default(),
            NewEntity::new("Driver").with_description("A licensed driver"),
        )
        .expect("create");

        assert_eq!(entity.name, "Driver");
        assert_eq!(entity.description.as_deref(), Some("A licensed driver"));
        assert!(entity.facets.is_empty());
        assert!(entity.outgoing.is_empty());
        assert!(entity.incoming.is_empty());
    }

    #[test]
    fn blank_name_rejected() {
        let graph = MemoryGraph::new();
        for name in ["", "   "] {
            let result = EntityStore::create(&graph, &GraphPolicy::default(), NewEntity::new(name));
            assert!(matches!(result, Err(GraphError::InvalidArgument(_))));
        }
        assert!(EntityStore::list(&graph).expect("list").is_empty());
    }

    #[test]
    fn duplicate_names_follow_policy() {
        let graph = MemoryGraph::new();
        let strict = GraphPolicy {
            unique_entity_names: true,
            ..GraphPolicy::default()
        };

        EntityStore::create(&graph, &strict, NewEntity::new("Vehicle")).expect("first");
        let dup = EntityStore::create(&graph, &strict, NewEntity::new("Vehicle"));
        assert!(matches!(dup, Err(GraphError::Conflict(_))));

        EntityStore::create(&graph, &GraphPolicy::default(), NewEntity::new("Vehicle"))
            .expect("permissive duplicate");
        assert_eq!(EntityStore::list(&graph).expect("list").len(), 2);
    }

    #[test]
    fn list_is_sorted_by_name() {
        let graph = MemoryGraph::new();
        let policy = GraphPolicy::default();
        for name in ["Vehicle", "Driver", "License"] {
            EntityStore::create(&graph, &policy, NewEntity::new(name)).expect("create");
        }
        let names: Vec<_> = EntityStore::list(&graph)
            .expect("list")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Driver", "License", "Vehicle"]);
    }

    #[test]
    fn get_hydrates_facets_and_both_directions() {
        let graph = MemoryGraph::new();
        let policy = GraphPolicy::default();
        let driver = EntityStore::create(&graph, &policy, NewEntity::new("Driver")).expect("driver");
        let license = EntityStore::create(&graph, &policy, NewEntity::new("License")).expect("license");
        let person = EntityStore::create(&graph, &policy, NewEntity::new("Person")).expect("person");

        let has_license = RelationStore::create(
            &graph,
            &policy,
            NewRelation::new(driver.id, license.id, "has_license"),
        )
        .expect("relation");
        RelationStore::create(&graph, &policy, NewRelation::new(person.id, driver.id, "is_a"))
            .expect("relation");

        FacetStore::add(
            &graph,
            &policy,
            NewFacet::new(driver.id, "property", json!({ "name": "license_number" })),
        )
        .expect("entity facet");
        FacetStore::add(
            &graph,
            &policy,
            NewFacet::new(has_license.id, "criteria", json!({ "rule": "valid" })),
        )
        .expect("relation facet");

        let fetched = EntityStore::get(&graph, driver.id).expect("get");
        assert_eq!(fetched.facets.len(), 1);
        assert_eq!(fetched.outgoing.len(), 1);
        assert_eq!(fetched.outgoing[0].target, license.id);
        assert_eq!(fetched.outgoing[0].facets.len(), 1);
        assert_eq!(fetched.incoming.len(), 1);
        assert_eq!(fetched.incoming[0].source, person.id);
    }

    #[test]
    fn update_is_partial() {
        let graph = MemoryGraph::new();
        let policy = GraphPolicy::default();
        let created = EntityStore::create(
            &graph,
            &policy,
            NewEntity::new("Driver").with_description("original"),
        )
        .expect("create");

        let renamed = EntityStore::update(
            &graph,
            &policy,
            created.id,
            EntityPatch {
                name: Some("Operator".to_string()),
                description: None,
            },
        )
        .expect("update");
        assert_eq!(renamed.name, "Operator");
        assert_eq!(renamed.description.as_deref(), Some("original"));

        let empty = EntityStore::update(
            &graph,
            &policy,
            created.id,
            EntityPatch {
                name: Some(String::new()),
                description: None,
            },
        );
        assert!(matches!(empty, Err(GraphError::InvalidArgument(_))));
    }

    #[test]
    fn rename_onto_taken_name_conflicts_under_policy() {
        let graph = MemoryGraph::new();
        let strict = GraphPolicy::strict();
        EntityStore::create(&graph, &strict, NewEntity::new("Driver")).expect("driver");
        let other = EntityStore::create(&graph, &strict, NewEntity::new("Owner")).expect("owner");

        let result = EntityStore::update(
            &graph,
            &strict,
            other.id,
            EntityPatch {
                name: Some("Driver".to_string()),
                description: None,
            },
        );
        assert!(matches!(result, Err(GraphError::Conflict(_))));
    }

    #[test]
    fn missing_entity_is_not_found_but_delete_succeeds() {
        let graph = MemoryGraph::new();
        let id = EntityId::new();
        assert!(matches!(
            EntityStore::get(&graph, id),
            Err(GraphError::NotFound { .. })
        ));
        assert!(matches!(
            EntityStore::update(&graph, &GraphPolicy::default(), id, EntityPatch::default()),
            Err(GraphError::NotFound { .. })
        ));
        assert!(EntityStore::delete(&graph, id).expect("delete").is_empty());
    }
}
