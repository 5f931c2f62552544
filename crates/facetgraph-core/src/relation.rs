//! # Relation Store
//!
//! Reified directed edges between two entities.
//!
//! Creation runs every check inside the write transaction that inserts the
//! row: endpoint existence, the cycle guard, then the uniqueness policy.
//! Because writes are serialized, two concurrent creations can never jointly
//! close a cycle.

use crate::cascade;
use crate::facet::load_for;
use crate::graph::{GraphBackend, ReadTxn};
use crate::guard::CycleGuard;
use crate::policy::GraphPolicy;
use crate::primitives::{validate_description, validate_name};
use crate::{
    EntityId, GraphError, NewRelation, Owner, Relation, RelationId, RelationPatch, RelationRecord,
};

/// Create, read, update and delete operations for relations.
pub struct RelationStore;

impl RelationStore {
    /// Create the relation `source -> target`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a self-loop or a bad name/description; the
    ///   store is not touched
    /// - `NotFound` if either endpoint is missing
    /// - `CycleDetected` if `source` is already reachable from `target`
    /// - `Conflict` on a duplicate (source, target, name) when
    ///   `policy.unique_relation_names` is set
    pub fn create<B: GraphBackend>(
        store: &B,
        policy: &GraphPolicy,
        new: NewRelation,
    ) -> Result<Relation, GraphError> {
        if new.source == new.target {
            return Err(GraphError::InvalidArgument(format!(
                "relation cannot connect entity {} to itself",
                new.source
            )));
        }
        validate_name("relation name", &new.name)?;
        validate_description(new.description.as_deref())?;

        let record = RelationRecord {
            id: RelationId::new(),
            source: new.source,
            target: new.target,
            name: new.name,
            description: new.description,
        };

        store.write(|txn| {
            for endpoint in [record.source, record.target] {
                if txn.entity(endpoint)?.is_none() {
                    return Err(GraphError::entity_not_found(endpoint));
                }
            }

            if CycleGuard::would_close_cycle(&*txn, record.source, record.target)? {
                tracing::warn!(
                    source = %record.source,
                    target = %record.target,
                    "relation rejected: would create a cycle"
                );
                return Err(GraphError::CycleDetected {
                    from: record.source,
                    to: record.target,
                });
            }

            if policy.unique_relation_names
                && has_parallel(&*txn, record.source, record.target, &record.name, None)?
            {
                tracing::warn!(source = %record.source, target = %record.target, name = %record.name, "duplicate relation rejected");
                return Err(duplicate(&record.name));
            }

            txn.put_relation(&record)
        })?;

        tracing::debug!(relation = %record.id, source = %record.source, target = %record.target, "relation created");
        Ok(Relation::from_record(record, Vec::new()))
    }

    /// Fetch a relation with its facets.
    pub fn get<B: GraphBackend>(store: &B, id: RelationId) -> Result<Relation, GraphError> {
        store.read(|txn| {
            let record = txn
                .relation(id)?
                .ok_or_else(|| GraphError::relation_not_found(id))?;
            hydrate(txn, record)
        })
    }

    /// Apply a partial update. Endpoints never change.
    pub fn update<B: GraphBackend>(
        store: &B,
        policy: &GraphPolicy,
        id: RelationId,
        patch: RelationPatch,
    ) -> Result<Relation, GraphError> {
        if let Some(name) = &patch.name {
            validate_name("relation name", name)?;
        }
        validate_description(patch.description.as_deref())?;

        let relation = store.write(|txn| {
            let mut record = txn
                .relation(id)?
                .ok_or_else(|| GraphError::relation_not_found(id))?;

            if let Some(name) = patch.name {
                if policy.unique_relation_names
                    && name != record.name
                    && has_parallel(&*txn, record.source, record.target, &name, Some(id))?
                {
                    return Err(duplicate(&name));
                }
                record.name = name;
            }
            if let Some(description) = patch.description {
                record.description = Some(description);
            }

            txn.put_relation(&record)?;
            hydrate(&*txn, record)
        })?;

        tracing::debug!(relation = %id, "relation updated");
        Ok(relation)
    }

    /// Remove a relation and its facets. Returns whether it existed.
    pub fn delete<B: GraphBackend>(store: &B, id: RelationId) -> Result<bool, GraphError> {
        match store.write(|txn| cascade::remove_relation(txn, id))? {
            Some(facets) => {
                tracing::debug!(relation = %id, facets = facets.len(), "relation deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Attach a relation row's facets.
pub(crate) fn hydrate<V: ReadTxn + ?Sized>(
    view: &V,
    record: RelationRecord,
) -> Result<Relation, GraphError> {
    let facets = load_for(view, Owner::Relation(record.id))?;
    Ok(Relation::from_record(record, facets))
}

/// Whether another relation with the same endpoints already carries `name`.
fn has_parallel<V: ReadTxn + ?Sized>(
    view: &V,
    source: EntityId,
    target: EntityId,
    name: &str,
    except: Option<RelationId>,
) -> Result<bool, GraphError> {
    Ok(view.outgoing(source)?.iter().any(|existing| {
        existing.target == target && existing.name == name && Some(existing.id) != except
    }))
}

fn duplicate(name: &str) -> GraphError {
    GraphError::Conflict(format!(
        "a relation named '{}' already connects these entities",
        name
    ))
}

// =============================================================================
// TESTS
// =============================================================================
