//! # Cascade Deleter
//!
//! Removes an Entity together with everything that depends on it:
//!
//! 1. the facets the entity owns
//! 2. every relation where it is source or target
//! 3. the facets owned by those relations
//! 4. the entity row itself
//!
//! Collection and removal happen in one write transaction. If any step fails
//! the transaction is dropped and every row stays in place.

use crate::graph::{GraphBackend, ReadTxn, WriteTxn};
use crate::{EntityId, FacetId, GraphError, Owner, RelationId};
use serde::Serialize;
use std::collections::BTreeSet;

/// What a cascade removed (or, from `plan`, would remove).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub entity: EntityId,
    /// Whether the entity row existed.
    pub entity_removed: bool,
    pub relations: Vec<RelationId>,
    pub facets: Vec<FacetId>,
}

impl CascadeReport {
    /// True when nothing was (or would be) removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.entity_removed && self.relations.is_empty() && self.facets.is_empty()
    }
}

/// Entity deletion with dependent-row cleanup.
pub struct CascadeDeleter;

impl CascadeDeleter {
    /// Compute the removal set for `entity` without changing anything.
    pub fn plan<B: GraphBackend>(store: &B, entity: EntityId) -> Result<CascadeReport, GraphError> {
        store.read(|txn| collect(txn, entity))
    }

    /// Delete `entity` and its dependents atomically.
    ///
    /// Deleting an entity that does not exist succeeds with an empty report.
    pub fn delete_entity<B: GraphBackend>(
        store: &B,
        entity: EntityId,
    ) -> Result<CascadeReport, GraphError> {
        let report = store.write(|txn| {
            let report = collect(&*txn, entity)?;
            for facet in &report.facets {
                txn.remove_facet(*facet)?;
            }
            for relation in &report.relations {
                txn.remove_relation(*relation)?;
            }
            txn.remove_entity(entity)?;
            Ok(report)
        })?;

        if report.entity_removed {
            tracing::debug!(
                entity = %entity,
                relations = report.relations.len(),
                facets = report.facets.len(),
                "entity deleted with dependents"
            );
        }
        Ok(report)
    }
}

/// Remove one relation and its facets inside an open write transaction.
///
/// Returns the removed facet ids, or `None` if the relation did not exist.
pub(crate) fn remove_relation<W: WriteTxn + ?Sized>(
    txn: &mut W,
    relation: RelationId,
) -> Result<Option<Vec<FacetId>>, GraphError> {
    if txn.relation(relation)?.is_none() {
        return Ok(None);
    }
    let facets: Vec<FacetId> = txn
        .facets_of(Owner::Relation(relation))?
        .into_iter()
        .map(|facet| facet.id)
        .collect();
    for facet in &facets {
        txn.remove_facet(*facet)?;
    }
    txn.remove_relation(relation)?;
    Ok(Some(facets))
}

fn collect<V: ReadTxn + ?Sized>(view: &V, entity: EntityId) -> Result<CascadeReport, GraphError> {
    let entity_removed = view.entity(entity)?.is_some();

    let relations: BTreeSet<RelationId> = view
        .outgoing(entity)?
        .into_iter()
        .chain(view.incoming(entity)?)
        .map(|relation| relation.id)
        .collect();

    let mut facets: Vec<FacetId> = view
        .facets_of(Owner::Entity(entity))?
        .into_iter()
        .map(|facet| facet.id)
        .collect();
    for relation in &relations {
        facets.extend(
            view.facets_of(Owner::Relation(*relation))?
                .into_iter()
                .map(|facet| facet.id),
        );
    }

    Ok(CascadeReport {
        entity,
        entity_removed,
        relations: relations.into_iter().collect(),
        facets,
    })
}

// =============================================================================
// TESTS
// =============================================================================
