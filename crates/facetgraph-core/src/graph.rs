//! # Graph Backend
//!
//! The storage contract the stores are written against, plus the in-memory
//! implementation.
//!
//! A backend exposes exactly two entry points: `read` runs a closure against a
//! consistent read view, `write` runs a closure against a write view and
//! commits only when the closure returns `Ok`. Every store operation is one
//! such call, so multi-row changes (relation creation with its cycle check,
//! cascade deletes) are all-or-nothing.
//!
//! Backends persist rows and maintain their own lookup indexes (outgoing,
//! incoming, owned facets). They do not enforce referential integrity or
//! acyclicity; that is the stores' job.

use crate::{
    EntityId, EntityRecord, FacetId, FacetRecord, GraphError, Owner, RelationId, RelationRecord,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

// =============================================================================
// BACKEND TRAITS
// =============================================================================

/// Row counts per record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub entities: usize,
    pub relations: usize,
    pub facets: usize,
}

/// Read access inside a transaction.
pub trait ReadTxn {
    fn entity(&self, id: EntityId) -> Result<Option<EntityRecord>, GraphError>;

    /// All entity rows, in id order.
    fn entities(&self) -> Result<Vec<EntityRecord>, GraphError>;

    fn relation(&self, id: RelationId) -> Result<Option<RelationRecord>, GraphError>;

    /// All relation rows, in id order.
    fn relations(&self) -> Result<Vec<RelationRecord>, GraphError>;

    /// Relations whose source is `entity`.
    fn outgoing(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError>;

    /// Relations whose target is `entity`.
    fn incoming(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError>;

    fn facet(&self, id: FacetId) -> Result<Option<FacetRecord>, GraphError>;

    /// Facets owned by `owner`, in id order.
    fn facets_of(&self, owner: Owner) -> Result<Vec<FacetRecord>, GraphError>;

    fn counts(&self) -> Result<StoreCounts, GraphError>;

    /// Targets of the relations leaving `entity`.
    fn successors(&self, entity: EntityId) -> Result<Vec<EntityId>, GraphError> {
        Ok(self
            .outgoing(entity)?
            .into_iter()
            .map(|relation| relation.target)
            .collect())
    }

    /// Whether the owner row exists with the expected kind.
    fn contains_owner(&self, owner: Owner) -> Result<bool, GraphError> {
        match owner {
            Owner::Entity(id) => Ok(self.entity(id)?.is_some()),
            Owner::Relation(id) => Ok(self.relation(id)?.is_some()),
        }
    }
}

/// Write access inside a transaction.
///
/// `put_*` inserts or replaces a row. `remove_*` deletes a single row and its
/// index entries and reports whether it existed; nothing cascades here.
pub trait WriteTxn: ReadTxn {
    fn put_entity(&mut self, record: &EntityRecord) -> Result<(), GraphError>;

    fn put_relation(&mut self, record: &RelationRecord) -> Result<(), GraphError>;

    fn put_facet(&mut self, record: &FacetRecord) -> Result<(), GraphError>;

    fn remove_entity(&mut self, id: EntityId) -> Result<bool, GraphError>;

    fn remove_relation(&mut self, id: RelationId) -> Result<bool, GraphError>;

    fn remove_facet(&mut self, id: FacetId) -> Result<bool, GraphError>;
}

/// A synchronous, transactional graph store.
///
/// Write transactions are serialized by the backend; read transactions see a
/// single committed state.
pub trait GraphBackend: Send + Sync {
    /// Run `f` against a consistent read view.
    fn read<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&dyn ReadTxn) -> Result<T, GraphError>;

    /// Run `f` inside a write transaction. The transaction commits only if `f`
    /// returns `Ok`; on `Err` nothing `f` wrote becomes visible.
    fn write<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut dyn WriteTxn) -> Result<T, GraphError>;
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// Row storage and indexes for the in-memory backend.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Default)]
struct Tables {
    entities: BTreeMap<EntityId, EntityRecord>,
    relations: BTreeMap<RelationId, RelationRecord>,
    facets: BTreeMap<FacetId, FacetRecord>,
    /// source -> relations leaving it
    outgoing: BTreeMap<EntityId, BTreeSet<RelationId>>,
    /// target -> relations entering it
    incoming: BTreeMap<EntityId, BTreeSet<RelationId>>,
    /// owner -> facets it owns
    owned: BTreeMap<Owner, BTreeSet<FacetId>>,
}

impl Tables {
    fn relations_in(&self, ids: Option<&BTreeSet<RelationId>>) -> Vec<RelationRecord> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.relations.get(id).cloned())
            .collect()
    }

    fn insert_entity(&mut self, record: EntityRecord) -> Option<EntityRecord> {
        self.entities.insert(record.id, record)
    }

    fn take_entity(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.entities.remove(&id)
    }

    fn insert_relation(&mut self, record: RelationRecord) -> Option<RelationRecord> {
        let (id, source, target) = (record.id, record.source, record.target);
        let previous = self.relations.insert(id, record);
        if let Some(previous) = &previous {
            self.unlink_relation(previous);
        }
        self.outgoing.entry(source).or_default().insert(id);
        self.incoming.entry(target).or_default().insert(id);
        previous
    }

    fn take_relation(&mut self, id: RelationId) -> Option<RelationRecord> {
        let record = self.relations.remove(&id)?;
        self.unlink_relation(&record);
        Some(record)
    }

    fn insert_facet(&mut self, record: FacetRecord) -> Option<FacetRecord> {
        let (id, owner) = (record.id, record.owner);
        let previous = self.facets.insert(id, record);
        if let Some(previous) = &previous {
            self.unlink_facet(previous);
        }
        self.owned.entry(owner).or_default().insert(id);
        previous
    }

    fn take_facet(&mut self, id: FacetId) -> Option<FacetRecord> {
        let record = self.facets.remove(&id)?;
        self.unlink_facet(&record);
        Some(record)
    }

    fn unlink_relation(&mut self, record: &RelationRecord) {
        detach(&mut self.outgoing, record.source, record.id);
        detach(&mut self.incoming, record.target, record.id);
    }

    fn unlink_facet(&mut self, record: &FacetRecord) {
        detach(&mut self.owned, record.owner, record.id);
    }
}

/// Remove `value` from the set under `key`, dropping the set once empty.
fn detach<K: Ord, V: Ord>(index: &mut BTreeMap<K, BTreeSet<V>>, key: K, value: V) {
    if let Some(set) = index.get_mut(&key) {
        set.remove(&value);
        if set.is_empty() {
            index.remove(&key);
        }
    }
}

impl ReadTxn for Tables {
    fn entity(&self, id: EntityId) -> Result<Option<EntityRecord>, GraphError> {
        Ok(self.entities.get(&id).cloned())
    }

    fn entities(&self) -> Result<Vec<EntityRecord>, GraphError> {
        Ok(self.entities.values().cloned().collect())
    }

    fn relation(&self, id: RelationId) -> Result<Option<RelationRecord>, GraphError> {
        Ok(self.relations.get(&id).cloned())
    }

    fn relations(&self) -> Result<Vec<RelationRecord>, GraphError> {
        Ok(self.relations.values().cloned().collect())
    }

    fn outgoing(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError> {
        Ok(self.relations_in(self.outgoing.get(&entity)))
    }

    fn incoming(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError> {
        Ok(self.relations_in(self.incoming.get(&entity)))
    }

    fn facet(&self, id: FacetId) -> Result<Option<FacetRecord>, GraphError> {
        Ok(self.facets.get(&id).cloned())
    }

    fn facets_of(&self, owner: Owner) -> Result<Vec<FacetRecord>, GraphError> {
        Ok(self
            .owned
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|id| self.facets.get(id).cloned())
            .collect())
    }

    fn counts(&self) -> Result<StoreCounts, GraphError> {
        Ok(StoreCounts {
            entities: self.entities.len(),
            relations: self.relations.len(),
            facets: self.facets.len(),
        })
    }

    fn successors(&self, entity: EntityId) -> Result<Vec<EntityId>, GraphError> {
        Ok(self
            .outgoing
            .get(&entity)
            .into_iter()
            .flatten()
            .filter_map(|id| self.relations.get(id).map(|r| r.target))
            .collect())
    }
}

// =============================================================================
// WRITE STAGING
// =============================================================================

/// The prior state of one row, recorded before a write touches it.
#[derive(Debug)]
enum Undo {
    Entity(EntityId, Option<EntityRecord>),
    Relation(RelationId, Option<RelationRecord>),
    Facet(FacetId, Option<FacetRecord>),
}

/// A write transaction over the live tables.
///
/// Every mutation applies in place and pushes the row's previous state onto
/// an undo log. A failed transaction replays the log backwards, so the cost of
/// a write (and of undoing it) is proportional to the rows it touched.
struct Staged<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
}

impl<'a> Staged<'a> {
    fn new(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            undo: Vec::new(),
        }
    }

    /// Restore every touched row to its state before the transaction.
    fn rollback(self) {
        let tables = self.tables;
        for step in self.undo.into_iter().rev() {
            match step {
                Undo::Entity(_, Some(previous)) => {
                    tables.insert_entity(previous);
                }
                Undo::Entity(id, None) => {
                    tables.take_entity(id);
                }
                Undo::Relation(_, Some(previous)) => {
                    tables.insert_relation(previous);
                }
                Undo::Relation(id, None) => {
                    tables.take_relation(id);
                }
                Undo::Facet(_, Some(previous)) => {
                    tables.insert_facet(previous);
                }
                Undo::Facet(id, None) => {
                    tables.take_facet(id);
                }
            }
        }
    }
}

impl ReadTxn for Staged<'_> {
    fn entity(&self, id: EntityId) -> Result<Option<EntityRecord>, GraphError> {
        self.tables.entity(id)
    }

    fn entities(&self) -> Result<Vec<EntityRecord>, GraphError> {
        self.tables.entities()
    }

    fn relation(&self, id: RelationId) -> Result<Option<RelationRecord>, GraphError> {
        self.tables.relation(id)
    }

    fn relations(&self) -> Result<Vec<RelationRecord>, GraphError> {
        self.tables.relations()
    }

    fn outgoing(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError> {
        self.tables.outgoing(entity)
    }

    fn incoming(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError> {
        self.tables.incoming(entity)
    }

    fn facet(&self, id: FacetId) -> Result<Option<FacetRecord>, GraphError> {
        self.tables.facet(id)
    }

    fn facets_of(&self, owner: Owner) -> Result<Vec<FacetRecord>, GraphError> {
        self.tables.facets_of(owner)
    }

    fn counts(&self) -> Result<StoreCounts, GraphError> {
        self.tables.counts()
    }

    fn successors(&self, entity: EntityId) -> Result<Vec<EntityId>, GraphError> {
        self.tables.successors(entity)
    }
}

impl WriteTxn for Staged<'_> {
    fn put_entity(&mut self, record: &EntityRecord) -> Result<(), GraphError> {
        let previous = self.tables.insert_entity(record.clone());
        self.undo.push(Undo::Entity(record.id, previous));
        Ok(())
    }

    fn put_relation(&mut self, record: &RelationRecord) -> Result<(), GraphError> {
        let previous = self.tables.insert_relation(record.clone());
        self.undo.push(Undo::Relation(record.id, previous));
        Ok(())
    }

    fn put_facet(&mut self, record: &FacetRecord) -> Result<(), GraphError> {
        let previous = self.tables.insert_facet(record.clone());
        self.undo.push(Undo::Facet(record.id, previous));
        Ok(())
    }

    fn remove_entity(&mut self, id: EntityId) -> Result<bool, GraphError> {
        let previous = self.tables.take_entity(id);
        let existed = previous.is_some();
        if existed {
            self.undo.push(Undo::Entity(id, previous));
        }
        Ok(existed)
    }

    fn remove_relation(&mut self, id: RelationId) -> Result<bool, GraphError> {
        let previous = self.tables.take_relation(id);
        let existed = previous.is_some();
        if existed {
            self.undo.push(Undo::Relation(id, previous));
        }
        Ok(existed)
    }

    fn remove_facet(&mut self, id: FacetId) -> Result<bool, GraphError> {
        let previous = self.tables.take_facet(id);
        let existed = previous.is_some();
        if existed {
            self.undo.push(Undo::Facet(id, previous));
        }
        Ok(existed)
    }
}

/// In-memory graph backend.
///
/// A write transaction holds the exclusive lock for its whole duration. It
/// mutates the live tables through an undo log and rolls back when the
/// closure returns `Err`, so readers never observe a partial write.
#[derive(Default)]
pub struct MemoryGraph {
    tables: RwLock<Tables>,
}

impl std::fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts = self
            .tables
            .read()
            .ok()
            .and_then(|tables| tables.counts().ok())
            .unwrap_or_default();
        f.debug_struct("MemoryGraph")
            .field("entities", &counts.entities)
            .field("relations", &counts.relations)
            .field("facets", &counts.facets)
            .finish()
    }
}

impl MemoryGraph {
    /// Create a new empty in-memory graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> GraphError {
    GraphError::StoreUnavailable("in-memory store lock poisoned".to_string())
}

impl GraphBackend for MemoryGraph {
    fn read<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&dyn ReadTxn) -> Result<T, GraphError>,
    {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        f(&*tables)
    }

    fn write<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut dyn WriteTxn) -> Result<T, GraphError>,
    {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let mut staged = Staged::new(&mut tables);
        match f(&mut staged) {
            Ok(out) => Ok(out),
            Err(e) => {
                staged.rollback();
                Err(e)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str) -> EntityRecord {
        EntityRecord {
            id: EntityId::new(),
            name: name.to_string(),
            description: None,
        }
    }

    fn relation(source: EntityId, target: EntityId) -> RelationRecord {
        RelationRecord {
            id: RelationId::new(),
            source,
            target,
            name: "rel".to_string(),
            description: None,
        }
    }

    #[test]
    fn relation_indexes_follow_puts_and_removes() {
        let graph = MemoryGraph::new();
        let a = entity("a");
        let b = entity("b");
        let r = relation(a.id, b.id);

        graph
            .write(|txn| {
                txn.put_entity(&a)?;
                txn.put_entity(&b)?;
                txn.put_relation(&r)
            })
            .expect("write");

        graph
            .read(|txn| {
                assert_eq!(txn.outgoing(a.id)?, vec![r.clone()]);
                assert_eq!(txn.incoming(b.id)?, vec![r.clone()]);
                assert_eq!(txn.successors(a.id)?, vec![b.id]);
                assert!(txn.outgoing(b.id)?.is_empty());
                Ok(())
            })
            .expect("read");

        let removed = graph.write(|txn| txn.remove_relation(r.id)).expect("remove");
        assert!(removed);

        graph
            .read(|txn| {
                assert!(txn.outgoing(a.id)?.is_empty());
                assert!(txn.incoming(b.id)?.is_empty());
                Ok(())
            })
            .expect("read");
    }

    #[test]
    fn facet_owner_index_is_maintained() {
        let graph = MemoryGraph::new();
        let a = entity("a");
        let facet = FacetRecord {
            id: FacetId::new(),
            owner: Owner::Entity(a.id),
            facet_type: "property".to_string(),
            configuration: "{}".to_string(),
        };

        graph
            .write(|txn| {
                txn.put_entity(&a)?;
                txn.put_facet(&facet)
            })
            .expect("write");

        let owned = graph
            .read(|txn| txn.facets_of(Owner::Entity(a.id)))
            .expect("read");
        assert_eq!(owned, vec![facet.clone()]);

        assert!(graph.write(|txn| txn.remove_facet(facet.id)).expect("remove"));
        assert!(!graph.write(|txn| txn.remove_facet(facet.id)).expect("remove"));
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let graph = MemoryGraph::new();
        let a = entity("a");

        let result: Result<(), GraphError> = graph.write(|txn| {
            txn.put_entity(&a)?;
            Err(GraphError::StoreUnavailable("boom".to_string()))
        });
        assert!(result.is_err());

        let counts = graph.read(|txn| txn.counts()).expect("counts");
        assert_eq!(counts, StoreCounts::default());
    }

    #[test]
    fn failed_write_restores_replaced_and_removed_rows() {
        let graph = MemoryGraph::new();
        let a = entity("a");
        let b = entity("b");
        let c = entity("c");
        let r = relation(a.id, b.id);
        let facet = FacetRecord {
            id: FacetId::new(),
            owner: Owner::Relation(r.id),
            facet_type: "criteria".to_string(),
            configuration: r#"{"min_age":18}"#.to_string(),
        };
        graph
            .write(|txn| {
                txn.put_entity(&a)?;
                txn.put_entity(&b)?;
                txn.put_relation(&r)?;
                txn.put_facet(&facet)
            })
            .expect("seed");

        let result: Result<(), GraphError> = graph.write(|txn| {
            let mut renamed = a.clone();
            renamed.name = "renamed".to_string();
            txn.put_entity(&renamed)?;

            let mut moved = facet.clone();
            moved.owner = Owner::Entity(b.id);
            txn.put_facet(&moved)?;

            assert!(txn.remove_relation(r.id)?);
            txn.put_entity(&c)?;
            txn.put_relation(&relation(b.id, c.id))?;
            assert!(txn.remove_entity(b.id)?);
            Err(GraphError::TransactionFailed("abort".to_string()))
        });
        assert!(result.is_err());

        graph
            .read(|txn| {
                assert_eq!(txn.entity(a.id)?, Some(a.clone()));
                assert_eq!(txn.entity(b.id)?, Some(b.clone()));
                assert_eq!(txn.entity(c.id)?, None);
                assert_eq!(txn.relations()?, vec![r.clone()]);
                assert_eq!(txn.outgoing(a.id)?, vec![r.clone()]);
                assert_eq!(txn.incoming(b.id)?, vec![r.clone()]);
                assert!(txn.outgoing(b.id)?.is_empty());
                assert_eq!(txn.facets_of(Owner::Relation(r.id))?, vec![facet.clone()]);
                assert!(txn.facets_of(Owner::Entity(b.id))?.is_empty());
                assert_eq!(
                    txn.counts()?,
                    StoreCounts {
                        entities: 2,
                        relations: 1,
                        facets: 1,
                    }
                );
                Ok(())
            })
            .expect("read");
    }

    #[test]
    fn contains_owner_checks_kind() {
        let graph = MemoryGraph::new();
        let a = entity("a");
        graph.write(|txn| txn.put_entity(&a)).expect("write");

        graph
            .read(|txn| {
                assert!(txn.contains_owner(Owner::Entity(a.id))?);
                let same_id_as_relation = Owner::Relation(RelationId::from_uuid(a.id.as_uuid()));
                assert!(!txn.contains_owner(same_id_as_relation)?);
                Ok(())
            })
            .expect("read");
    }
}
