//! # Session Module
//!
//! A backend bound to a uniqueness policy, exposing every store operation.
//!
//! ## Storage Backends
//!
//! Session supports two storage backends:
//! - `InMemory`: uses `MemoryGraph` (fast, volatile)
//! - `Persistent`: uses `RedbGraph` for disk-backed ACID storage
//!
//! A `Session` is `Send + Sync`; share it behind an `Arc`. Both backends
//! serialize writes internally, so no outer lock is needed.

use crate::cascade::{CascadeDeleter, CascadeReport};
use crate::entity::EntityStore;
use crate::export::{GraphAssembler, GraphSnapshot};
use crate::facet::FacetStore;
use crate::graph::{GraphBackend, MemoryGraph, ReadTxn, StoreCounts, WriteTxn};
use crate::policy::GraphPolicy;
use crate::relation::RelationStore;
use crate::storage::RedbGraph;
use crate::{
    Document, Entity, EntityId, EntityPatch, Facet, FacetId, GraphError, NewEntity, NewFacet,
    NewRelation, Owner, Relation, RelationId, RelationPatch,
};
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(MemoryGraph),
    /// Disk-backed graph using redb (ACID, persistent).
    Persistent(RedbGraph),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryGraph::new())
    }
}

impl GraphBackend for StorageBackend {
    fn read<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&dyn ReadTxn) -> Result<T, GraphError>,
    {
        match self {
            Self::InMemory(graph) => graph.read(f),
            Self::Persistent(graph) => graph.read(f),
        }
    }

    fn write<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut dyn WriteTxn) -> Result<T, GraphError>,
    {
        match self {
            Self::InMemory(graph) => graph.write(f),
            Self::Persistent(graph) => graph.write(f),
        }
    }
}

/// The engine's entry point: one backend, one policy.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
    policy: GraphPolicy,
}

impl Session {
    /// Create a new empty session with in-memory storage and the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let redb = RedbGraph::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(redb),
            policy: GraphPolicy::default(),
        })
    }

    /// Replace the uniqueness policy.
    #[must_use]
    pub fn with_policy(mut self, policy: GraphPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &GraphPolicy {
        &self.policy
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// The underlying backend, for callers composing their own transactions.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Row counts per record kind.
    pub fn counts(&self) -> Result<StoreCounts, GraphError> {
        self.backend.read(|txn| txn.counts())
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    pub fn create_entity(&self, new: NewEntity) -> Result<Entity, GraphError> {
        EntityStore::create(&self.backend, &self.policy, new)
    }

    pub fn entity(&self, id: EntityId) -> Result<Entity, GraphError> {
        EntityStore::get(&self.backend, id)
    }

    pub fn entities(&self) -> Result<Vec<Entity>, GraphError> {
        EntityStore::list(&self.backend)
    }

    pub fn update_entity(&self, id: EntityId, patch: EntityPatch) -> Result<Entity, GraphError> {
        EntityStore::update(&self.backend, &self.policy, id, patch)
    }

    pub fn delete_entity(&self, id: EntityId) -> Result<CascadeReport, GraphError> {
        EntityStore::delete(&self.backend, id)
    }

    /// What deleting `id` would remove, without removing it.
    pub fn plan_entity_delete(&self, id: EntityId) -> Result<CascadeReport, GraphError> {
        CascadeDeleter::plan(&self.backend, id)
    }

    // =========================================================================
    // RELATIONS
    // =========================================================================

    pub fn create_relation(&self, new: NewRelation) -> Result<Relation, GraphError> {
        RelationStore::create(&self.backend, &self.policy, new)
    }

    pub fn relation(&self, id: RelationId) -> Result<Relation, GraphError> {
        RelationStore::get(&self.backend, id)
    }

    pub fn update_relation(
        &self,
        id: RelationId,
        patch: RelationPatch,
    ) -> Result<Relation, GraphError> {
        RelationStore::update(&self.backend, &self.policy, id, patch)
    }

    pub fn delete_relation(&self, id: RelationId) -> Result<bool, GraphError> {
        RelationStore::delete(&self.backend, id)
    }

    // =========================================================================
    // FACETS
    // =========================================================================

    pub fn add_facet(&self, new: NewFacet) -> Result<Facet, GraphError> {
        FacetStore::add(&self.backend, &self.policy, new)
    }

    pub fn facet(&self, id: FacetId) -> Result<Facet, GraphError> {
        FacetStore::get(&self.backend, id)
    }

    pub fn update_facet(&self, id: FacetId, configuration: Document) -> Result<Facet, GraphError> {
        FacetStore::update(&self.backend, id, configuration)
    }

    pub fn delete_facet(&self, id: FacetId) -> Result<bool, GraphError> {
        FacetStore::delete(&self.backend, id)
    }

    pub fn facets_of(&self, owner: Owner) -> Result<Vec<Facet>, GraphError> {
        FacetStore::list_for(&self.backend, owner)
    }

    // =========================================================================
    // GRAPH
    // =========================================================================

    pub fn snapshot(&self) -> Result<GraphSnapshot, GraphError> {
        GraphAssembler::snapshot(&self.backend)
    }
}

// =============================================================================
// TESTS
// =============================================================================
