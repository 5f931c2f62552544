//! # facetgraph-core
//!
//! The graph-consistency engine for facetgraph.
//!
//! Three record kinds are stored behind a transactional backend:
//! - **Entities**: named nodes of a domain model
//! - **Relations**: reified, addressable directed edges between entities
//! - **Facets**: typed configuration documents owned by exactly one entity or
//!   one relation
//!
//! ## Guarantees
//!
//! - The relation set is a directed acyclic graph after every commit. The
//!   cycle check runs in the same write transaction as the insert.
//! - A facet's owner is verified to exist when the facet is created.
//! - Deleting an entity removes its facets, every relation touching it and
//!   those relations' facets, atomically.
//!
//! ## Architectural Constraints
//!
//! - Synchronous: no async, no network dependencies
//! - Every store operation is exactly one backend read or write transaction
//! - Listings and snapshots are deterministically ordered

// =============================================================================
// MODULES
// =============================================================================

pub mod cascade;
pub mod entity;
pub mod export;
pub mod facet;
pub mod formats;
pub mod graph;
pub mod guard;
pub mod policy;
pub mod primitives;
pub mod relation;
pub mod session;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Document, Entity, EntityId, EntityPatch, EntityRecord, Facet, FacetId, FacetRecord,
    GraphError, NewEntity, NewFacet, NewRelation, Owner, OwnerKind, RecordKind, Relation,
    RelationId, RelationPatch, RelationRecord, empty_document,
};

// =============================================================================
// RE-EXPORTS: Stores and Engine
// =============================================================================

pub use cascade::{CascadeDeleter, CascadeReport};
pub use entity::EntityStore;
pub use export::{GraphAssembler, GraphNode, GraphSnapshot, IntegrityIssue};
pub use facet::FacetStore;
pub use graph::{GraphBackend, MemoryGraph, ReadTxn, StoreCounts, WriteTxn};
pub use guard::CycleGuard;
pub use policy::GraphPolicy;
pub use relation::RelationStore;
pub use session::{Session, StorageBackend};
pub use storage::{RedbGraph, STORAGE_FORMAT_VERSION};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{decode_document, encode_document};
