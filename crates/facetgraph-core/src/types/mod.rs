//! # Core Type Definitions
//!
//! This module contains all core types for the facetgraph engine:
//! - Identifiers (`EntityId`, `RelationId`, `FacetId`)
//! - Facet ownership (`Owner`, `OwnerKind`)
//! - Stored rows (`EntityRecord`, `RelationRecord`, `FacetRecord`)
//! - Hydrated views (`Entity`, `Relation`, `Facet`)
//! - Inputs (`NewEntity`, `NewRelation`, `NewFacet`, `EntityPatch`, `RelationPatch`)
//! - Error types (`GraphError`)
//!
//! ## Records vs. Views
//!
//! Records are what a backend persists. A `FacetRecord` keeps its configuration
//! as serialized text; only the facet store turns it into a `Document`.
//! Views are what store operations return to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random (v4) identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Returns the identifier as a 128-bit integer (storage key form).
            #[must_use]
            pub const fn as_u128(&self) -> u128 {
                self.0.as_u128()
            }

            /// Rebuild an identifier from its storage key form.
            #[must_use]
            pub const fn from_u128(raw: u128) -> Self {
                Self(Uuid::from_u128(raw))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(
    /// Unique identifier of an Entity (a node in the domain graph).
    EntityId
);

define_id!(
    /// Unique identifier of a reified Relation (a directed edge).
    RelationId
);

define_id!(
    /// Unique identifier of a Facet.
    FacetId
);

// =============================================================================
// DOCUMENT
// =============================================================================

/// Free-form facet configuration: null, bool, number, string, ordered list or
/// ordered map. The engine never inspects it beyond (de)serialization.
pub type Document = serde_json::Value;

/// The document a facet reads back as when its stored text cannot be parsed.
#[must_use]
pub fn empty_document() -> Document {
    Document::Object(serde_json::Map::new())
}

// =============================================================================
// FACET OWNERSHIP
// =============================================================================

/// Which kind of record owns a facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Entity,
    Relation,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::Relation => f.write_str("relation"),
        }
    }
}

/// The single owner of a facet.
///
/// A tagged union: a facet belongs to exactly one Entity or exactly one
/// Relation, never both and never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Entity(EntityId),
    Relation(RelationId),
}

impl Owner {
    /// Build an owner from a kind tag and a raw id.
    #[must_use]
    pub const fn from_parts(kind: OwnerKind, id: Uuid) -> Self {
        match kind {
            OwnerKind::Entity => Self::Entity(EntityId::from_uuid(id)),
            OwnerKind::Relation => Self::Relation(RelationId::from_uuid(id)),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> OwnerKind {
        match self {
            Self::Entity(_) => OwnerKind::Entity,
            Self::Relation(_) => OwnerKind::Relation,
        }
    }

    /// The owner's raw id, regardless of kind.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Entity(id) => id.as_uuid(),
            Self::Relation(id) => id.as_uuid(),
        }
    }
}

impl From<EntityId> for Owner {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<RelationId> for Owner {
    fn from(id: RelationId) -> Self {
        Self::Relation(id)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

// =============================================================================
// STORED RECORDS
// =============================================================================

/// An Entity row as persisted by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
}

/// A Relation row as persisted by a backend.
///
/// `source` and `target` are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub id: RelationId,
    pub source: EntityId,
    pub target: EntityId,
    pub name: String,
    pub description: Option<String>,
}

/// A Facet row as persisted by a backend.
///
/// `configuration` holds the serialized document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRecord {
    pub id: FacetId,
    pub owner: Owner,
    pub facet_type: String,
    pub configuration: String,
}

// =============================================================================
// HYDRATED VIEWS
// =============================================================================

/// A Facet with its configuration decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub id: FacetId,
    pub owner: Owner,
    #[serde(rename = "type")]
    pub facet_type: String,
    pub configuration: Document,
}

/// A Relation together with the facets it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub source: EntityId,
    pub target: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub facets: Vec<Facet>,
}

impl Relation {
    /// Attach facets to a stored relation row.
    #[must_use]
    pub fn from_record(record: RelationRecord, facets: Vec<Facet>) -> Self {
        Self {
            id: record.id,
            source: record.source,
            target: record.target,
            name: record.name,
            description: record.description,
            facets,
        }
    }
}

/// An Entity hydrated with its facets and every relation touching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub facets: Vec<Facet>,
    /// Relations where this entity is the source.
    pub outgoing: Vec<Relation>,
    /// Relations where this entity is the target.
    pub incoming: Vec<Relation>,
}

impl Entity {
    /// A freshly created entity: nothing attached yet.
    #[must_use]
    pub fn bare(record: EntityRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            facets: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }
}

// =============================================================================
// INPUTS
// =============================================================================

/// Fields for a new Entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewEntity {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Fields for a new Relation `source -> target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelation {
    pub source: EntityId,
    pub target: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewRelation {
    #[must_use]
    pub fn new(source: EntityId, target: EntityId, name: impl Into<String>) -> Self {
        Self {
            source,
            target,
            name: name.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Fields for a new Facet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFacet {
    pub owner: Owner,
    pub facet_type: String,
    pub configuration: Document,
}

impl NewFacet {
    #[must_use]
    pub fn new(owner: impl Into<Owner>, facet_type: impl Into<String>, configuration: Document) -> Self {
        Self {
            owner: owner.into(),
            facet_type: facet_type.into(),
            configuration,
        }
    }
}

/// Partial update of an Entity. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update of a Relation. Endpoints are not part of the patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Entity,
    Relation,
    Facet,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("Entity"),
            Self::Relation => f.write_str("Relation"),
            Self::Facet => f.write_str("Facet"),
        }
    }
}

impl From<OwnerKind> for RecordKind {
    fn from(kind: OwnerKind) -> Self {
        match kind {
            OwnerKind::Entity => Self::Entity,
            OwnerKind::Relation => Self::Relation,
        }
    }
}

/// Errors that can occur in the facetgraph engine.
///
/// - Validation errors are raised before any write reaches the store
/// - Store failures are surfaced as-is; the engine never retries
#[derive(Debug, Error)]
pub enum GraphError {
    /// The referenced id does not resolve to a record of the expected kind.
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: Uuid },

    /// Self-loop, empty required field, oversized or malformed input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The relation `from -> to` would close a directed cycle.
    #[error("Relation {from} -> {to} would create a cycle")]
    CycleDetected { from: EntityId, to: EntityId },

    /// A uniqueness rule of the active policy was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing store failed or is unreachable.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A write transaction could not be committed; nothing was applied.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl GraphError {
    pub(crate) fn entity_not_found(id: EntityId) -> Self {
        Self::NotFound {
            kind: RecordKind::Entity,
            id: id.as_uuid(),
        }
    }

    pub(crate) fn relation_not_found(id: RelationId) -> Self {
        Self::NotFound {
            kind: RecordKind::Relation,
            id: id.as_uuid(),
        }
    }

    pub(crate) fn facet_not_found(id: FacetId) -> Self {
        Self::NotFound {
            kind: RecordKind::Facet,
            id: id.as_uuid(),
        }
    }

    pub(crate) fn owner_not_found(owner: Owner) -> Self {
        Self::NotFound {
            kind: owner.kind().into(),
            id: owner.id(),
        }
    }

    /// Wrap any backend failure as `StoreUnavailable`.
    pub fn unavailable(err: impl fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
