//! # redb-backed Graph Storage
//!
//! A disk-backed `GraphBackend` using the redb embedded database, providing:
//! - ACID transactions (a failed write closure aborts the transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Layout
//!
//! Rows are postcard-encoded and keyed by the 128-bit id. Lookup indexes are
//! tables keyed by `(parent, child)` with unit values, so all children of one
//! parent are a single range scan.

use crate::graph::{GraphBackend, ReadTxn, StoreCounts, WriteTxn};
use crate::{
    EntityId, EntityRecord, FacetId, FacetRecord, GraphError, Owner, RelationId, RelationRecord,
};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for entities: EntityId -> serialized EntityRecord
const ENTITIES: TableDefinition<u128, &[u8]> = TableDefinition::new("entities");

/// Table for relations: RelationId -> serialized RelationRecord
const RELATIONS: TableDefinition<u128, &[u8]> = TableDefinition::new("relations");

/// Table for facets: FacetId -> serialized FacetRecord
const FACETS: TableDefinition<u128, &[u8]> = TableDefinition::new("facets");

/// Index: (source EntityId, RelationId)
const OUTGOING: TableDefinition<(u128, u128), ()> = TableDefinition::new("outgoing");

/// Index: (target EntityId, RelationId)
const INCOMING: TableDefinition<(u128, u128), ()> = TableDefinition::new("incoming");

/// Index: (owner id, FacetId)
const OWNED: TableDefinition<(u128, u128), ()> = TableDefinition::new("owned_facets");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// On-disk layout version, stored under `format_version`.
pub const STORAGE_FORMAT_VERSION: u64 = 1;

// =============================================================================
// ROW HELPERS
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GraphError> {
    postcard::to_allocvec(value).map_err(GraphError::unavailable)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GraphError> {
    postcard::from_bytes(bytes).map_err(GraphError::unavailable)
}

fn get_row<T: DeserializeOwned>(
    table: &impl ReadableTable<u128, &'static [u8]>,
    key: u128,
) -> Result<Option<T>, GraphError> {
    match table.get(key).map_err(GraphError::unavailable)? {
        Some(data) => Ok(Some(decode(data.value())?)),
        None => Ok(None),
    }
}

fn all_rows<T: DeserializeOwned>(
    table: &impl ReadableTable<u128, &'static [u8]>,
) -> Result<Vec<T>, GraphError> {
    let mut rows = Vec::new();
    for entry in table.iter().map_err(GraphError::unavailable)? {
        let (_, data) = entry.map_err(GraphError::unavailable)?;
        rows.push(decode(data.value())?);
    }
    Ok(rows)
}

/// Child ids stored under `parent` in a `(parent, child)` index.
fn children(
    index: &impl ReadableTable<(u128, u128), ()>,
    parent: u128,
) -> Result<Vec<u128>, GraphError> {
    let mut ids = Vec::new();
    for entry in index
        .range((parent, 0u128)..=(parent, u128::MAX))
        .map_err(GraphError::unavailable)?
    {
        let (key, _) = entry.map_err(GraphError::unavailable)?;
        ids.push(key.value().1);
    }
    Ok(ids)
}

fn rows_for<T: DeserializeOwned>(
    table: &impl ReadableTable<u128, &'static [u8]>,
    ids: Vec<u128>,
) -> Result<Vec<T>, GraphError> {
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(row) = get_row(table, id)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

// =============================================================================
// READ VIEWS
// =============================================================================

// Read and write transactions expose the same `open_table` call, so one body
// serves both.
macro_rules! impl_read_txn {
    ($txn:ty) => {
        impl ReadTxn for $txn {
            fn entity(&self, id: EntityId) -> Result<Option<EntityRecord>, GraphError> {
                let table = self.open_table(ENTITIES).map_err(GraphError::unavailable)?;
                get_row(&table, id.as_u128())
            }

            fn entities(&self) -> Result<Vec<EntityRecord>, GraphError> {
                let table = self.open_table(ENTITIES).map_err(GraphError::unavailable)?;
                all_rows(&table)
            }

            fn relation(&self, id: RelationId) -> Result<Option<RelationRecord>, GraphError> {
                let table = self.open_table(RELATIONS).map_err(GraphError::unavailable)?;
                get_row(&table, id.as_u128())
            }

            fn relations(&self) -> Result<Vec<RelationRecord>, GraphError> {
                let table = self.open_table(RELATIONS).map_err(GraphError::unavailable)?;
                all_rows(&table)
            }

            fn outgoing(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError> {
                let index = self.open_table(OUTGOING).map_err(GraphError::unavailable)?;
                let ids = children(&index, entity.as_u128())?;
                let table = self.open_table(RELATIONS).map_err(GraphError::unavailable)?;
                rows_for(&table, ids)
            }

            fn incoming(&self, entity: EntityId) -> Result<Vec<RelationRecord>, GraphError> {
                let index = self.open_table(INCOMING).map_err(GraphError::unavailable)?;
                let ids = children(&index, entity.as_u128())?;
                let table = self.open_table(RELATIONS).map_err(GraphError::unavailable)?;
                rows_for(&table, ids)
            }

            fn facet(&self, id: FacetId) -> Result<Option<FacetRecord>, GraphError> {
                let table = self.open_table(FACETS).map_err(GraphError::unavailable)?;
                get_row(&table, id.as_u128())
            }

            fn facets_of(&self, owner: Owner) -> Result<Vec<FacetRecord>, GraphError> {
                let index = self.open_table(OWNED).map_err(GraphError::unavailable)?;
                let ids = children(&index, owner.id().as_u128())?;
                let table = self.open_table(FACETS).map_err(GraphError::unavailable)?;
                let rows: Vec<FacetRecord> = rows_for(&table, ids)?;
                Ok(rows.into_iter().filter(|f| f.owner == owner).collect())
            }

            fn counts(&self) -> Result<StoreCounts, GraphError> {
                let entities = self.open_table(ENTITIES).map_err(GraphError::unavailable)?;
                let relations = self.open_table(RELATIONS).map_err(GraphError::unavailable)?;
                let facets = self.open_table(FACETS).map_err(GraphError::unavailable)?;
                Ok(StoreCounts {
                    entities: entities.len().map_err(GraphError::unavailable)? as usize,
                    relations: relations.len().map_err(GraphError::unavailable)? as usize,
                    facets: facets.len().map_err(GraphError::unavailable)? as usize,
                })
            }
        }
    };
}

impl_read_txn!(ReadTransaction);
impl_read_txn!(WriteTransaction);

// =============================================================================
// WRITE VIEW
// =============================================================================

impl WriteTxn for WriteTransaction {
    fn put_entity(&mut self, record: &EntityRecord) -> Result<(), GraphError> {
        let bytes = encode(record)?;
        let mut table = self.open_table(ENTITIES).map_err(GraphError::unavailable)?;
        table
            .insert(record.id.as_u128(), bytes.as_slice())
            .map_err(GraphError::unavailable)?;
        Ok(())
    }

    fn put_relation(&mut self, record: &RelationRecord) -> Result<(), GraphError> {
        let bytes = encode(record)?;
        let previous: Option<RelationRecord> = {
            let mut table = self.open_table(RELATIONS).map_err(GraphError::unavailable)?;
            let old = table
                .insert(record.id.as_u128(), bytes.as_slice())
                .map_err(GraphError::unavailable)?;
            match old {
                Some(data) => Some(decode(data.value())?),
                None => None,
            }
        };

        let mut outgoing = self.open_table(OUTGOING).map_err(GraphError::unavailable)?;
        let mut incoming = self.open_table(INCOMING).map_err(GraphError::unavailable)?;
        if let Some(old) = previous {
            outgoing
                .remove((old.source.as_u128(), old.id.as_u128()))
                .map_err(GraphError::unavailable)?;
            incoming
                .remove((old.target.as_u128(), old.id.as_u128()))
                .map_err(GraphError::unavailable)?;
        }
        outgoing
            .insert((record.source.as_u128(), record.id.as_u128()), ())
            .map_err(GraphError::unavailable)?;
        incoming
            .insert((record.target.as_u128(), record.id.as_u128()), ())
            .map_err(GraphError::unavailable)?;
        Ok(())
    }

    fn put_facet(&mut self, record: &FacetRecord) -> Result<(), GraphError> {
        let bytes = encode(record)?;
        let previous: Option<FacetRecord> = {
            let mut table = self.open_table(FACETS).map_err(GraphError::unavailable)?;
            let old = table
                .insert(record.id.as_u128(), bytes.as_slice())
                .map_err(GraphError::unavailable)?;
            match old {
                Some(data) => Some(decode(data.value())?),
                None => None,
            }
        };

        let mut owned = self.open_table(OWNED).map_err(GraphError::unavailable)?;
        if let Some(old) = previous {
            owned
                .remove((old.owner.id().as_u128(), old.id.as_u128()))
                .map_err(GraphError::unavailable)?;
        }
        owned
            .insert((record.owner.id().as_u128(), record.id.as_u128()), ())
            .map_err(GraphError::unavailable)?;
        Ok(())
    }

    fn remove_entity(&mut self, id: EntityId) -> Result<bool, GraphError> {
        let mut table = self.open_table(ENTITIES).map_err(GraphError::unavailable)?;
        let removed = table
            .remove(id.as_u128())
            .map_err(GraphError::unavailable)?
            .is_some();
        Ok(removed)
    }

    fn remove_relation(&mut self, id: RelationId) -> Result<bool, GraphError> {
        let removed: Option<RelationRecord> = {
            let mut table = self.open_table(RELATIONS).map_err(GraphError::unavailable)?;
            let old = table.remove(id.as_u128()).map_err(GraphError::unavailable)?;
            match old {
                Some(data) => Some(decode(data.value())?),
                None => None,
            }
        };
        let Some(record) = removed else {
            return Ok(false);
        };

        let mut outgoing = self.open_table(OUTGOING).map_err(GraphError::unavailable)?;
        outgoing
            .remove((record.source.as_u128(), record.id.as_u128()))
            .map_err(GraphError::unavailable)?;
        let mut incoming = self.open_table(INCOMING).map_err(GraphError::unavailable)?;
        incoming
            .remove((record.target.as_u128(), record.id.as_u128()))
            .map_err(GraphError::unavailable)?;
        Ok(true)
    }

    fn remove_facet(&mut self, id: FacetId) -> Result<bool, GraphError> {
        let removed: Option<FacetRecord> = {
            let mut table = self.open_table(FACETS).map_err(GraphError::unavailable)?;
            let old = table.remove(id.as_u128()).map_err(GraphError::unavailable)?;
            match old {
                Some(data) => Some(decode(data.value())?),
                None => None,
            }
        };
        let Some(record) = removed else {
            return Ok(false);
        };

        let mut owned = self.open_table(OWNED).map_err(GraphError::unavailable)?;
        owned
            .remove((record.owner.id().as_u128(), record.id.as_u128()))
            .map_err(GraphError::unavailable)?;
        Ok(true)
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// A disk-backed graph store using redb.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph").finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    ///
    /// Creates any missing table and rejects databases written with a
    /// different storage format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db = Database::create(path.as_ref()).map_err(GraphError::unavailable)?;

        let write_txn = db.begin_write().map_err(GraphError::unavailable)?;
        {
            let _ = write_txn
                .open_table(ENTITIES)
                .map_err(GraphError::unavailable)?;
            let _ = write_txn
                .open_table(RELATIONS)
                .map_err(GraphError::unavailable)?;
            let _ = write_txn
                .open_table(FACETS)
                .map_err(GraphError::unavailable)?;
            let _ = write_txn
                .open_table(OUTGOING)
                .map_err(GraphError::unavailable)?;
            let _ = write_txn
                .open_table(INCOMING)
                .map_err(GraphError::unavailable)?;
            let _ = write_txn
                .open_table(OWNED)
                .map_err(GraphError::unavailable)?;

            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(GraphError::unavailable)?;
            let stored = meta
                .get("format_version")
                .map_err(GraphError::unavailable)?
                .map(|v| v.value());
            match stored {
                Some(version) if version != STORAGE_FORMAT_VERSION => {
                    return Err(GraphError::StoreUnavailable(format!(
                        "unsupported storage format version {}",
                        version
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert("format_version", STORAGE_FORMAT_VERSION)
                        .map_err(GraphError::unavailable)?;
                }
            }
        }
        write_txn
            .commit()
            .map_err(|e| GraphError::TransactionFailed(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "opened redb graph");
        Ok(Self { db })
    }
}

impl GraphBackend for RedbGraph {
    fn read<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&dyn ReadTxn) -> Result<T, GraphError>,
    {
        let txn = self.db.begin_read().map_err(GraphError::unavailable)?;
        f(&txn)
    }

    fn write<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut dyn WriteTxn) -> Result<T, GraphError>,
    {
        let mut txn = self.db.begin_write().map_err(GraphError::unavailable)?;
        match f(&mut txn) {
            Ok(out) => {
                txn.commit()
                    .map_err(|e| GraphError::TransactionFailed(e.to_string()))?;
                Ok(out)
            }
            Err(err) => {
                if let Err(abort) = txn.abort() {
                    tracing::warn!(error = %abort, "failed to abort write transaction");
                }
                Err(err)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
