//! # Cycle Guard
//!
//! Keeps the relation set acyclic. A candidate edge `source -> target` closes
//! a cycle exactly when `source` is already reachable from `target` along
//! persisted relations.
//!
//! The walk is an iterative breadth-first search with an explicit visited set,
//! so it terminates on diamonds and never recurses. It stops as soon as the
//! goal is reached; its cost is bounded by the subgraph reachable from the
//! start, not by the size of the whole graph.

use crate::graph::ReadTxn;
use crate::{EntityId, GraphError};
use std::collections::{BTreeSet, VecDeque};

/// Reachability check run before every relation insert.
pub struct CycleGuard;

impl CycleGuard {
    /// Whether a directed path `from -> ... -> to` exists.
    ///
    /// `successors` yields the direct targets of one node. Each node is
    /// expanded at most once.
    pub fn reaches<F>(from: EntityId, to: EntityId, mut successors: F) -> Result<bool, GraphError>
    where
        F: FnMut(EntityId) -> Result<Vec<EntityId>, GraphError>,
    {
        if from == to {
            return Ok(true);
        }

        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        visited.insert(from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            for next in successors(current)? {
                if next == to {
                    return Ok(true);
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        Ok(false)
    }

    /// Whether adding `source -> target` would close a cycle in `view`.
    ///
    /// Call this inside the write transaction that inserts the relation so
    /// the check and the insert see the same state.
    pub fn would_close_cycle<V>(
        view: &V,
        source: EntityId,
        target: EntityId,
    ) -> Result<bool, GraphError>
    where
        V: ReadTxn + ?Sized,
    {
        Self::reaches(target, source, |node| view.successors(node))
    }
}

// =============================================================================
// TESTS
// =============================================================================
