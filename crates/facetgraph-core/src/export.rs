//! # Graph Assembler
//!
//! Builds a full-graph snapshot for export and visualization: every entity
//! as a node with its facets, every relation as an edge with its facets.
//!
//! The snapshot is read inside one read transaction, so it reflects a single
//! committed state on every backend.
//!
//! ## Verification
//!
//! `verify` re-checks a snapshot independently of the store that produced it:
//! - every edge endpoint is a node
//! - every facet names the node or edge that carries it
//! - the edges form a DAG (Kahn's algorithm)
//!
//! A snapshot produced by this crate always verifies clean. The check exists
//! for snapshots read back from files or built by hand.

use crate::facet::load_for;
use crate::graph::GraphBackend;
use crate::relation;
use crate::{EntityId, EntityRecord, Facet, FacetId, GraphError, Owner, Relation, RelationId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SNAPSHOT TYPES
// =============================================================================

/// An entity as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub facets: Vec<Facet>,
}

impl GraphNode {
    fn from_record(record: EntityRecord, facets: Vec<Facet>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            facets,
        }
    }
}

/// Every node and edge of the graph at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Entities, ordered by (name, id).
    pub nodes: Vec<GraphNode>,
    /// Relations, ordered by (source, target, name, id).
    pub edges: Vec<Relation>,
}

/// A problem found by `GraphAssembler::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// An edge points at an entity that is not in the snapshot.
    DanglingEndpoint {
        relation: RelationId,
        entity: EntityId,
    },
    /// An edge connects an entity to itself.
    SelfLoop { relation: RelationId },
    /// A facet is listed under a record other than its owner.
    MisplacedFacet {
        facet: FacetId,
        owner: Owner,
        listed_under: Owner,
    },
    /// Entities that lie on, or downstream of, a directed cycle.
    Cycle { entities: Vec<EntityId> },
}

// =============================================================================
// ASSEMBLER
// =============================================================================

/// Snapshot construction and offline checks.
pub struct GraphAssembler;

impl GraphAssembler {
    /// Read the whole graph in one transaction.
    pub fn snapshot<B: GraphBackend>(store: &B) -> Result<GraphSnapshot, GraphError> {
        let snapshot = store.read(|txn| {
            let mut entities = txn.entities()?;
            entities.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

            let mut nodes = Vec::with_capacity(entities.len());
            for record in entities {
                let facets = load_for(txn, Owner::Entity(record.id))?;
                nodes.push(GraphNode::from_record(record, facets));
            }

            let mut relations = txn.relations()?;
            relations.sort_by(|a, b| {
                (a.source, a.target, &a.name, a.id).cmp(&(b.source, b.target, &b.name, b.id))
            });

            let mut edges = Vec::with_capacity(relations.len());
            for record in relations {
                edges.push(relation::hydrate(txn, record)?);
            }

            Ok(GraphSnapshot { nodes, edges })
        })?;

        tracing::debug!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "graph snapshot assembled"
        );
        Ok(snapshot)
    }

    /// Check a snapshot for referential integrity and acyclicity.
    ///
    /// Returns every issue found; an empty list means the snapshot is sound.
    pub fn verify(snapshot: &GraphSnapshot) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();
        let nodes: BTreeSet<EntityId> = snapshot.nodes.iter().map(|n| n.id).collect();

        for node in &snapshot.nodes {
            misplaced(&node.facets, Owner::Entity(node.id), &mut issues);
        }

        for edge in &snapshot.edges {
            for endpoint in [edge.source, edge.target] {
                if !nodes.contains(&endpoint) {
                    issues.push(IntegrityIssue::DanglingEndpoint {
                        relation: edge.id,
                        entity: endpoint,
                    });
                }
            }
            if edge.source == edge.target {
                issues.push(IntegrityIssue::SelfLoop { relation: edge.id });
            }
            misplaced(&edge.facets, Owner::Relation(edge.id), &mut issues);
        }

        let (_, stuck) = kahn(snapshot);
        if !stuck.is_empty() {
            issues.push(IntegrityIssue::Cycle { entities: stuck });
        }

        issues
    }

    /// Node ids in dependency order: every edge's source precedes its target.
    ///
    /// Ties are broken by id, so the order is deterministic. Returns `None`
    /// when the edges contain a cycle. Edges with an endpoint outside the
    /// snapshot are ignored.
    pub fn topological_order(snapshot: &GraphSnapshot) -> Option<Vec<EntityId>> {
        let (order, stuck) = kahn(snapshot);
        stuck.is_empty().then_some(order)
    }
}

fn misplaced(facets: &[Facet], listed_under: Owner, issues: &mut Vec<IntegrityIssue>) {
    for facet in facets {
        if facet.owner != listed_under {
            issues.push(IntegrityIssue::MisplacedFacet {
                facet: facet.id,
                owner: facet.owner,
                listed_under,
            });
        }
    }
}

/// Kahn's algorithm over the snapshot's nodes.
///
/// Returns the emitted order and the nodes that were never released (those
/// on or behind a cycle), both sorted deterministically.
fn kahn(snapshot: &GraphSnapshot) -> (Vec<EntityId>, Vec<EntityId>) {
    let mut indegree: BTreeMap<EntityId, usize> =
        snapshot.nodes.iter().map(|node| (node.id, 0)).collect();
    let mut successors: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();

    for edge in &snapshot.edges {
        if !indegree.contains_key(&edge.source) {
            continue;
        }
        let Some(degree) = indegree.get_mut(&edge.target) else {
            continue;
        };
        *degree += 1;
        successors.entry(edge.source).or_default().push(edge.target);
    }

    let mut ready: BTreeSet<EntityId> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(indegree.len());

    while let Some(current) = ready.pop_first() {
        order.push(current);
        for next in successors.get(&current).into_iter().flatten() {
            if let Some(degree) = indegree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*next);
                }
            }
        }
    }

    let emitted: BTreeSet<EntityId> = order.iter().copied().collect();
    let stuck = indegree
        .into_keys()
        .filter(|id| !emitted.contains(id))
        .collect();
    (order, stuck)
}

// =============================================================================
// TESTS
// =============================================================================
