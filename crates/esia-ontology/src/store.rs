//! One-writer / many-reader snapshot store
//!
//! Readers take an immutable [`Snapshot`] at call start and keep it for the
//! whole analysis. Writers serialize on a writer lock, mutate a private copy
//! and publish it atomically. A failing mutation publishes nothing.

use crate::error::{GraphError, Violation};
use crate::graph::{GraphStats, GraphStore, OntologyGraph};
use crate::types::{Edge, EdgeId, EdgeKind, Node, NodeRef};
use crate::validator::InvariantValidator;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// Immutable view of the graph at one generation
#[derive(Debug, Clone)]
pub struct Snapshot {
    graph: Arc<OntologyGraph>,
    generation: u64,
}

impl Snapshot {
    /// Generation this snapshot was published at
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Underlying graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &OntologyGraph {
        &self.graph
    }
}

impl Deref for Snapshot {
    type Target = OntologyGraph;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}

impl GraphStore for Snapshot {
    fn get_node(&self, node: &NodeRef) -> Result<Node, GraphError> {
        self.graph.get_node(node)
    }

    fn edges_from(&self, node: &NodeRef, kind: EdgeKind) -> Vec<Edge> {
        self.graph.edges_from(node, kind)
    }

    fn edges_to(&self, node: &NodeRef, kind: EdgeKind) -> Vec<Edge> {
        self.graph.edges_to(node, kind)
    }

    fn contains_node(&self, node: &NodeRef) -> bool {
        self.graph.contains(node)
    }
}

/// Nodes and edges applied together by [`SnapshotStore::bulk_upsert`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertBatch {
    /// Nodes, inserted or replaced
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges, validated after all nodes are in place
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl UpsertBatch {
    /// Create empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add an edge with default attributes
    #[must_use]
    pub fn with_edge(mut self, kind: EdgeKind, from: NodeRef, to: NodeRef) -> Self {
        self.edges.push(Edge::new(kind, from, to));
        self
    }

    /// Check if batch is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Outcome of a bulk upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertReport {
    /// Generation published by the upsert
    pub generation: u64,
    /// New nodes
    pub nodes_inserted: usize,
    /// Existing nodes whose attributes were replaced
    pub nodes_updated: usize,
    /// New edges
    pub edges_inserted: usize,
    /// Edges already present
    pub edges_unchanged: usize,
}

/// Snapshot store guarding every graph mutation
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Snapshot>,
    writer: Mutex<()>,
    validator: InvariantValidator,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(OntologyGraph::new())
    }
}

impl SnapshotStore {
    /// Create store publishing `graph` as generation 0
    ///
    /// The graph is taken as is; call [`SnapshotStore::reload`] to audit
    /// externally produced data.
    #[must_use]
    pub fn new(graph: OntologyGraph) -> Self {
        Self {
            current: RwLock::new(Snapshot {
                graph: Arc::new(graph),
                generation: 0,
            }),
            writer: Mutex::new(()),
            validator: InvariantValidator::new(),
        }
    }

    /// Current snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.current.read().clone()
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Counts of the current snapshot
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        self.snapshot().stats()
    }

    /// Apply `f` to a private copy and publish it if `f` succeeds
    ///
    /// # Errors
    /// Whatever `f` returns; the current snapshot is left untouched.
    pub fn mutate<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut OntologyGraph) -> Result<T, GraphError>,
    {
        self.publish(f).map(|(value, _)| value)
    }

    fn publish<T, F>(&self, f: F) -> Result<(T, u64), GraphError>
    where
        F: FnOnce(&mut OntologyGraph) -> Result<T, GraphError>,
    {
        let _writer = self.writer.lock();
        let base = self.snapshot();
        let mut draft = OntologyGraph::clone(&base.graph);

        match f(&mut draft) {
            Ok(value) => {
                let generation = base.generation + 1;
                *self.current.write() = Snapshot {
                    graph: Arc::new(draft),
                    generation,
                };
                tracing::debug!("Published snapshot generation {}", generation);
                Ok((value, generation))
            }
            Err(err) => {
                tracing::warn!("Rejected mutation: {}", err);
                Err(err)
            }
        }
    }

    /// Add a node
    ///
    /// # Errors
    /// See [`OntologyGraph::add_node`].
    pub fn add_node(&self, node: Node) -> Result<(), GraphError> {
        self.mutate(|graph| graph.add_node(node))
    }

    /// Add an edge
    ///
    /// # Errors
    /// See [`OntologyGraph::add_edge_with`].
    pub fn add_edge(&self, kind: EdgeKind, from: NodeRef, to: NodeRef) -> Result<bool, GraphError> {
        self.mutate(|graph| graph.add_edge(kind, from, to))
    }

    /// Remove an edge
    ///
    /// # Errors
    /// See [`OntologyGraph::remove_edge`].
    pub fn remove_edge(&self, id: &EdgeId) -> Result<Edge, GraphError> {
        self.mutate(|graph| graph.remove_edge(id))
    }

    /// Remove a node and its edges
    ///
    /// # Errors
    /// See [`OntologyGraph::remove_node`].
    pub fn remove_node(&self, node: &NodeRef) -> Result<Node, GraphError> {
        self.mutate(|graph| graph.remove_node(node))
    }

    /// Apply a batch transactionally: every node and edge lands, or none
    ///
    /// Nodes are upserted first so edges may reference nodes from the same
    /// batch. Edges are added in batch order through the validated path.
    ///
    /// # Errors
    /// The first rejected edge; nothing is published.
    pub fn bulk_upsert(&self, batch: UpsertBatch) -> Result<UpsertReport, GraphError> {
        let node_count = batch.nodes.len();
        let edge_count = batch.edges.len();
        let (mut report, generation) = self.publish(|graph| {
            let mut report = UpsertReport::default();
            for node in batch.nodes {
                if graph.upsert_node(node) {
                    report.nodes_inserted += 1;
                } else {
                    report.nodes_updated += 1;
                }
            }
            for edge in batch.edges {
                if graph.add_edge_with(edge)? {
                    report.edges_inserted += 1;
                } else {
                    report.edges_unchanged += 1;
                }
            }
            Ok(report)
        })?;
        report.generation = generation;
        tracing::info!(
            "Bulk upsert applied {} nodes and {} edges at generation {}",
            node_count,
            edge_count,
            report.generation
        );
        Ok(report)
    }

    /// Replace the whole graph and audit the result
    ///
    /// The graph is published even if it has violations; callers decide
    /// whether they are fatal.
    pub fn reload(&self, graph: OntologyGraph) -> Vec<Violation> {
        let violations = self.validator.validate(&graph);
        let _writer = self.writer.lock();
        let generation = self.generation() + 1;
        *self.current.write() = Snapshot {
            graph: Arc::new(graph),
            generation,
        };
        tracing::info!(
            "Reloaded graph at generation {} with {} violations",
            generation,
            violations.len()
        );
        violations
    }
}
