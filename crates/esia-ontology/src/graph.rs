//! Validated ontology graph
//!
//! [`OntologyGraph`] is an in-memory typed multigraph whose mutators enforce
//! the relation table and the ownership invariants. Nodes and edges keep
//! insertion order, so every read is deterministic.
//!
//! [`GraphStore`] is the read interface analysis depends on. Any storage
//! backend can implement it.

use crate::error::{GraphError, Rule};
use crate::types::{Edge, EdgeId, EdgeKind, Node, NodeKind, NodeRef};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read primitives over an ontology graph
pub trait GraphStore {
    /// Fetch a node
    ///
    /// # Errors
    /// [`GraphError::NotFound`] if the node does not exist.
    fn get_node(&self, node: &NodeRef) -> Result<Node, GraphError>;

    /// Outgoing edges of `kind`, in insertion order
    fn edges_from(&self, node: &NodeRef, kind: EdgeKind) -> Vec<Edge>;

    /// Incoming edges of `kind`, in insertion order
    fn edges_to(&self, node: &NodeRef, kind: EdgeKind) -> Vec<Edge>;

    /// Whether the node exists
    fn contains_node(&self, node: &NodeRef) -> bool {
        self.get_node(node).is_ok()
    }
}

/// Owning bounded context of a node, derived through containment
///
/// - BoundedContext: itself
/// - Aggregate / Policy: source of its HAS_AGGREGATE / HAS_POLICY edge
/// - Command: owner of its aggregate
/// - Event: owner of its first emitting command
/// - UserStory: owner of its first IMPLEMENTS target
///
/// Returns `None` when the chain is broken or the kind has no owner.
pub fn owning_context<G: GraphStore + ?Sized>(store: &G, node: &NodeRef) -> Option<NodeRef> {
    match node.kind {
        NodeKind::BoundedContext => store.contains_node(node).then(|| node.clone()),
        NodeKind::Aggregate | NodeKind::Policy => {
            let relation = node.kind.owner_relation()?;
            first_source(store, node, relation)
        }
        NodeKind::Command => {
            let aggregate = first_source(store, node, EdgeKind::HasCommand)?;
            first_source(store, &aggregate, EdgeKind::HasAggregate)
        }
        NodeKind::Event => store
            .edges_to(node, EdgeKind::Emits)
            .into_iter()
            .filter(|edge| store.contains_node(&edge.from))
            .find_map(|edge| owning_context(store, &edge.from)),
        NodeKind::UserStory => store
            .edges_from(node, EdgeKind::Implements)
            .into_iter()
            .filter(|edge| store.contains_node(&edge.to))
            .find_map(|edge| owning_context(store, &edge.to)),
        NodeKind::Requirement => None,
    }
}

fn first_source<G: GraphStore + ?Sized>(
    store: &G,
    node: &NodeRef,
    kind: EdgeKind,
) -> Option<NodeRef> {
    store
        .edges_to(node, kind)
        .into_iter()
        .map(|edge| edge.from)
        .find(|from| store.contains_node(from))
}

/// Node and edge counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Node count per kind
    pub nodes: BTreeMap<NodeKind, usize>,
    /// Edge count per relation
    pub edges: BTreeMap<EdgeKind, usize>,
}

impl GraphStats {
    /// Total node count
    #[must_use]
    pub fn node_total(&self) -> usize {
        self.nodes.values().sum()
    }

    /// Total edge count
    #[must_use]
    pub fn edge_total(&self) -> usize {
        self.edges.values().sum()
    }
}

/// In-memory ontology graph with validated mutation
#[derive(Debug, Clone, Default)]
pub struct OntologyGraph {
    nodes: IndexMap<NodeRef, Node>,
    edges: IndexMap<EdgeId, Edge>,
    outgoing: IndexMap<NodeRef, IndexSet<EdgeId>>,
    incoming: IndexMap<NodeRef, IndexSet<EdgeId>>,
}

impl OntologyGraph {
    /// Create empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph without running any check
    ///
    /// Used for bulk reloads of externally produced data. Later nodes replace
    /// earlier ones with the same reference; duplicate edges collapse. The
    /// result may violate invariants or contain dangling edges; audit it with
    /// [`crate::InvariantValidator`].
    #[must_use]
    pub fn from_parts_unchecked(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.nodes.insert(node.node_ref(), node);
        }
        for edge in edges {
            graph.insert_edge(edge);
        }
        graph
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if graph is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by reference
    #[inline]
    #[must_use]
    pub fn node(&self, node: &NodeRef) -> Option<&Node> {
        self.nodes.get(node)
    }

    /// Edge by identity
    #[inline]
    #[must_use]
    pub fn edge(&self, edge: &EdgeId) -> Option<&Edge> {
        self.edges.get(edge)
    }

    /// Check if node exists
    #[inline]
    #[must_use]
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.nodes.contains_key(node)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Owning bounded context of a node
    #[must_use]
    pub fn owning_context(&self, node: &NodeRef) -> Option<NodeRef> {
        owning_context(self, node)
    }

    /// Add a node
    ///
    /// # Errors
    /// [`GraphError::DuplicateId`] if `(kind, id)` exists.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        let key = node.node_ref();
        if self.nodes.contains_key(&key) {
            return Err(GraphError::DuplicateId { node: key });
        }
        tracing::debug!("Adding node {}", key);
        self.nodes.insert(key, node);
        Ok(())
    }

    /// Insert or replace a node's attributes
    ///
    /// Returns `true` if the node was new. Attributes never affect ownership,
    /// so replacing is always safe.
    pub fn upsert_node(&mut self, node: Node) -> bool {
        let key = node.node_ref();
        self.nodes.insert(key, node).is_none()
    }

    /// Add an edge with the relation's default attributes
    ///
    /// Returns `false` if an identical edge already existed.
    ///
    /// # Errors
    /// See [`OntologyGraph::add_edge_with`].
    pub fn add_edge(
        &mut self,
        kind: EdgeKind,
        from: NodeRef,
        to: NodeRef,
    ) -> Result<bool, GraphError> {
        self.add_edge_with(Edge::new(kind, from, to))
    }

    /// Add an edge
    ///
    /// Returns `false` if an edge with the same identity already existed; its
    /// attributes are replaced.
    ///
    /// # Errors
    /// - [`GraphError::TypeMismatch`] if the kind pair is not in the relation table
    /// - [`GraphError::NotFound`] if an endpoint does not exist
    /// - [`GraphError::OwnershipViolation`] for a second owner or a cross-context INVOKES
    pub fn add_edge_with(&mut self, edge: Edge) -> Result<bool, GraphError> {
        let id = edge.id();
        if !edge.kind.accepts(edge.from.kind, edge.to.kind) {
            return Err(GraphError::TypeMismatch { edge: id });
        }
        for endpoint in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::NotFound {
                    node: endpoint.clone(),
                });
            }
        }
        if let Some(existing) = self.edges.get_mut(&id) {
            existing.attrs = edge.attrs;
            return Ok(false);
        }

        if edge.kind.is_containment() {
            if let Some(owner) = self.sources(&edge.to, edge.kind).next() {
                return Err(GraphError::OwnershipViolation {
                    rule: Rule::SingleOwner,
                    edge: id,
                    message: format!("{} is already owned by {}", edge.to, owner),
                });
            }
        }
        if edge.kind == EdgeKind::Invokes {
            self.check_invocation(&id)?;
        }

        tracing::debug!("Adding edge {}", id);
        self.insert_edge(edge);
        Ok(true)
    }

    /// Remove an edge
    ///
    /// # Errors
    /// - [`GraphError::EdgeNotFound`] if the edge does not exist
    /// - [`GraphError::OwnershipViolation`] if removing a containment edge
    ///   would leave an INVOKES endpoint without an owner
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge, GraphError> {
        if !self.edges.contains_key(id) {
            return Err(GraphError::EdgeNotFound { edge: id.clone() });
        }
        if id.kind.is_containment() {
            let mut orphaned = vec![id.to.clone()];
            orphaned.extend(self.descendants(&id.to));
            self.ensure_no_invocations(&orphaned, &format!("removing {id}"))?;
        }
        tracing::debug!("Removing edge {}", id);
        self.take_edge(id)
            .ok_or_else(|| GraphError::EdgeNotFound { edge: id.clone() })
    }

    /// Remove a node and every incident edge
    ///
    /// # Errors
    /// - [`GraphError::NotFound`] if the node does not exist
    /// - [`GraphError::OwnershipViolation`] if a contained Command or Policy
    ///   still takes part in an INVOKES edge
    pub fn remove_node(&mut self, node: &NodeRef) -> Result<Node, GraphError> {
        if !self.nodes.contains_key(node) {
            return Err(GraphError::NotFound { node: node.clone() });
        }
        let orphaned = self.descendants(node);
        self.ensure_no_invocations(&orphaned, &format!("removing {node}"))?;

        let incident: Vec<EdgeId> = self
            .outgoing
            .get(node)
            .into_iter()
            .chain(self.incoming.get(node))
            .flat_map(|ids| ids.iter().cloned())
            .collect();
        for id in &incident {
            self.take_edge(id);
        }
        self.outgoing.shift_remove(node);
        self.incoming.shift_remove(node);

        tracing::debug!("Removing node {} with {} edges", node, incident.len());
        self.nodes
            .shift_remove(node)
            .ok_or_else(|| GraphError::NotFound { node: node.clone() })
    }

    /// Node and edge counts
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for kind in NodeKind::ALL {
            stats.nodes.insert(kind, 0);
        }
        for kind in EdgeKind::ALL {
            stats.edges.insert(kind, 0);
        }
        for node in self.nodes.keys() {
            *stats.nodes.entry(node.kind).or_default() += 1;
        }
        for edge in self.edges.keys() {
            *stats.edges.entry(edge.kind).or_default() += 1;
        }
        stats
    }

    /// INVOKES rule for one edge: both owners resolve and are equal
    pub(crate) fn check_invocation(&self, id: &EdgeId) -> Result<(), GraphError> {
        let policy_owner = self.owning_context(&id.from);
        let command_owner = self.owning_context(&id.to);
        let violation = |message: String| GraphError::OwnershipViolation {
            rule: Rule::InvokesIntraContext,
            edge: id.clone(),
            message,
        };
        match (policy_owner, command_owner) {
            (Some(p), Some(c)) if p == c => Ok(()),
            (Some(p), Some(c)) => Err(violation(format!(
                "policy is owned by {p} but command is owned by {c}"
            ))),
            (None, _) => Err(violation(format!(
                "{} has no owning bounded context",
                id.from
            ))),
            (_, None) => Err(violation(format!(
                "{} has no owning bounded context",
                id.to
            ))),
        }
    }

    /// Sources of incoming `kind` edges that exist
    pub(crate) fn sources<'a>(
        &'a self,
        node: &NodeRef,
        kind: EdgeKind,
    ) -> impl Iterator<Item = &'a NodeRef> + 'a {
        self.incoming
            .get(node)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter(move |id| id.kind == kind && self.nodes.contains_key(&id.from))
            .map(|id| &id.from)
    }

    /// Nodes whose owner chain passes through `node`, excluding `node`
    fn descendants(&self, node: &NodeRef) -> Vec<NodeRef> {
        let mut found = Vec::new();
        let mut stack = vec![node.clone()];
        while let Some(current) = stack.pop() {
            let Some(ids) = self.outgoing.get(&current) else {
                continue;
            };
            for id in ids.iter().filter(|id| id.kind.is_containment()) {
                if id.to != *node && !found.contains(&id.to) {
                    found.push(id.to.clone());
                    stack.push(id.to.clone());
                }
            }
        }
        found
    }

    fn ensure_no_invocations(&self, orphaned: &[NodeRef], action: &str) -> Result<(), GraphError> {
        for node in orphaned {
            let incident = self
                .outgoing
                .get(node)
                .into_iter()
                .chain(self.incoming.get(node))
                .flat_map(|ids| ids.iter())
                .find(|id| id.kind == EdgeKind::Invokes);
            if let Some(id) = incident {
                tracing::warn!("Rejected mutation: {} would orphan {}", action, node);
                return Err(GraphError::OwnershipViolation {
                    rule: Rule::InvokesIntraContext,
                    edge: id.clone(),
                    message: format!("{action} leaves {node} without an owning bounded context"),
                });
            }
        }
        Ok(())
    }

    fn insert_edge(&mut self, edge: Edge) {
        let id = edge.id();
        self.outgoing
            .entry(id.from.clone())
            .or_default()
            .insert(id.clone());
        self.incoming
            .entry(id.to.clone())
            .or_default()
            .insert(id.clone());
        self.edges.insert(id, edge);
    }

    fn take_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        if let Some(ids) = self.outgoing.get_mut(&id.from) {
            ids.shift_remove(id);
        }
        if let Some(ids) = self.incoming.get_mut(&id.to) {
            ids.shift_remove(id);
        }
        self.edges.shift_remove(id)
    }

    fn collect_edges(&self, ids: Option<&IndexSet<EdgeId>>, kind: EdgeKind) -> Vec<Edge> {
        ids.into_iter()
            .flat_map(|ids| ids.iter())
            .filter(|id| id.kind == kind)
            .filter_map(|id| self.edges.get(id).cloned())
            .collect()
    }
}

impl GraphStore for OntologyGraph {
    fn get_node(&self, node: &NodeRef) -> Result<Node, GraphError> {
        self.nodes
            .get(node)
            .cloned()
            .ok_or_else(|| GraphError::NotFound { node: node.clone() })
    }

    fn edges_from(&self, node: &NodeRef, kind: EdgeKind) -> Vec<Edge> {
        self.collect_edges(self.outgoing.get(node), kind)
    }

    fn edges_to(&self, node: &NodeRef, kind: EdgeKind) -> Vec<Edge> {
        self.collect_edges(self.incoming.get(node), kind)
    }

    fn contains_node(&self, node: &NodeRef) -> bool {
        self.nodes.contains_key(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Order context with CancelOrder emitting OrderCancelled, plus Payment
    /// context with a refund policy and command.
    fn two_contexts() -> OntologyGraph {
        let mut graph = OntologyGraph::new();
        for node in [
            Node::context("order", "Order"),
            Node::context("payment", "Payment"),
            Node::aggregate("order-agg", "Order"),
            Node::aggregate("payment-agg", "Payment"),
            Node::command("cancel", "CancelOrder"),
            Node::command("refund", "ProcessRefund"),
            Node::event("cancelled", "OrderCancelled"),
            Node::policy("refund-policy", "RefundOnOrderCancelled"),
        ] {
            graph.add_node(node).unwrap();
        }
        let edges = [
            (EdgeKind::HasAggregate, NodeRef::context("order"), NodeRef::aggregate("order-agg")),
            (EdgeKind::HasAggregate, NodeRef::context("payment"), NodeRef::aggregate("payment-agg")),
            (EdgeKind::HasCommand, NodeRef::aggregate("order-agg"), NodeRef::command("cancel")),
            (EdgeKind::HasCommand, NodeRef::aggregate("payment-agg"), NodeRef::command("refund")),
            (EdgeKind::HasPolicy, NodeRef::context("payment"), NodeRef::policy("refund-policy")),
            (EdgeKind::Emits, NodeRef::command("cancel"), NodeRef::event("cancelled")),
            (EdgeKind::Triggers, NodeRef::event("cancelled"), NodeRef::policy("refund-policy")),
            (EdgeKind::Invokes, NodeRef::policy("refund-policy"), NodeRef::command("refund")),
        ];
        for (kind, from, to) in edges {
            graph.add_edge(kind, from, to).unwrap();
        }
        graph
    }

    #[test]
    fn add_node_rejects_duplicate_id() {
        let mut graph = OntologyGraph::new();
        graph.add_node(Node::event("e1", "OrderCancelled")).unwrap();
        let err = graph.add_node(Node::event("e1", "Other")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateId { node: NodeRef::event("e1") });
        // Same id under another kind is a different node
        graph.add_node(Node::command("e1", "Cmd")).unwrap();
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn add_edge_rejects_type_mismatch() {
        let mut graph = two_contexts();
        let err = graph
            .add_edge(EdgeKind::Emits, NodeRef::policy("refund-policy"), NodeRef::event("cancelled"))
            .unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
        assert_eq!(err.rule(), Rule::RelationTable);
    }

    #[test]
    fn add_edge_rejects_missing_endpoint() {
        let mut graph = two_contexts();
        let err = graph
            .add_edge(EdgeKind::Emits, NodeRef::command("cancel"), NodeRef::event("ghost"))
            .unwrap_err();
        assert_eq!(err, GraphError::NotFound { node: NodeRef::event("ghost") });
    }

    #[test]
    fn add_edge_is_idempotent() {
        let mut graph = two_contexts();
        let before = graph.edge_count();
        let added = graph
            .add_edge(EdgeKind::Emits, NodeRef::command("cancel"), NodeRef::event("cancelled"))
            .unwrap();
        assert!(!added);
        assert_eq!(graph.edge_count(), before);
    }

    #[test]
    fn second_owner_is_rejected() {
        let mut graph = two_contexts();
        let err = graph
            .add_edge(
                EdgeKind::HasAggregate,
                NodeRef::context("payment"),
                NodeRef::aggregate("order-agg"),
            )
            .unwrap_err();
        match err {
            GraphError::OwnershipViolation { rule, message, .. } => {
                assert_eq!(rule, Rule::SingleOwner);
                assert!(message.contains("BoundedContext:order"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cross_context_invocation_is_rejected() {
        let mut graph = two_contexts();
        let err = graph
            .add_edge(
                EdgeKind::Invokes,
                NodeRef::policy("refund-policy"),
                NodeRef::command("cancel"),
            )
            .unwrap_err();
        assert_eq!(err.rule(), Rule::InvokesIntraContext);
        assert_eq!(graph.edges_from(&NodeRef::policy("refund-policy"), EdgeKind::Invokes).len(), 1);
    }

    #[test]
    fn invocation_needs_resolved_owners() {
        let mut graph = two_contexts();
        graph.add_node(Node::policy("loose", "Loose")).unwrap();
        let err = graph
            .add_edge(EdgeKind::Invokes, NodeRef::policy("loose"), NodeRef::command("refund"))
            .unwrap_err();
        match err {
            GraphError::OwnershipViolation { rule, message, .. } => {
                assert_eq!(rule, Rule::InvokesIntraContext);
                assert!(message.contains("Policy:loose"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn owner_resolution_follows_containment() {
        let graph = two_contexts();
        let payment = Some(NodeRef::context("payment"));
        assert_eq!(graph.owning_context(&NodeRef::command("refund")), payment);
        assert_eq!(graph.owning_context(&NodeRef::policy("refund-policy")), payment);
        assert_eq!(
            graph.owning_context(&NodeRef::event("cancelled")),
            Some(NodeRef::context("order"))
        );
        assert_eq!(graph.owning_context(&NodeRef::context("order")), Some(NodeRef::context("order")));
    }

    #[test]
    fn removing_owner_of_invoked_command_is_rejected() {
        let mut graph = two_contexts();
        let containment = EdgeId::new(
            EdgeKind::HasAggregate,
            NodeRef::context("payment"),
            NodeRef::aggregate("payment-agg"),
        );
        let err = graph.remove_edge(&containment).unwrap_err();
        assert_eq!(err.rule(), Rule::InvokesIntraContext);
        assert!(graph.edge(&containment).is_some());

        let err = graph.remove_node(&NodeRef::context("payment")).unwrap_err();
        assert_eq!(err.rule(), Rule::InvokesIntraContext);
        assert!(graph.contains(&NodeRef::context("payment")));
    }

    #[test]
    fn remove_node_cascades_edges() {
        let mut graph = two_contexts();
        graph.remove_node(&NodeRef::policy("refund-policy")).unwrap();
        assert!(graph.edges_to(&NodeRef::command("refund"), EdgeKind::Invokes).is_empty());
        assert!(graph.edges_from(&NodeRef::event("cancelled"), EdgeKind::Triggers).is_empty());

        // With the invocation gone, the payment context can be dismantled
        graph.remove_node(&NodeRef::context("payment")).unwrap();
        assert_eq!(graph.owning_context(&NodeRef::command("refund")), None);
    }

    #[test]
    fn edges_keep_insertion_order() {
        let mut graph = two_contexts();
        graph.add_node(Node::policy("audit", "AuditCancellation")).unwrap();
        graph
            .add_edge(EdgeKind::HasPolicy, NodeRef::context("order"), NodeRef::policy("audit"))
            .unwrap();
        graph
            .add_edge(EdgeKind::Triggers, NodeRef::event("cancelled"), NodeRef::policy("audit"))
            .unwrap();
        let targets: Vec<String> = graph
            .edges_from(&NodeRef::event("cancelled"), EdgeKind::Triggers)
            .into_iter()
            .map(|edge| edge.to.id)
            .collect();
        assert_eq!(targets, vec!["refund-policy", "audit"]);
    }

    #[test]
    fn stats_count_every_kind() {
        let stats = two_contexts().stats();
        assert_eq!(stats.nodes[&NodeKind::BoundedContext], 2);
        assert_eq!(stats.nodes[&NodeKind::UserStory], 0);
        assert_eq!(stats.edges[&EdgeKind::Invokes], 1);
        assert_eq!(stats.node_total(), 8);
        assert_eq!(stats.edge_total(), 8);
    }
}
