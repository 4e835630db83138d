//! Full-graph invariant audit
//!
//! Mutations through [`OntologyGraph`] are checked incrementally. Graphs
//! produced by bulk reloads are not, so [`InvariantValidator::validate`]
//! re-runs every rule and reports the complete list of violations.

use crate::error::{GraphError, Rule, Violation};
use crate::graph::OntologyGraph;
use crate::types::{EdgeKind, NodeKind};

/// Context for one audit run
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationContext {
    /// Report Aggregates, Commands and Policies without an owner
    pub require_owners: bool,
}

impl ValidationContext {
    /// Context with every rule enabled
    #[must_use]
    pub fn full() -> Self {
        Self {
            require_owners: true,
        }
    }
}

/// Invariant validator
#[derive(Debug, Clone, Copy)]
pub struct InvariantValidator {
    context: ValidationContext,
}

impl Default for InvariantValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantValidator {
    /// Validator with every rule enabled
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: ValidationContext::full(),
        }
    }

    /// Validator with a custom context
    #[inline]
    #[must_use]
    pub fn with_context(context: ValidationContext) -> Self {
        Self { context }
    }

    /// Audit the whole graph
    ///
    /// Order: edge endpoint and relation-table checks in edge order, then
    /// ownership checks in node order, then INVOKES checks in edge order.
    #[must_use]
    pub fn validate(&self, graph: &OntologyGraph) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.validate_structure(graph, &mut violations);
        self.validate_ownership(graph, &mut violations);
        self.validate_invocations(graph, &mut violations);

        if violations.is_empty() {
            tracing::debug!("Graph audit passed: {} nodes", graph.node_count());
        } else {
            tracing::warn!("Graph audit found {} violations", violations.len());
        }
        violations
    }

    fn validate_structure(&self, graph: &OntologyGraph, out: &mut Vec<Violation>) {
        for edge in graph.edges() {
            let id = edge.id();
            for endpoint in [&edge.from, &edge.to] {
                if !graph.contains(endpoint) {
                    out.push(Violation::from(GraphError::DanglingEdge {
                        edge: id.clone(),
                        missing: endpoint.clone(),
                    }));
                }
            }
            if !edge.kind.accepts(edge.from.kind, edge.to.kind) {
                out.push(Violation::from(GraphError::TypeMismatch { edge: id }));
            }
        }
    }

    fn validate_ownership(&self, graph: &OntologyGraph, out: &mut Vec<Violation>) {
        for node in graph.nodes() {
            let node_ref = node.node_ref();
            let Some(relation) = node.kind().owner_relation() else {
                continue;
            };

            let owners: Vec<String> = graph
                .sources(&node_ref, relation)
                .map(ToString::to_string)
                .collect();
            if owners.len() > 1 {
                out.push(Violation::node(
                    Rule::SingleOwner,
                    node_ref.clone(),
                    format!("owned by {} parents: {}", owners.len(), owners.join(", ")),
                ));
            }

            if self.context.require_owners && graph.owning_context(&node_ref).is_none() {
                let message = match (node.kind(), owners.first()) {
                    (NodeKind::Command, Some(aggregate)) => {
                        format!("aggregate {aggregate} has no owning bounded context")
                    }
                    _ => "no owning bounded context".to_string(),
                };
                out.push(Violation::node(Rule::OrphanArtifact, node_ref, message));
            }
        }
    }

    fn validate_invocations(&self, graph: &OntologyGraph, out: &mut Vec<Violation>) {
        for edge in graph.edges().filter(|e| e.kind == EdgeKind::Invokes) {
            if !graph.contains(&edge.from) || !graph.contains(&edge.to) {
                continue;
            }
            if let Err(err) = graph.check_invocation(&edge.id()) {
                out.push(Violation::from(err));
            }
        }
    }
}

/// Audit a graph with every rule enabled
#[must_use]
pub fn validate_graph(graph: &OntologyGraph) -> Vec<Violation> {
    InvariantValidator::new().validate(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Subject;
    use crate::types::{Edge, EdgeKind, Node, NodeRef};

    fn edge(kind: EdgeKind, from: NodeRef, to: NodeRef) -> Edge {
        Edge::new(kind, from, to)
    }

    #[test]
    fn valid_graph_has_no_violations() {
        let mut graph = OntologyGraph::new();
        graph.add_node(Node::context("order", "Order")).unwrap();
        graph.add_node(Node::aggregate("agg", "Order")).unwrap();
        graph.add_node(Node::command("cancel", "CancelOrder")).unwrap();
        graph
            .add_edge(EdgeKind::HasAggregate, NodeRef::context("order"), NodeRef::aggregate("agg"))
            .unwrap();
        graph
            .add_edge(EdgeKind::HasCommand, NodeRef::aggregate("agg"), NodeRef::command("cancel"))
            .unwrap();
        assert!(validate_graph(&graph).is_empty());
    }

    #[test]
    fn reports_every_violation_not_just_the_first() {
        let graph = OntologyGraph::from_parts_unchecked(
            [
                Node::context("order", "Order"),
                Node::context("payment", "Payment"),
                Node::aggregate("order-agg", "Order"),
                Node::aggregate("payment-agg", "Payment"),
                Node::command("cancel", "CancelOrder"),
                Node::policy("refund", "RefundOnOrderCancelled"),
                Node::policy("stray", "Stray"),
            ],
            [
                edge(EdgeKind::HasAggregate, NodeRef::context("order"), NodeRef::aggregate("order-agg")),
                edge(EdgeKind::HasCommand, NodeRef::aggregate("order-agg"), NodeRef::command("cancel")),
                edge(EdgeKind::HasPolicy, NodeRef::context("payment"), NodeRef::policy("refund")),
                // second owner
                edge(EdgeKind::HasPolicy, NodeRef::context("order"), NodeRef::policy("refund")),
                // cross-context invocation: refund resolves to payment (first owner)
                edge(EdgeKind::Invokes, NodeRef::policy("refund"), NodeRef::command("cancel")),
                // dangling
                edge(EdgeKind::Emits, NodeRef::command("cancel"), NodeRef::event("ghost")),
                // type mismatch
                edge(EdgeKind::Triggers, NodeRef::policy("stray"), NodeRef::policy("refund")),
            ],
        );

        let violations = validate_graph(&graph);
        let rules: Vec<Rule> = violations.iter().map(|v| v.rule).collect();
        assert_eq!(
            rules,
            vec![
                Rule::EdgeEndpoint,
                Rule::RelationTable,
                Rule::OrphanArtifact, // payment-agg
                Rule::SingleOwner,    // refund
                Rule::OrphanArtifact, // stray
                Rule::InvokesIntraContext,
            ]
        );
        assert_eq!(
            violations[2].subject,
            Subject::Node(NodeRef::aggregate("payment-agg"))
        );
    }

    #[test]
    fn orphaned_command_names_its_aggregate() {
        let graph = OntologyGraph::from_parts_unchecked(
            [Node::aggregate("agg", "Order"), Node::command("cancel", "CancelOrder")],
            [edge(EdgeKind::HasCommand, NodeRef::aggregate("agg"), NodeRef::command("cancel"))],
        );
        let violations = validate_graph(&graph);
        assert_eq!(violations.len(), 2);
        assert!(violations[1].message.contains("Aggregate:agg"));
    }

    #[test]
    fn owner_check_can_be_disabled() {
        let graph = OntologyGraph::from_parts_unchecked([Node::policy("p", "Loose")], []);
        let validator = InvariantValidator::with_context(ValidationContext::default());
        assert!(validator.validate(&graph).is_empty());
        assert_eq!(validate_graph(&graph).len(), 1);
    }

    #[test]
    fn validation_is_deterministic() {
        let graph = OntologyGraph::from_parts_unchecked(
            [Node::command("a", "A"), Node::command("b", "B"), Node::policy("p", "P")],
            [edge(EdgeKind::Invokes, NodeRef::policy("p"), NodeRef::command("a"))],
        );
        assert_eq!(validate_graph(&graph), validate_graph(&graph));
    }
}
