//! Testing utilities for ESIA workspace
//!
//! Shared graph fixtures: the order-cancellation domain sample, feedback
//! loops, and recipe-driven random graphs for property tests.

#![allow(missing_docs)]

use esia_ontology::{EdgeKind, Node, NodeRef, OntologyGraph, SnapshotStore};

/// Context names of the order-cancellation sample, in insertion order
pub const ORDER_CONTEXTS: [&str; 4] = ["Order", "Payment", "Inventory", "Notification"];

fn link(graph: &mut OntologyGraph, kind: EdgeKind, from: NodeRef, to: NodeRef) {
    graph.add_edge(kind, from, to).unwrap();
}

/// Adds a context with one aggregate that owns `commands`; each command
/// emits the paired event when one is given.
pub fn add_context(
    graph: &mut OntologyGraph,
    id: &str,
    name: &str,
    commands: &[(&str, &str, Option<(&str, &str)>)],
) {
    let aggregate = format!("{id}-agg");
    graph.add_node(Node::context(id, name)).unwrap();
    graph.add_node(Node::aggregate(&aggregate, name)).unwrap();
    link(graph, EdgeKind::HasAggregate, NodeRef::context(id), NodeRef::aggregate(&aggregate));

    for (command_id, command_name, emits) in commands {
        graph.add_node(Node::command(*command_id, *command_name)).unwrap();
        link(
            graph,
            EdgeKind::HasCommand,
            NodeRef::aggregate(&aggregate),
            NodeRef::command(*command_id),
        );
        if let Some((event_id, event_name)) = emits {
            graph.add_node(Node::event(*event_id, *event_name)).unwrap();
            link(graph, EdgeKind::Emits, NodeRef::command(*command_id), NodeRef::event(*event_id));
        }
    }
}

/// Adds a policy owned by `context`, triggered by `event`, invoking `command`.
pub fn add_reaction(
    graph: &mut OntologyGraph,
    context: &str,
    policy: (&str, &str),
    event: &str,
    command: &str,
) {
    graph.add_node(Node::policy(policy.0, policy.1)).unwrap();
    link(graph, EdgeKind::HasPolicy, NodeRef::context(context), NodeRef::policy(policy.0));
    link(graph, EdgeKind::Triggers, NodeRef::event(event), NodeRef::policy(policy.0));
    link(graph, EdgeKind::Invokes, NodeRef::policy(policy.0), NodeRef::command(command));
}

/// Order cancellation sample
///
/// `OrderCancelled` (Order) fans out to Payment, Inventory and Notification:
/// RefundOnOrderCancelled/ProcessRefund, RestoreStockOnOrderCancelled/RestoreStock,
/// NotifyOnOrderCancelled/SendEmail. User story `cancel-order` implements Order.
pub fn order_cancellation() -> OntologyGraph {
    let mut graph = OntologyGraph::new();
    add_context(
        &mut graph,
        "order",
        "Order",
        &[
            ("place-order", "PlaceOrder", Some(("order-placed", "OrderPlaced"))),
            ("cancel-order", "CancelOrder", Some(("order-cancelled", "OrderCancelled"))),
        ],
    );
    add_context(
        &mut graph,
        "payment",
        "Payment",
        &[("process-refund", "ProcessRefund", Some(("refund-processed", "RefundProcessed")))],
    );
    add_context(
        &mut graph,
        "inventory",
        "Inventory",
        &[("restore-stock", "RestoreStock", Some(("stock-restored", "StockRestored")))],
    );
    add_context(
        &mut graph,
        "notification",
        "Notification",
        &[("send-email", "SendEmail", None)],
    );

    add_reaction(
        &mut graph,
        "payment",
        ("refund-on-cancel", "RefundOnOrderCancelled"),
        "order-cancelled",
        "process-refund",
    );
    add_reaction(
        &mut graph,
        "inventory",
        ("restock-on-cancel", "RestoreStockOnOrderCancelled"),
        "order-cancelled",
        "restore-stock",
    );
    add_reaction(
        &mut graph,
        "notification",
        ("notify-on-cancel", "NotifyOnOrderCancelled"),
        "order-cancelled",
        "send-email",
    );

    graph
        .add_node(Node::user_story("cancel-order", "customer", "cancel my order"))
        .unwrap();
    link(
        &mut graph,
        EdgeKind::Implements,
        NodeRef::user_story("cancel-order"),
        NodeRef::context("order"),
    );
    graph
}

/// Seed of the order cancellation sample
pub fn order_cancelled() -> NodeRef {
    NodeRef::event("order-cancelled")
}

/// Order cancellation sample behind a snapshot store
pub fn order_cancellation_store() -> SnapshotStore {
    SnapshotStore::new(order_cancellation())
}

/// Single-context loop: `JobFailed` triggers `RetryOnFailure`, which invokes
/// `RetryJob`, which emits `JobFailed` again.
pub fn retry_loop() -> OntologyGraph {
    let mut graph = OntologyGraph::new();
    add_context(
        &mut graph,
        "jobs",
        "Jobs",
        &[("retry-job", "RetryJob", Some(("job-failed", "JobFailed")))],
    );
    add_reaction(&mut graph, "jobs", ("retry-on-failure", "RetryOnFailure"), "job-failed", "retry-job");
    graph
}

/// Two-context loop: `OrderCancelled` (Order) triggers a Payment refund whose
/// `RefundProcessed` event triggers an Order reissue that cancels again.
pub fn cross_context_loop() -> OntologyGraph {
    let mut graph = order_cancellation();
    add_reaction(
        &mut graph,
        "order",
        ("cancel-on-refund", "CancelOnRefund"),
        "refund-processed",
        "cancel-order",
    );
    graph
}

/// Event emitted from two contexts
///
/// Shipping's `Ship` emits `shared` first, Payment's `Refund` emits it too.
/// Order's `Place` emits `seed`, which triggers the Payment policy
/// `RefundOnSeed` invoking `Refund`. Nothing reaches Shipping from `seed`.
pub fn shared_event() -> OntologyGraph {
    let mut graph = OntologyGraph::new();
    add_context(&mut graph, "shipping", "Shipping", &[("ship", "Ship", Some(("shared", "Shared")))]);
    add_context(&mut graph, "payment", "Payment", &[("refund", "Refund", None)]);
    link(&mut graph, EdgeKind::Emits, NodeRef::command("refund"), NodeRef::event("shared"));
    add_context(&mut graph, "order", "Order", &[("place", "Place", Some(("seed", "Seed")))]);
    add_reaction(&mut graph, "payment", ("refund-on-seed", "RefundOnSeed"), "seed", "refund");
    graph
}

/// Random graph description for property tests
///
/// Indices are taken modulo the corresponding count. Commands, policies and
/// aggregates are assigned to contexts round-robin; INVOKES pairs that would
/// cross contexts are skipped.
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    pub contexts: usize,
    pub commands: usize,
    pub events: usize,
    pub policies: usize,
    pub emits: Vec<(usize, usize)>,
    pub triggers: Vec<(usize, usize)>,
    pub invokes: Vec<(usize, usize)>,
    pub implements: Vec<usize>,
}

impl Recipe {
    pub fn command(i: usize) -> NodeRef {
        NodeRef::command(format!("cmd{i}"))
    }

    pub fn event(i: usize) -> NodeRef {
        NodeRef::event(format!("evt{i}"))
    }

    pub fn policy(i: usize) -> NodeRef {
        NodeRef::policy(format!("pol{i}"))
    }

    pub fn story() -> NodeRef {
        NodeRef::user_story("story")
    }

    pub fn build(&self) -> OntologyGraph {
        let contexts = self.contexts.max(1);
        let mut graph = OntologyGraph::new();

        for c in 0..contexts {
            graph.add_node(Node::context(format!("bc{c}"), format!("Context{c}"))).unwrap();
            graph.add_node(Node::aggregate(format!("agg{c}"), format!("Agg{c}"))).unwrap();
            link(
                &mut graph,
                EdgeKind::HasAggregate,
                NodeRef::context(format!("bc{c}")),
                NodeRef::aggregate(format!("agg{c}")),
            );
        }
        for i in 0..self.commands {
            graph.add_node(Node::command(format!("cmd{i}"), format!("Cmd{i}"))).unwrap();
            link(
                &mut graph,
                EdgeKind::HasCommand,
                NodeRef::aggregate(format!("agg{}", i % contexts)),
                Self::command(i),
            );
        }
        for i in 0..self.events {
            graph.add_node(Node::event(format!("evt{i}"), format!("Evt{i}"))).unwrap();
        }
        for i in 0..self.policies {
            graph.add_node(Node::policy(format!("pol{i}"), format!("Pol{i}"))).unwrap();
            link(
                &mut graph,
                EdgeKind::HasPolicy,
                NodeRef::context(format!("bc{}", i % contexts)),
                Self::policy(i),
            );
        }

        if self.commands > 0 && self.events > 0 {
            for (c, e) in &self.emits {
                link(
                    &mut graph,
                    EdgeKind::Emits,
                    Self::command(c % self.commands),
                    Self::event(e % self.events),
                );
            }
        }
        if self.events > 0 && self.policies > 0 {
            for (e, p) in &self.triggers {
                link(
                    &mut graph,
                    EdgeKind::Triggers,
                    Self::event(e % self.events),
                    Self::policy(p % self.policies),
                );
            }
        }
        if self.policies > 0 && self.commands > 0 {
            for (p, c) in &self.invokes {
                let (p, c) = (p % self.policies, c % self.commands);
                if p % contexts == c % contexts {
                    link(&mut graph, EdgeKind::Invokes, Self::policy(p), Self::command(c));
                }
            }
        }

        graph.add_node(Node::user_story("story", "tester", "exercise the graph")).unwrap();
        for c in &self.implements {
            link(
                &mut graph,
                EdgeKind::Implements,
                Self::story(),
                NodeRef::context(format!("bc{}", c % contexts)),
            );
        }
        graph
    }
}
