//! ESIA Ontology
//!
//! Typed Event Storming graph with invariant-preserving mutation.
//!
//! # Overview
//!
//! The ontology provides:
//! - **OntologyGraph**: seven node kinds, seven relation kinds, validated mutators
//! - **InvariantValidator**: full-graph audit returning every violation
//! - **SnapshotStore**: one writer, many readers over immutable snapshots
//! - **GraphStore**: read interface consumed by analysis
//!
//! # Example
//!
//! ```rust
//! use esia_ontology::{EdgeKind, GraphError, Node, NodeRef, OntologyGraph, Rule};
//!
//! let mut graph = OntologyGraph::new();
//! graph.add_node(Node::context("order", "Order")).unwrap();
//! graph.add_node(Node::context("payment", "Payment")).unwrap();
//! graph.add_node(Node::aggregate("order-agg", "Order")).unwrap();
//! graph.add_node(Node::command("cancel", "CancelOrder")).unwrap();
//! graph.add_node(Node::policy("refund", "RefundOnOrderCancelled")).unwrap();
//!
//! graph.add_edge(EdgeKind::HasAggregate, NodeRef::context("order"), NodeRef::aggregate("order-agg")).unwrap();
//! graph.add_edge(EdgeKind::HasCommand, NodeRef::aggregate("order-agg"), NodeRef::command("cancel")).unwrap();
//! graph.add_edge(EdgeKind::HasPolicy, NodeRef::context("payment"), NodeRef::policy("refund")).unwrap();
//!
//! // A Payment policy may not invoke an Order command
//! let err = graph
//!     .add_edge(EdgeKind::Invokes, NodeRef::policy("refund"), NodeRef::command("cancel"))
//!     .unwrap_err();
//! assert_eq!(err.rule(), Rule::InvokesIntraContext);
//! assert!(matches!(err, GraphError::OwnershipViolation { .. }));
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod store;
pub mod types;
pub mod validator;

// Re-exports
pub use error::{GraphError, Rule, Subject, Violation};
pub use graph::{owning_context, GraphStats, GraphStore, OntologyGraph};
pub use store::{Snapshot, SnapshotStore, UpsertBatch, UpsertReport};
pub use types::{
    AggregateAttrs, CommandAttrs, ContextAttrs, Edge, EdgeAttrs, EdgeId, EdgeKind, EventAttrs,
    Node, NodeAttrs, NodeKind, NodeRef, PolicyAttrs, RequirementAttrs, UserStoryAttrs,
};
pub use validator::{validate_graph, InvariantValidator, ValidationContext};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for graph operations
    pub use crate::{
        Edge, EdgeId, EdgeKind, GraphError, GraphStore, InvariantValidator, Node, NodeKind,
        NodeRef, OntologyGraph, Snapshot, SnapshotStore, Violation,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
