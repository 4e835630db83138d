//! ESIA Impact Traversal
//!
//! Computes what changes because a UserStory or Event changed.
//!
//! # Overview
//!
//! [`analyze_impact`] walks the forward relations of an immutable
//! [`GraphStore`](esia_ontology::GraphStore) snapshot:
//!
//! - UserStory seed: IMPLEMENTS, HAS_AGGREGATE, HAS_COMMAND, EMITS, TRIGGERS, INVOKES
//! - Event seed: TRIGGERS, INVOKES, EMITS
//!
//! It terminates on cycles, records feedback loops as findings, and returns
//! an [`ImpactResult`] with a deterministic ordering.
//!
//! # Example
//!
//! ```rust
//! use esia_impact::{analyze_impact, AnalysisOptions};
//! use esia_ontology::{EdgeKind, Node, NodeRef, OntologyGraph};
//!
//! let mut graph = OntologyGraph::new();
//! graph.add_node(Node::context("order", "Order")).unwrap();
//! graph.add_node(Node::aggregate("agg", "Order")).unwrap();
//! graph.add_node(Node::command("cancel", "CancelOrder")).unwrap();
//! graph.add_node(Node::event("cancelled", "OrderCancelled")).unwrap();
//! graph.add_edge(EdgeKind::HasAggregate, NodeRef::context("order"), NodeRef::aggregate("agg")).unwrap();
//! graph.add_edge(EdgeKind::HasCommand, NodeRef::aggregate("agg"), NodeRef::command("cancel")).unwrap();
//! graph.add_edge(EdgeKind::Emits, NodeRef::command("cancel"), NodeRef::event("cancelled")).unwrap();
//!
//! let result = analyze_impact(&NodeRef::event("cancelled"), &graph, &AnalysisOptions::new()).unwrap();
//! assert_eq!(result.home_contexts[0].name, "Order");
//! assert!(result.affected_contexts.is_empty());
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod options;
pub mod result;
pub mod traversal;

// Re-exports
pub use error::ImpactError;
pub use options::{AnalysisOptions, CancelToken, IntegrityMode, DEFAULT_MAX_DEPTH};
pub use result::{
    AffectedNode, ContextInvocations, ContextRef, Finding, Hop, ImpactMetadata, ImpactResult,
    Invocation, PathEnd, PropagationPath,
};
pub use traversal::{analyze_impact, forward_relation, PropagationProfile};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for impact analysis
    pub use crate::{
        analyze_impact, AnalysisOptions, CancelToken, Finding, ImpactError, ImpactResult,
        IntegrityMode, PathEnd,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
