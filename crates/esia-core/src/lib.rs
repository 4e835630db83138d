//! ESIA Core
//!
//! Event Storming impact analysis engine.
//!
//! # Overview
//!
//! - **ImpactEngine**: runs traversal, classification and recommendation
//!   against the current snapshot of a shared [`SnapshotStore`]
//! - **EngineConfig**: TOML configuration with environment overrides
//! - **telemetry**: tracing subscriber setup driven by `ESIA_LOG`
//!
//! # Example
//!
//! ```rust
//! use esia_core::prelude::*;
//! use std::sync::Arc;
//!
//! let mut graph = OntologyGraph::new();
//! graph.add_node(Node::context("order", "Order")).unwrap();
//! graph.add_node(Node::aggregate("order-agg", "Order")).unwrap();
//! graph.add_node(Node::command("cancel", "CancelOrder")).unwrap();
//! graph.add_node(Node::event("cancelled", "OrderCancelled")).unwrap();
//! graph.add_edge(EdgeKind::HasAggregate, NodeRef::context("order"), NodeRef::aggregate("order-agg")).unwrap();
//! graph.add_edge(EdgeKind::HasCommand, NodeRef::aggregate("order-agg"), NodeRef::command("cancel")).unwrap();
//! graph.add_edge(EdgeKind::Emits, NodeRef::command("cancel"), NodeRef::event("cancelled")).unwrap();
//!
//! let engine = ImpactEngine::new(Arc::new(SnapshotStore::new(graph)), EngineConfig::default()).unwrap();
//! let change = ChangeDescriptor::run_time(NodeRef::event("cancelled"), ChangeKind::EventFieldAdd);
//! let assessment = engine.assess(&change, CancelToken::new()).unwrap();
//!
//! assert_eq!(assessment.verdict.level, RiskLevel::Safe);
//! assert_eq!(assessment.scope, ChangeScope::Local);
//! assert_eq!(assessment.safest().unwrap().kind, StrategyKind::AppendField);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;

// Re-exports
pub use config::{AnalysisConfig, EngineConfig};
pub use engine::{ChangeAssessment, ChangeScope, ImpactEngine};
pub use error::{EngineError, Result};

pub use esia_impact::{self as impact, analyze_impact, CancelToken, ImpactResult};
pub use esia_ontology::{self as ontology, validate_graph, SnapshotStore};
pub use esia_risk::{self as risk, classify, recommend};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for impact assessment
    pub use crate::{
        AnalysisConfig, ChangeAssessment, ChangeScope, EngineConfig, EngineError, ImpactEngine,
    };
    pub use esia_impact::{AnalysisOptions, CancelToken, ImpactResult};
    pub use esia_ontology::{EdgeKind, Node, NodeRef, OntologyGraph, SnapshotStore};
    pub use esia_risk::{ChangeDescriptor, ChangeKind, ExecutionPhase, RiskLevel, StrategyKind};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
