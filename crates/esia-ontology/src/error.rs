//! Graph mutation errors and audit findings
//!
//! Every error and every [`Violation`] carries the offending node or edge
//! and the name of the violated [`Rule`].

use crate::types::{EdgeId, NodeRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named ontology rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    /// `(kind, id)` is unique
    UniqueId,
    /// Edge kind pair is in the relation table
    RelationTable,
    /// Edge endpoints exist
    EdgeEndpoint,
    /// At most one owner per Aggregate, Command and Policy
    SingleOwner,
    /// Aggregates, Commands and Policies resolve to an owning context
    OrphanArtifact,
    /// INVOKES stays inside one bounded context
    InvokesIntraContext,
}

impl Rule {
    /// Stable rule name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Rule::UniqueId => "unique-id",
            Rule::RelationTable => "relation-table",
            Rule::EdgeEndpoint => "edge-endpoint",
            Rule::SingleOwner => "single-owner",
            Rule::OrphanArtifact => "orphan-artifact",
            Rule::InvokesIntraContext => "invokes-intra-bc",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error raised by a rejected graph mutation
///
/// A failing mutation leaves the graph unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node with the same kind and id already exists
    #[error("duplicate id [{}]: {node} already exists", Rule::UniqueId)]
    DuplicateId {
        /// Existing node
        node: NodeRef,
    },

    /// Edge kind does not accept the endpoint kinds
    #[error("type mismatch [{}]: {} does not connect {} to {}", Rule::RelationTable, .edge.kind, .edge.from.kind, .edge.to.kind)]
    TypeMismatch {
        /// Rejected edge
        edge: EdgeId,
    },

    /// Mutation would break an ownership invariant
    #[error("ownership violation [{rule}] on {edge}: {message}")]
    OwnershipViolation {
        /// Violated rule
        rule: Rule,
        /// Edge that violates, or would violate, the rule
        edge: EdgeId,
        /// Diagnostic detail
        message: String,
    },

    /// Referenced node does not exist
    #[error("node not found [{}]: {node}", Rule::EdgeEndpoint)]
    NotFound {
        /// Missing node
        node: NodeRef,
    },

    /// Referenced edge does not exist
    #[error("edge not found [{}]: {edge}", Rule::EdgeEndpoint)]
    EdgeNotFound {
        /// Missing edge
        edge: EdgeId,
    },

    /// Edge endpoint missing from the graph
    #[error("dangling edge [{}]: {edge} references missing {missing}", Rule::EdgeEndpoint)]
    DanglingEdge {
        /// Offending edge
        edge: EdgeId,
        /// Endpoint that does not exist
        missing: NodeRef,
    },
}

impl GraphError {
    /// Rule violated by this error
    #[must_use]
    pub fn rule(&self) -> Rule {
        match self {
            GraphError::DuplicateId { .. } => Rule::UniqueId,
            GraphError::TypeMismatch { .. } => Rule::RelationTable,
            GraphError::OwnershipViolation { rule, .. } => *rule,
            GraphError::NotFound { .. }
            | GraphError::EdgeNotFound { .. }
            | GraphError::DanglingEdge { .. } => Rule::EdgeEndpoint,
        }
    }

    /// Structural errors are always fatal to the mutating call
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GraphError::DuplicateId { .. }
                | GraphError::TypeMismatch { .. }
                | GraphError::OwnershipViolation { .. }
        )
    }
}

/// Offending element of a violation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "ref", rename_all = "snake_case")]
pub enum Subject {
    /// Node subject
    Node(NodeRef),
    /// Edge subject
    Edge(EdgeId),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Node(node) => node.fmt(f),
            Subject::Edge(edge) => edge.fmt(f),
        }
    }
}

/// Invariant violation found by an audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Violated rule
    pub rule: Rule,
    /// Offending node or edge
    pub subject: Subject,
    /// Diagnostic detail
    pub message: String,
}

impl Violation {
    /// Violation on a node
    #[must_use]
    pub fn node(rule: Rule, node: NodeRef, message: impl Into<String>) -> Self {
        Self {
            rule,
            subject: Subject::Node(node),
            message: message.into(),
        }
    }

    /// Violation on an edge
    #[must_use]
    pub fn edge(rule: Rule, edge: EdgeId, message: impl Into<String>) -> Self {
        Self {
            rule,
            subject: Subject::Edge(edge),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.rule, self.subject, self.message)
    }
}

impl From<GraphError> for Violation {
    fn from(err: GraphError) -> Self {
        let rule = err.rule();
        let message = err.to_string();
        match err {
            GraphError::DuplicateId { node } | GraphError::NotFound { node } => {
                Violation::node(rule, node, message)
            }
            GraphError::TypeMismatch { edge }
            | GraphError::OwnershipViolation { edge, .. }
            | GraphError::EdgeNotFound { edge }
            | GraphError::DanglingEdge { edge, .. } => Violation::edge(rule, edge, message),
        }
    }
}
