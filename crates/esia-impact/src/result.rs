//! Impact result model
//!
//! Every list is ordered by bounded-context name ascending, then traversal
//! discovery order. Nodes without a resolvable context sort first.

use esia_ontology::{EdgeId, EdgeKind, NodeKind, NodeRef};
use serde::{Deserialize, Serialize};

/// Bounded context with its display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextRef {
    /// Context node id
    pub id: String,
    /// Context name
    pub name: String,
}

impl ContextRef {
    /// Node reference of this context
    #[must_use]
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::context(self.id.clone())
    }
}

/// Node reached by the traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedNode {
    /// Reached node
    pub node: NodeRef,
    /// Display label
    pub label: String,
    /// Minimum hop count from the seed
    pub depth: usize,
    /// Owning context, if resolvable
    ///
    /// An event takes the context of the command it was reached through;
    /// the seed event takes its first home context.
    pub context: Option<ContextRef>,
}

/// Policy reaction discovered under one context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Reacting policy
    pub policy: NodeRef,
    /// Policy name
    pub policy_name: String,
    /// Invoked command
    pub command: NodeRef,
    /// Command name
    pub command_name: String,
}

/// Invocations grouped under their policy's context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInvocations {
    /// Owning context of the policies, if resolvable
    pub context: Option<ContextRef>,
    /// Invocations in discovery order
    pub invocations: Vec<Invocation>,
}

/// One step of a propagation path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// Relation followed to reach `node`; `None` for the seed
    pub via: Option<EdgeKind>,
    /// Reached node
    pub node: NodeRef,
}

/// How a propagation path ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathEnd {
    /// Last node has no forward edge
    Leaf,
    /// Last node already occurs earlier on the same path
    FeedbackLoop,
    /// Last node was fully expanded by an earlier path
    Converged,
    /// Path reached the hop bound with edges left to follow
    DepthLimit,
}

/// Ordered hops from the seed to a terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationPath {
    /// Hops, starting with the seed
    pub hops: Vec<Hop>,
    /// Termination reason
    pub end: PathEnd,
    /// Path revisits one of its own nodes
    pub feedback_loop: bool,
}

impl PropagationPath {
    /// Final node of the path
    #[must_use]
    pub fn terminal(&self) -> Option<&NodeRef> {
        self.hops.last().map(|hop| &hop.node)
    }

    /// Number of edges followed
    #[must_use]
    pub fn len(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }

    /// Check if path is only the seed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Advisory condition attached to a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum Finding {
    /// A path revisits `node`
    FeedbackLoop {
        /// Repeated node
        node: NodeRef,
        /// Index into `paths` of the first path closing the loop
        path: usize,
    },
    /// Nodes at the hop bound had edges left to follow
    TraversalDepthExceeded {
        /// Configured bound
        max_depth: usize,
        /// Nodes whose expansion or path enumeration was cut
        frontier: Vec<NodeRef>,
    },
    /// Edge endpoint missing (permissive mode)
    IntegrityWarning {
        /// Offending edge
        edge: EdgeId,
        /// Missing endpoint
        missing: NodeRef,
    },
}

impl Finding {
    /// Stable name of the finding kind
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Finding::FeedbackLoop { .. } => "feedback-loop",
            Finding::TraversalDepthExceeded { .. } => "traversal-depth-exceeded",
            Finding::IntegrityWarning { .. } => "integrity-warning",
        }
    }
}

/// Traversal bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImpactMetadata {
    /// Configured hop bound
    pub max_depth: usize,
    /// Deepest minimum depth reached
    pub depth_reached: usize,
    /// The hop bound left out a reachable node or cut a path
    pub truncated: bool,
    /// Distinct nodes reached, seed included
    pub nodes_visited: usize,
    /// Edges examined
    pub edges_followed: usize,
    /// Cancellation checkpoints passed
    pub checkpoints: usize,
}

/// Closure of artifacts affected by a change to the seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactResult {
    /// Analysed seed
    pub seed: NodeRef,
    /// Seed display label
    pub seed_label: String,
    /// Contexts the seed belongs to
    ///
    /// Every context emitting a seed event, every context a seed story
    /// implements.
    pub home_contexts: Vec<ContextRef>,
    /// Reached contexts other than the home contexts
    pub affected_contexts: Vec<ContextRef>,
    /// Policy reactions grouped by context, home contexts included
    pub invocations: Vec<ContextInvocations>,
    /// Reached nodes, seed included
    pub nodes: Vec<AffectedNode>,
    /// Distinct propagation paths
    pub paths: Vec<PropagationPath>,
    /// Advisory findings
    pub findings: Vec<Finding>,
    /// Traversal bookkeeping
    pub metadata: ImpactMetadata,
}

impl ImpactResult {
    /// Names of the affected contexts
    #[must_use]
    pub fn affected_context_names(&self) -> Vec<&str> {
        self.affected_contexts
            .iter()
            .map(|context| context.name.as_str())
            .collect()
    }

    /// Whether any context beyond the home contexts is affected
    #[inline]
    #[must_use]
    pub fn crosses_contexts(&self) -> bool {
        !self.affected_contexts.is_empty()
    }

    /// Check if `node` was reached
    #[must_use]
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.nodes.iter().any(|affected| &affected.node == node)
    }

    /// Reached nodes of one kind
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &AffectedNode> {
        self.nodes.iter().filter(move |affected| affected.node.kind == kind)
    }

    /// Invocations under the context named `name`
    #[must_use]
    pub fn invocations_in(&self, name: &str) -> &[Invocation] {
        self.invocations
            .iter()
            .find(|group| group.context.as_ref().is_some_and(|c| c.name == name))
            .map_or(&[], |group| group.invocations.as_slice())
    }

    /// Feedback loop findings
    pub fn feedback_loops(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| matches!(finding, Finding::FeedbackLoop { .. }))
    }

    /// Whether the hop bound cut the analysis
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.metadata.truncated
    }
}
