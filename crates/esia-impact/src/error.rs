//! Errors fatal to an analysis call
//!
//! Advisory conditions (feedback loops, depth bound, permissive integrity
//! warnings) are findings inside the result, not errors.

use esia_ontology::{EdgeId, NodeRef};

/// Analysis failure; partial work is discarded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImpactError {
    /// Seed does not exist in the snapshot
    #[error("seed not found [seed-exists]: {node}")]
    NotFound {
        /// Missing seed
        node: NodeRef,
    },

    /// Seed is neither a UserStory nor an Event
    #[error("unsupported seed kind [seed-kind]: {node} is a {}, expected UserStory or Event", .node.kind)]
    UnsupportedSeedKind {
        /// Rejected seed
        node: NodeRef,
    },

    /// Edge endpoint missing in strict mode
    #[error("dangling edge [edge-endpoint]: {edge} references missing {missing}")]
    DanglingEdge {
        /// Offending edge
        edge: EdgeId,
        /// Missing endpoint
        missing: NodeRef,
    },

    /// Caller cancelled the analysis
    #[error("analysis of {seed} cancelled after {checkpoints} hop expansions")]
    Cancelled {
        /// Seed of the cancelled analysis
        seed: NodeRef,
        /// Checkpoints passed before cancellation was observed
        checkpoints: usize,
    },

    /// Deadline passed before the analysis finished
    #[error("analysis of {seed} timed out after {elapsed_ms}ms")]
    Timeout {
        /// Seed of the timed-out analysis
        seed: NodeRef,
        /// Time spent before the deadline was observed
        elapsed_ms: u64,
    },
}

impl ImpactError {
    /// Name of the violated rule
    #[must_use]
    pub const fn rule(&self) -> &'static str {
        match self {
            ImpactError::NotFound { .. } => "seed-exists",
            ImpactError::UnsupportedSeedKind { .. } => "seed-kind",
            ImpactError::DanglingEdge { .. } => "edge-endpoint",
            ImpactError::Cancelled { .. } => "cancellation",
            ImpactError::Timeout { .. } => "deadline",
        }
    }

    /// Whether retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ImpactError::Cancelled { .. } | ImpactError::Timeout { .. }
        )
    }
}
