//! Engine errors

use esia_impact::ImpactError;
use esia_ontology::GraphError;
use esia_risk::RiskError;

/// Main engine error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Mutation rejected by the graph
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Impact analysis failed
    #[error("impact error: {0}")]
    Impact(#[from] ImpactError),

    /// Classification failed
    #[error("risk error: {0}")]
    Risk(#[from] RiskError),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {reason}")]
    Config {
        /// What is wrong
        reason: String,
    },
}

impl EngineError {
    /// Configuration error
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        EngineError::Config {
            reason: reason.into(),
        }
    }

    /// Name of the violated rule
    #[must_use]
    pub fn rule(&self) -> &'static str {
        match self {
            EngineError::Graph(err) => err.rule().name(),
            EngineError::Impact(err) => err.rule(),
            EngineError::Risk(err) => err.rule(),
            EngineError::Config { .. } => "config",
        }
    }

    /// Check if the analysis was cancelled or timed out
    #[inline]
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, EngineError::Impact(err) if err.is_interrupted())
    }
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
