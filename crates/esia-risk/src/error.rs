//! Classification errors

use crate::change::ExecutionPhase;

/// Classification failure; there is no implicit default verdict
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskError {
    /// Kind name is unknown, or no decision row covers it
    #[error("unsupported change kind [decision-table]: '{kind}' {reason}")]
    UnsupportedChangeKind {
        /// Offending kind name
        kind: String,
        /// Why it is unsupported
        reason: String,
    },

    /// Phase name is unknown
    #[error("unsupported execution phase [decision-table]: '{phase}'")]
    UnsupportedPhase {
        /// Offending phase name
        phase: String,
    },
}

impl RiskError {
    /// Unknown kind name
    #[must_use]
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        RiskError::UnsupportedChangeKind {
            kind: kind.into(),
            reason: "is not a known change kind".to_string(),
        }
    }

    /// Known kind without a matching decision row
    #[must_use]
    pub fn uncovered(kind: impl Into<String>, phase: ExecutionPhase) -> Self {
        RiskError::UnsupportedChangeKind {
            kind: kind.into(),
            reason: format!("has no decision rule for phase {phase}"),
        }
    }

    /// Name of the violated rule
    #[inline]
    #[must_use]
    pub const fn rule(&self) -> &'static str {
        "decision-table"
    }
}
