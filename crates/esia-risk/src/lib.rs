//! ESIA Risk
//!
//! Change risk classification and remediation strategies.
//!
//! # Overview
//!
//! - **DecisionTable**: ordered rows over (change kind, execution phase),
//!   first match wins, followed by blast-radius escalation
//! - **StrategyCatalog**: candidate strategies filtered to a verdict and
//!   ordered safest first
//!
//! Both are pure: the same inputs always give the same output.

#![warn(missing_docs)]

pub mod change;
pub mod error;
pub mod recommend;
pub mod table;

// Re-exports
pub use change::{ChangeDescriptor, ChangeKind, ExecutionPhase};
pub use error::RiskError;
pub use recommend::{
    recommend, AppendField, CoordinatedChange, RemediationStrategy, ResidualRisk, Strategy,
    StrategyCatalog, StrategyKind, VersionedMigration,
};
pub use table::{classify, DecisionRule, DecisionTable, RiskLevel, RiskThresholds, RiskVerdict, RuleId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for risk classification
    pub use crate::{
        classify, recommend, ChangeDescriptor, ChangeKind, ExecutionPhase, RiskLevel,
        RiskThresholds, RiskVerdict, Strategy, StrategyKind,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
