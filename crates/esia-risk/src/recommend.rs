//! Remediation strategies
//!
//! A [`StrategyCatalog`] holds candidate strategies. [`StrategyCatalog::recommend`]
//! keeps the candidates applicable to a verdict and orders them safest first;
//! ties keep registration order.

use crate::table::{RiskLevel, RiskVerdict};
use esia_impact::ImpactResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk left after applying a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualRisk {
    /// Nothing to coordinate
    Safe,
    /// Needs a migration plan
    Risky,
    /// Highest residual risk of all strategies
    Highest,
}

impl fmt::Display for ResidualRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResidualRisk::Safe => "Safe",
            ResidualRisk::Risky => "Risky",
            ResidualRisk::Highest => "Highest",
        })
    }
}

/// Built-in strategy kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Add an optional field instead of changing existing ones
    AppendField,
    /// Publish a new version and migrate consumers in phases
    VersionedMigration,
    /// Change every affected context in one coordinated release
    CoordinatedChange,
}

/// Recommended strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy kind
    pub kind: StrategyKind,
    /// Display name
    pub name: String,
    /// Risk left after applying it
    pub residual_risk: ResidualRisk,
    /// What to do, naming the seed and affected contexts
    pub description: String,
}

/// Candidate remediation strategy
pub trait RemediationStrategy: Send + Sync + fmt::Debug {
    /// Strategy kind
    fn kind(&self) -> StrategyKind;

    /// Display name
    fn name(&self) -> &'static str;

    /// Risk left after applying it
    fn residual_risk(&self) -> ResidualRisk;

    /// Whether the strategy addresses this verdict
    fn applies(&self, verdict: &RiskVerdict, impact: &ImpactResult) -> bool;

    /// Description for this verdict and impact
    fn describe(&self, verdict: &RiskVerdict, impact: &ImpactResult) -> String;
}

fn context_list(impact: &ImpactResult) -> String {
    if impact.affected_contexts.is_empty() {
        "no other context".to_string()
    } else {
        impact.affected_context_names().join(", ")
    }
}

/// Keep existing fields untouched and add a new optional one
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendField;

impl RemediationStrategy for AppendField {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AppendField
    }

    fn name(&self) -> &'static str {
        "Append field"
    }

    fn residual_risk(&self) -> ResidualRisk {
        ResidualRisk::Safe
    }

    fn applies(&self, verdict: &RiskVerdict, _impact: &ImpactResult) -> bool {
        verdict.change.kind.permits_additive_evolution()
    }

    fn describe(&self, _verdict: &RiskVerdict, impact: &ImpactResult) -> String {
        format!(
            "Add the new data to {} as an optional field and leave existing fields unchanged; \
             consumers in {} keep reading the current shape",
            impact.seed_label,
            context_list(impact)
        )
    }
}

/// Publish a new version next to the old one and migrate in phases
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedMigration;

impl RemediationStrategy for VersionedMigration {
    fn kind(&self) -> StrategyKind {
        StrategyKind::VersionedMigration
    }

    fn name(&self) -> &'static str {
        "Versioned artifact + phased migration"
    }

    fn residual_risk(&self) -> ResidualRisk {
        ResidualRisk::Risky
    }

    fn applies(&self, _verdict: &RiskVerdict, _impact: &ImpactResult) -> bool {
        true
    }

    fn describe(&self, verdict: &RiskVerdict, impact: &ImpactResult) -> String {
        format!(
            "Publish a new version of {} carrying the {} change, run both versions side by side, \
             migrate {} one context at a time, then retire the old version",
            impact.seed_label,
            verdict.change.kind,
            context_list(impact)
        )
    }
}

/// Change every affected context in one release
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatedChange;

impl RemediationStrategy for CoordinatedChange {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CoordinatedChange
    }

    fn name(&self) -> &'static str {
        "Coordinated multi-BC change"
    }

    fn residual_risk(&self) -> ResidualRisk {
        ResidualRisk::Highest
    }

    fn applies(&self, verdict: &RiskVerdict, _impact: &ImpactResult) -> bool {
        verdict.level >= RiskLevel::Risky
    }

    fn describe(&self, verdict: &RiskVerdict, impact: &ImpactResult) -> String {
        let pairs: Vec<String> = impact
            .invocations
            .iter()
            .flat_map(|group| group.invocations.iter())
            .map(|inv| format!("{}/{}", inv.policy_name, inv.command_name))
            .collect();
        let reactions = if pairs.is_empty() {
            String::new()
        } else {
            format!(" ({})", pairs.join(", "))
        };
        format!(
            "Apply the {} change to {} together with {}{} in a single coordinated release; \
             highest residual risk",
            verdict.change.kind,
            impact.seed_label,
            context_list(impact),
            reactions
        )
    }
}

/// Registry of candidate strategies
#[derive(Debug, Default)]
pub struct StrategyCatalog {
    strategies: Vec<Box<dyn RemediationStrategy>>,
}

impl StrategyCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Catalog with the built-in strategies
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register(AppendField);
        catalog.register(VersionedMigration);
        catalog.register(CoordinatedChange);
        catalog
    }

    /// Register a strategy
    pub fn register(&mut self, strategy: impl RemediationStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    /// Check if a strategy kind is registered
    #[must_use]
    pub fn contains(&self, kind: StrategyKind) -> bool {
        self.strategies.iter().any(|s| s.kind() == kind)
    }

    /// Number of registered strategies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Applicable strategies, safest first
    #[must_use]
    pub fn recommend(&self, verdict: &RiskVerdict, impact: &ImpactResult) -> Vec<Strategy> {
        let mut strategies: Vec<Strategy> = self
            .strategies
            .iter()
            .filter(|candidate| candidate.applies(verdict, impact))
            .map(|candidate| Strategy {
                kind: candidate.kind(),
                name: candidate.name().to_string(),
                residual_risk: candidate.residual_risk(),
                description: candidate.describe(verdict, impact),
            })
            .collect();
        strategies.sort_by_key(|strategy| strategy.residual_risk);
        strategies
    }
}

/// Recommend with the built-in strategies
#[must_use]
pub fn recommend(verdict: &RiskVerdict, impact: &ImpactResult) -> Vec<Strategy> {
    StrategyCatalog::with_defaults().recommend(verdict, impact)
}
