//! Impact engine
//!
//! Wires the snapshot store, traversal, decision table and strategy catalog.
//! Every call reads one snapshot taken at call start, so concurrent writers
//! never change a result mid-analysis.

use crate::config::EngineConfig;
use crate::error::Result;
use esia_impact::{analyze_impact, CancelToken, ImpactResult};
use esia_ontology::{NodeRef, SnapshotStore, Violation};
use esia_risk::{ChangeDescriptor, DecisionTable, RiskVerdict, Strategy, StrategyCatalog};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Reach of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeScope {
    /// Only the seed's home contexts are affected
    Local,
    /// Reactions reach other contexts
    CrossContext,
    /// Adds a command or policy that does not exist yet
    NewCapability,
}

impl ChangeScope {
    /// Scope of `change` given its impact
    #[must_use]
    pub fn of(change: &ChangeDescriptor, impact: &ImpactResult) -> Self {
        if change.kind.adds_capability() {
            ChangeScope::NewCapability
        } else if impact.crosses_contexts() {
            ChangeScope::CrossContext
        } else {
            ChangeScope::Local
        }
    }
}

impl fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeScope::Local => "local",
            ChangeScope::CrossContext => "cross-context",
            ChangeScope::NewCapability => "new-capability",
        })
    }
}

/// Full assessment of one proposed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAssessment {
    /// Snapshot generation the assessment was computed against
    pub generation: u64,
    /// Reach of the change
    pub scope: ChangeScope,
    /// Traversal result
    pub impact: ImpactResult,
    /// Classification
    pub verdict: RiskVerdict,
    /// Strategies, safest first
    pub strategies: Vec<Strategy>,
}

impl ChangeAssessment {
    /// Safest applicable strategy
    #[inline]
    #[must_use]
    pub fn safest(&self) -> Option<&Strategy> {
        self.strategies.first()
    }
}

/// Analysis facade over a shared snapshot store
#[derive(Debug)]
pub struct ImpactEngine {
    store: Arc<SnapshotStore>,
    config: EngineConfig,
    table: DecisionTable,
    catalog: StrategyCatalog,
}

impl ImpactEngine {
    /// Create engine with the standard table and strategies
    ///
    /// # Errors
    /// [`crate::EngineError::Config`] if the config is invalid.
    pub fn new(store: Arc<SnapshotStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            table: DecisionTable::standard(),
            catalog: StrategyCatalog::with_defaults(),
        })
    }

    /// Replace the decision table
    #[must_use]
    pub fn with_table(mut self, table: DecisionTable) -> Self {
        self.table = table;
        self
    }

    /// Replace the strategy catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: StrategyCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Shared store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Audit the current snapshot
    #[must_use]
    pub fn validate_graph(&self) -> Vec<Violation> {
        let snapshot = self.store.snapshot();
        let violations = esia_ontology::validate_graph(&snapshot);
        if !violations.is_empty() {
            tracing::warn!(
                "Generation {} has {} invariant violations",
                snapshot.generation(),
                violations.len()
            );
        }
        violations
    }

    /// Impact of a change to `seed` on the current snapshot
    ///
    /// # Errors
    /// [`crate::EngineError::Impact`] if the traversal fails.
    pub fn analyze(&self, seed: &NodeRef, cancel: CancelToken) -> Result<ImpactResult> {
        let snapshot = self.store.snapshot();
        let options = self.config.analysis.options(cancel);
        Ok(analyze_impact(seed, &snapshot, &options)?)
    }

    /// Classify `change` against an already computed impact
    ///
    /// # Errors
    /// [`crate::EngineError::Risk`] if no decision row covers the change.
    pub fn classify(&self, change: &ChangeDescriptor, impact: &ImpactResult) -> Result<RiskVerdict> {
        Ok(self.table.classify(change, impact, &self.config.risk)?)
    }

    /// Analyze, classify and recommend in one call
    ///
    /// # Errors
    /// [`crate::EngineError::Impact`] or [`crate::EngineError::Risk`].
    pub fn assess(&self, change: &ChangeDescriptor, cancel: CancelToken) -> Result<ChangeAssessment> {
        let snapshot = self.store.snapshot();
        let options = self.config.analysis.options(cancel);
        let impact = analyze_impact(&change.target, &snapshot, &options)?;
        let verdict = self.table.classify(change, &impact, &self.config.risk)?;
        let strategies = self.catalog.recommend(&verdict, &impact);
        let scope = ChangeScope::of(change, &impact);

        for finding in &impact.findings {
            tracing::warn!("{} finding while assessing {}", finding.name(), change.target);
        }
        tracing::info!(
            "Assessed {} {} on {}: {} ({}, {} affected contexts, generation {})",
            change.phase,
            change.kind,
            change.target,
            verdict.level,
            scope,
            verdict.affected_contexts,
            snapshot.generation()
        );

        Ok(ChangeAssessment {
            generation: snapshot.generation(),
            scope,
            impact,
            verdict,
            strategies,
        })
    }
}
