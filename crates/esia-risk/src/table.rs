//! Change risk decision table
//!
//! Rows are evaluated in priority order; the first row matching the change's
//! kind and phase gives the base level. The blast-radius escalation is
//! applied afterwards and can only raise the level.

use crate::change::{ChangeDescriptor, ChangeKind, ExecutionPhase};
use crate::error::RiskError;
use esia_impact::ImpactResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk classification, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No coordination needed
    Safe,
    /// Requires confirmation
    Risky,
    /// Must not be applied as proposed
    Forbidden,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Safe => "Safe",
            RiskLevel::Risky => "Risky",
            RiskLevel::Forbidden => "Forbidden",
        })
    }
}

/// Number of a decision rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u16);

impl RuleId {
    /// Build-time changes are unconstrained
    pub const BUILD_TIME: RuleId = RuleId(1);
    /// Run-time breaking schema change
    pub const BREAKING_SCHEMA: RuleId = RuleId(2);
    /// Run-time additive field
    pub const ADDITIVE_FIELD: RuleId = RuleId(3);
    /// Run-time command addition
    pub const COMMAND_ADD: RuleId = RuleId(4);
    /// Run-time policy logic change
    pub const POLICY_LOGIC: RuleId = RuleId(5);
    /// Broad blast radius escalation
    pub const BROAD_BLAST_RADIUS: RuleId = RuleId(6);
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {}", self.0)
    }
}

/// One row of the decision table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRule {
    /// Rule number, cited in rationales
    pub id: RuleId,
    /// Short description, cited in rationales
    pub label: String,
    /// Phase matched; `None` matches any phase
    pub phase: Option<ExecutionPhase>,
    /// Kinds matched; empty matches any kind
    pub kinds: Vec<ChangeKind>,
    /// Resulting level
    pub level: RiskLevel,
}

impl DecisionRule {
    /// Create row
    #[must_use]
    pub fn new(
        id: RuleId,
        label: impl Into<String>,
        phase: Option<ExecutionPhase>,
        kinds: &[ChangeKind],
        level: RiskLevel,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            phase,
            kinds: kinds.to_vec(),
            level,
        }
    }

    /// Whether this row covers the change
    #[must_use]
    pub fn matches(&self, change: &ChangeDescriptor) -> bool {
        self.phase.map_or(true, |phase| phase == change.phase)
            && (self.kinds.is_empty() || self.kinds.contains(&change.kind))
    }
}

/// Escalation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Affected-context count at which Safe escalates to Risky
    pub broad_blast_radius: usize,
    /// Apply the escalation to build-time verdicts too
    pub escalate_build_time: bool,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            broad_blast_radius: 2,
            escalate_build_time: true,
        }
    }
}

impl RiskThresholds {
    /// Set blast radius threshold
    #[inline]
    #[must_use]
    pub fn with_broad_blast_radius(mut self, contexts: usize) -> Self {
        self.broad_blast_radius = contexts;
        self
    }

    /// Enable or disable escalation of build-time verdicts
    #[inline]
    #[must_use]
    pub fn with_escalate_build_time(mut self, escalate: bool) -> Self {
        self.escalate_build_time = escalate;
        self
    }
}

/// Classification outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// Final level
    pub level: RiskLevel,
    /// Level before escalation
    pub base_level: RiskLevel,
    /// Rules that fired, in evaluation order
    pub fired_rules: Vec<RuleId>,
    /// Human-readable account naming every fired rule
    pub rationale: String,
    /// Classified change
    pub change: ChangeDescriptor,
    /// Affected contexts counted for escalation
    pub affected_contexts: usize,
}

impl RiskVerdict {
    /// Whether `rule` fired
    #[must_use]
    pub fn fired(&self, rule: RuleId) -> bool {
        self.fired_rules.contains(&rule)
    }

    /// Whether escalation raised the level
    #[must_use]
    pub fn escalated(&self) -> bool {
        self.level > self.base_level
    }
}

/// Ordered decision table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTable {
    rules: Vec<DecisionRule>,
}

impl Default for DecisionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl DecisionTable {
    /// Empty table; every change is unsupported until rows are added
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Standard rules 1 to 5
    #[must_use]
    pub fn standard() -> Self {
        use ChangeKind::{CommandAdd, EventFieldAdd, EventFieldDelete, EventFieldTypeChange, EventRename, PolicyLogicChange};
        use ExecutionPhase::{BuildTime, RunTime};

        Self::empty()
            .with_rule(DecisionRule::new(
                RuleId::BUILD_TIME,
                "build-time change is unconstrained",
                Some(BuildTime),
                &[],
                RiskLevel::Safe,
            ))
            .with_rule(DecisionRule::new(
                RuleId::BREAKING_SCHEMA,
                "run-time change breaks persisted events",
                Some(RunTime),
                &[EventRename, EventFieldDelete, EventFieldTypeChange],
                RiskLevel::Forbidden,
            ))
            .with_rule(DecisionRule::new(
                RuleId::ADDITIVE_FIELD,
                "run-time additive field is backward compatible",
                Some(RunTime),
                &[EventFieldAdd],
                RiskLevel::Safe,
            ))
            .with_rule(DecisionRule::new(
                RuleId::COMMAND_ADD,
                "run-time command addition requires confirmation",
                Some(RunTime),
                &[CommandAdd],
                RiskLevel::Risky,
            ))
            .with_rule(DecisionRule::new(
                RuleId::POLICY_LOGIC,
                "run-time policy logic change alters reactions",
                Some(RunTime),
                &[PolicyLogicChange],
                RiskLevel::Risky,
            ))
    }

    /// Append a row; earlier rows keep priority
    #[must_use]
    pub fn with_rule(mut self, rule: DecisionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rows in priority order
    #[must_use]
    pub fn rules(&self) -> &[DecisionRule] {
        &self.rules
    }

    /// First row covering the change
    #[must_use]
    pub fn lookup(&self, change: &ChangeDescriptor) -> Option<&DecisionRule> {
        self.rules.iter().find(|rule| rule.matches(change))
    }

    /// Classify a change against its impact
    ///
    /// # Errors
    /// [`RiskError::UnsupportedChangeKind`] if no row covers the change.
    pub fn classify(
        &self,
        change: &ChangeDescriptor,
        impact: &ImpactResult,
        thresholds: &RiskThresholds,
    ) -> Result<RiskVerdict, RiskError> {
        let rule = self
            .lookup(change)
            .ok_or_else(|| RiskError::uncovered(change.kind.as_str(), change.phase))?;

        let affected = impact.affected_contexts.len();
        let base_level = rule.level;
        let mut level = base_level;
        let mut fired_rules = vec![rule.id];
        let mut rationale = format!("{} ({}) -> {}", rule.id, rule.label, base_level);

        let exempt = change.phase == ExecutionPhase::BuildTime && !thresholds.escalate_build_time;
        if base_level != RiskLevel::Forbidden
            && !exempt
            && affected >= thresholds.broad_blast_radius
        {
            level = level.max(RiskLevel::Risky);
            fired_rules.push(RuleId::BROAD_BLAST_RADIUS);
            let outcome = if level > base_level {
                format!("escalated {base_level} -> {level}")
            } else {
                format!("kept {level}")
            };
            rationale.push_str(&format!(
                "; {} (broad blast radius: {} affected contexts >= {}) {}",
                RuleId::BROAD_BLAST_RADIUS,
                affected,
                thresholds.broad_blast_radius,
                outcome
            ));
        }

        tracing::debug!(
            "Classified {} {} on {}: {}",
            change.phase,
            change.kind,
            change.target,
            level
        );

        Ok(RiskVerdict {
            level,
            base_level,
            fired_rules,
            rationale,
            change: change.clone(),
            affected_contexts: affected,
        })
    }
}

/// Classify with the standard table
///
/// # Errors
/// [`RiskError::UnsupportedChangeKind`] if no standard row covers the change.
pub fn classify(
    change: &ChangeDescriptor,
    impact: &ImpactResult,
    thresholds: &RiskThresholds,
) -> Result<RiskVerdict, RiskError> {
    DecisionTable::standard().classify(change, impact, thresholds)
}
