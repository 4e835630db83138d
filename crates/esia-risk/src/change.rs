//! Change descriptors

use crate::error::RiskError;
use esia_ontology::NodeRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of proposed change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChangeKind {
    /// Rename an event
    EventRename,
    /// Add a field to an event payload
    EventFieldAdd,
    /// Delete a field from an event payload
    EventFieldDelete,
    /// Change the type of an event field
    EventFieldTypeChange,
    /// Add a command
    CommandAdd,
    /// Remove a command
    CommandRemove,
    /// Add a policy
    PolicyAdd,
    /// Change a policy's reaction logic
    PolicyLogicChange,
    /// Remove a policy
    PolicyRemove,
}

impl ChangeKind {
    /// All change kinds in declaration order
    pub const ALL: [ChangeKind; 9] = [
        ChangeKind::EventRename,
        ChangeKind::EventFieldAdd,
        ChangeKind::EventFieldDelete,
        ChangeKind::EventFieldTypeChange,
        ChangeKind::CommandAdd,
        ChangeKind::CommandRemove,
        ChangeKind::PolicyAdd,
        ChangeKind::PolicyLogicChange,
        ChangeKind::PolicyRemove,
    ];

    /// Canonical name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ChangeKind::EventRename => "EventRename",
            ChangeKind::EventFieldAdd => "EventFieldAdd",
            ChangeKind::EventFieldDelete => "EventFieldDelete",
            ChangeKind::EventFieldTypeChange => "EventFieldTypeChange",
            ChangeKind::CommandAdd => "CommandAdd",
            ChangeKind::CommandRemove => "CommandRemove",
            ChangeKind::PolicyAdd => "PolicyAdd",
            ChangeKind::PolicyLogicChange => "PolicyLogicChange",
            ChangeKind::PolicyRemove => "PolicyRemove",
        }
    }

    /// Whether the same intent can be met by adding to the schema
    #[inline]
    #[must_use]
    pub const fn permits_additive_evolution(self) -> bool {
        matches!(
            self,
            ChangeKind::EventFieldAdd | ChangeKind::EventFieldTypeChange
        )
    }

    /// Whether the change introduces a capability that does not exist yet
    #[inline]
    #[must_use]
    pub const fn adds_capability(self) -> bool {
        matches!(self, ChangeKind::CommandAdd | ChangeKind::PolicyAdd)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase with separators removed: `event_field_add` == `EventFieldAdd`
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for ChangeKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        ChangeKind::ALL
            .into_iter()
            .find(|kind| normalize(kind.as_str()) == wanted)
            .ok_or_else(|| RiskError::unknown_kind(s))
    }
}

impl TryFrom<String> for ChangeKind {
    type Error = RiskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChangeKind> for String {
    fn from(kind: ChangeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// When the change takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Before deployment; no event has been persisted yet
    BuildTime,
    /// Against a running system with persisted events
    RunTime,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionPhase::BuildTime => "BuildTime",
            ExecutionPhase::RunTime => "RunTime",
        })
    }
}

impl FromStr for ExecutionPhase {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "buildtime" | "build" => Ok(ExecutionPhase::BuildTime),
            "runtime" | "run" => Ok(ExecutionPhase::RunTime),
            _ => Err(RiskError::UnsupportedPhase {
                phase: s.to_string(),
            }),
        }
    }
}

/// Proposed change to one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    /// Changed node; also the analysis seed
    pub target: NodeRef,
    /// Kind of change
    pub kind: ChangeKind,
    /// Execution phase
    pub phase: ExecutionPhase,
}

impl ChangeDescriptor {
    /// Create descriptor
    #[must_use]
    pub fn new(target: NodeRef, kind: ChangeKind, phase: ExecutionPhase) -> Self {
        Self {
            target,
            kind,
            phase,
        }
    }

    /// Run-time change
    #[must_use]
    pub fn run_time(target: NodeRef, kind: ChangeKind) -> Self {
        Self::new(target, kind, ExecutionPhase::RunTime)
    }

    /// Build-time change
    #[must_use]
    pub fn build_time(target: NodeRef, kind: ChangeKind) -> Self {
        Self::new(target, kind, ExecutionPhase::BuildTime)
    }

    /// Parse kind and phase names
    ///
    /// # Errors
    /// [`RiskError::UnsupportedChangeKind`] or [`RiskError::UnsupportedPhase`]
    /// for unknown names.
    pub fn parse(target: NodeRef, kind: &str, phase: &str) -> Result<Self, RiskError> {
        Ok(Self::new(target, kind.parse()?, phase.parse()?))
    }
}
