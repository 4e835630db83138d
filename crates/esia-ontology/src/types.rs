//! Node and relation kinds of the Event Storming ontology
//!
//! Seven node kinds and seven relation kinds. Every relation has a fixed
//! source kind and a fixed set of target kinds; [`EdgeKind::accepts`] is the
//! single source of truth for the relation table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an ontology node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// Source requirement text
    Requirement,
    /// User story (`role` wants `action`)
    UserStory,
    /// Bounded context, the ownership boundary
    BoundedContext,
    /// Consistency boundary owning commands
    Aggregate,
    /// Requested state change
    Command,
    /// Past-tense fact
    Event,
    /// Reaction to an event inside one bounded context
    Policy,
}

impl NodeKind {
    /// All node kinds in declaration order
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Requirement,
        NodeKind::UserStory,
        NodeKind::BoundedContext,
        NodeKind::Aggregate,
        NodeKind::Command,
        NodeKind::Event,
        NodeKind::Policy,
    ];

    /// Label used in diagnostics
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeKind::Requirement => "Requirement",
            NodeKind::UserStory => "UserStory",
            NodeKind::BoundedContext => "BoundedContext",
            NodeKind::Aggregate => "Aggregate",
            NodeKind::Command => "Command",
            NodeKind::Event => "Event",
            NodeKind::Policy => "Policy",
        }
    }

    /// Whether nodes of this kind must have exactly one owning context
    #[inline]
    #[must_use]
    pub const fn requires_owner(self) -> bool {
        matches!(
            self,
            NodeKind::Aggregate | NodeKind::Command | NodeKind::Policy
        )
    }

    /// Containment relation that owns nodes of this kind, if any
    #[inline]
    #[must_use]
    pub const fn owner_relation(self) -> Option<EdgeKind> {
        match self {
            NodeKind::Aggregate => Some(EdgeKind::HasAggregate),
            NodeKind::Command => Some(EdgeKind::HasCommand),
            NodeKind::Policy => Some(EdgeKind::HasPolicy),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a node: ids are unique within a kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    /// Node kind
    pub kind: NodeKind,
    /// Identifier, unique within `kind`
    pub id: String,
}

impl NodeRef {
    /// Create reference
    #[inline]
    #[must_use]
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Reference to a requirement
    #[must_use]
    pub fn requirement(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Requirement, id)
    }

    /// Reference to a user story
    #[must_use]
    pub fn user_story(id: impl Into<String>) -> Self {
        Self::new(NodeKind::UserStory, id)
    }

    /// Reference to a bounded context
    #[must_use]
    pub fn context(id: impl Into<String>) -> Self {
        Self::new(NodeKind::BoundedContext, id)
    }

    /// Reference to an aggregate
    #[must_use]
    pub fn aggregate(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Aggregate, id)
    }

    /// Reference to a command
    #[must_use]
    pub fn command(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Command, id)
    }

    /// Reference to an event
    #[must_use]
    pub fn event(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Event, id)
    }

    /// Reference to a policy
    #[must_use]
    pub fn policy(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Policy, id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Attributes of a requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementAttrs {
    /// Requirement text
    pub text: String,
    /// Originating document, if known
    #[serde(default)]
    pub source: Option<String>,
}

/// Attributes of a user story
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStoryAttrs {
    /// Acting role
    pub role: String,
    /// Wanted action
    pub action: String,
    /// Stated benefit
    #[serde(default)]
    pub benefit: Option<String>,
    /// Priority label
    #[serde(default = "default_priority")]
    pub priority: String,
    /// Workflow status
    #[serde(default = "default_status")]
    pub status: String,
}

/// Attributes of a bounded context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAttrs {
    /// Context name, used for ordering
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

/// Attributes of an aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateAttrs {
    /// Aggregate name
    pub name: String,
    /// Root entity name
    #[serde(default)]
    pub root_entity: Option<String>,
    /// Business invariants guarded by the aggregate
    #[serde(default)]
    pub invariants: Vec<String>,
}

/// Attributes of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAttrs {
    /// Command name
    pub name: String,
    /// Issuing actor
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// Attributes of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttrs {
    /// Event name
    pub name: String,
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,
    /// Payload schema, opaque to the engine
    #[serde(default)]
    pub schema: Option<String>,
}

/// Attributes of a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttrs {
    /// Policy name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

fn default_priority() -> String {
    "medium".to_string()
}

fn default_status() -> String {
    "draft".to_string()
}

fn default_actor() -> String {
    "user".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Kind-specific node attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeAttrs {
    /// Requirement attributes
    Requirement(RequirementAttrs),
    /// User story attributes
    UserStory(UserStoryAttrs),
    /// Bounded context attributes
    BoundedContext(ContextAttrs),
    /// Aggregate attributes
    Aggregate(AggregateAttrs),
    /// Command attributes
    Command(CommandAttrs),
    /// Event attributes
    Event(EventAttrs),
    /// Policy attributes
    Policy(PolicyAttrs),
}

impl NodeAttrs {
    /// Kind these attributes belong to
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            NodeAttrs::Requirement(_) => NodeKind::Requirement,
            NodeAttrs::UserStory(_) => NodeKind::UserStory,
            NodeAttrs::BoundedContext(_) => NodeKind::BoundedContext,
            NodeAttrs::Aggregate(_) => NodeKind::Aggregate,
            NodeAttrs::Command(_) => NodeKind::Command,
            NodeAttrs::Event(_) => NodeKind::Event,
            NodeAttrs::Policy(_) => NodeKind::Policy,
        }
    }
}

/// Ontology node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within the kind
    pub id: String,
    /// Kind-specific attributes (carry the kind)
    #[serde(flatten)]
    pub attrs: NodeAttrs,
}

impl Node {
    /// Create node from attributes
    #[must_use]
    pub fn new(id: impl Into<String>, attrs: NodeAttrs) -> Self {
        Self {
            id: id.into(),
            attrs,
        }
    }

    /// Requirement node
    #[must_use]
    pub fn requirement(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeAttrs::Requirement(RequirementAttrs {
                text: text.into(),
                source: None,
            }),
        )
    }

    /// User story node with default priority and status
    #[must_use]
    pub fn user_story(
        id: impl Into<String>,
        role: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            NodeAttrs::UserStory(UserStoryAttrs {
                role: role.into(),
                action: action.into(),
                benefit: None,
                priority: default_priority(),
                status: default_status(),
            }),
        )
    }

    /// Bounded context node
    #[must_use]
    pub fn context(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeAttrs::BoundedContext(ContextAttrs {
                name: name.into(),
                description: None,
            }),
        )
    }

    /// Aggregate node
    #[must_use]
    pub fn aggregate(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeAttrs::Aggregate(AggregateAttrs {
                name: name.into(),
                root_entity: None,
                invariants: Vec::new(),
            }),
        )
    }

    /// Command node issued by the default actor
    #[must_use]
    pub fn command(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeAttrs::Command(CommandAttrs {
                name: name.into(),
                actor: default_actor(),
            }),
        )
    }

    /// Event node at version `1.0.0`
    #[must_use]
    pub fn event(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeAttrs::Event(EventAttrs {
                name: name.into(),
                version: default_version(),
                schema: None,
            }),
        )
    }

    /// Policy node
    #[must_use]
    pub fn policy(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeAttrs::Policy(PolicyAttrs {
                name: name.into(),
                description: None,
            }),
        )
    }

    /// Node kind
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.attrs.kind()
    }

    /// Reference to this node
    #[must_use]
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.kind(), self.id.clone())
    }

    /// Human-facing label
    #[must_use]
    pub fn label(&self) -> String {
        match &self.attrs {
            NodeAttrs::Requirement(a) => a.text.clone(),
            NodeAttrs::UserStory(a) => format!("as {} I want {}", a.role, a.action),
            NodeAttrs::BoundedContext(a) => a.name.clone(),
            NodeAttrs::Aggregate(a) => a.name.clone(),
            NodeAttrs::Command(a) => a.name.clone(),
            NodeAttrs::Event(a) => a.name.clone(),
            NodeAttrs::Policy(a) => a.name.clone(),
        }
    }
}

/// Relation kind between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// UserStory → BoundedContext | Aggregate
    Implements,
    /// BoundedContext → Aggregate
    HasAggregate,
    /// BoundedContext → Policy
    HasPolicy,
    /// Aggregate → Command
    HasCommand,
    /// Command → Event
    Emits,
    /// Event → Policy, may cross contexts
    Triggers,
    /// Policy → Command, same context only
    Invokes,
}

impl EdgeKind {
    /// All relation kinds in declaration order
    pub const ALL: [EdgeKind; 7] = [
        EdgeKind::Implements,
        EdgeKind::HasAggregate,
        EdgeKind::HasPolicy,
        EdgeKind::HasCommand,
        EdgeKind::Emits,
        EdgeKind::Triggers,
        EdgeKind::Invokes,
    ];

    /// Relation name as used in the ontology
    #[must_use]
    pub const fn relation_name(self) -> &'static str {
        match self {
            EdgeKind::Implements => "IMPLEMENTS",
            EdgeKind::HasAggregate => "HAS_AGGREGATE",
            EdgeKind::HasPolicy => "HAS_POLICY",
            EdgeKind::HasCommand => "HAS_COMMAND",
            EdgeKind::Emits => "EMITS",
            EdgeKind::Triggers => "TRIGGERS",
            EdgeKind::Invokes => "INVOKES",
        }
    }

    /// Required source kind
    #[must_use]
    pub const fn source_kind(self) -> NodeKind {
        match self {
            EdgeKind::Implements => NodeKind::UserStory,
            EdgeKind::HasAggregate | EdgeKind::HasPolicy => NodeKind::BoundedContext,
            EdgeKind::HasCommand => NodeKind::Aggregate,
            EdgeKind::Emits => NodeKind::Command,
            EdgeKind::Triggers => NodeKind::Event,
            EdgeKind::Invokes => NodeKind::Policy,
        }
    }

    /// Allowed target kinds
    #[must_use]
    pub const fn target_kinds(self) -> &'static [NodeKind] {
        match self {
            EdgeKind::Implements => &[NodeKind::BoundedContext, NodeKind::Aggregate],
            EdgeKind::HasAggregate => &[NodeKind::Aggregate],
            EdgeKind::HasPolicy | EdgeKind::Triggers => &[NodeKind::Policy],
            EdgeKind::HasCommand | EdgeKind::Invokes => &[NodeKind::Command],
            EdgeKind::Emits => &[NodeKind::Event],
        }
    }

    /// Whether `from -> to` is in the relation table for this kind
    #[must_use]
    pub fn accepts(self, from: NodeKind, to: NodeKind) -> bool {
        self.source_kind() == from && self.target_kinds().contains(&to)
    }

    /// Containment relations establish ownership
    #[inline]
    #[must_use]
    pub const fn is_containment(self) -> bool {
        matches!(
            self,
            EdgeKind::HasAggregate | EdgeKind::HasPolicy | EdgeKind::HasCommand
        )
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.relation_name())
    }
}

/// Identity of an edge: one edge per `(kind, from, to)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId {
    /// Relation kind
    pub kind: EdgeKind,
    /// Source node
    pub from: NodeRef,
    /// Target node
    pub to: NodeRef,
}

impl EdgeId {
    /// Create edge identity
    #[must_use]
    pub fn new(kind: EdgeKind, from: NodeRef, to: NodeRef) -> Self {
        Self { kind, from, to }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}

/// Relation-specific edge attributes
///
/// Attributes are descriptive only; traversal ignores them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeAttrs {
    /// No attributes
    #[default]
    None,
    /// TRIGGERS attributes
    Trigger {
        /// Relative ordering among triggers of one event
        priority: u32,
        /// Disabled triggers are kept for audit
        enabled: bool,
    },
    /// INVOKES attributes
    Invocation {
        /// Invocation is asynchronous
        is_async: bool,
    },
    /// IMPLEMENTS attributes
    Implementation {
        /// Extraction confidence in `[0, 1]`
        confidence: Option<f64>,
    },
}

impl EdgeAttrs {
    /// Default attributes for a relation kind
    #[must_use]
    pub fn default_for(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Triggers => EdgeAttrs::Trigger {
                priority: 1,
                enabled: true,
            },
            EdgeKind::Invokes => EdgeAttrs::Invocation { is_async: true },
            EdgeKind::Implements => EdgeAttrs::Implementation { confidence: None },
            _ => EdgeAttrs::None,
        }
    }
}

/// Directed ontology edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Relation kind
    pub kind: EdgeKind,
    /// Source node
    pub from: NodeRef,
    /// Target node
    pub to: NodeRef,
    /// Relation attributes
    #[serde(default)]
    pub attrs: EdgeAttrs,
}

impl Edge {
    /// Edge with the relation's default attributes
    #[must_use]
    pub fn new(kind: EdgeKind, from: NodeRef, to: NodeRef) -> Self {
        Self {
            kind,
            from,
            to,
            attrs: EdgeAttrs::default_for(kind),
        }
    }

    /// Replace attributes
    #[must_use]
    pub fn with_attrs(mut self, attrs: EdgeAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Identity of this edge
    #[must_use]
    pub fn id(&self) -> EdgeId {
        EdgeId::new(self.kind, self.from.clone(), self.to.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_table_matches_ontology() {
        assert!(EdgeKind::Implements.accepts(NodeKind::UserStory, NodeKind::BoundedContext));
        assert!(EdgeKind::Implements.accepts(NodeKind::UserStory, NodeKind::Aggregate));
        assert!(EdgeKind::Triggers.accepts(NodeKind::Event, NodeKind::Policy));
        assert!(EdgeKind::Invokes.accepts(NodeKind::Policy, NodeKind::Command));
        assert!(!EdgeKind::Invokes.accepts(NodeKind::Command, NodeKind::Policy));
        assert!(!EdgeKind::Emits.accepts(NodeKind::Policy, NodeKind::Event));
        assert!(!EdgeKind::HasCommand.accepts(NodeKind::BoundedContext, NodeKind::Command));
    }

    #[test]
    fn each_relation_has_exactly_one_source_kind() {
        for kind in EdgeKind::ALL {
            let sources: Vec<NodeKind> = NodeKind::ALL
                .into_iter()
                .filter(|from| {
                    NodeKind::ALL
                        .into_iter()
                        .any(|to| kind.accepts(*from, to))
                })
                .collect();
            assert_eq!(sources, vec![kind.source_kind()], "{kind}");
        }
    }

    #[test]
    fn owner_relations_are_containment() {
        for kind in NodeKind::ALL {
            match kind.owner_relation() {
                Some(rel) => {
                    assert!(rel.is_containment());
                    assert!(kind.requires_owner());
                    assert!(rel.target_kinds().contains(&kind));
                }
                None => assert!(!kind.requires_owner()),
            }
        }
    }

    #[test]
    fn node_defaults_follow_ontology() {
        let event = Node::event("e1", "OrderCancelled");
        match &event.attrs {
            NodeAttrs::Event(attrs) => assert_eq!(attrs.version, "1.0.0"),
            other => panic!("unexpected attrs {other:?}"),
        }

        let story = Node::user_story("us1", "customer", "cancel my order");
        match &story.attrs {
            NodeAttrs::UserStory(attrs) => {
                assert_eq!(attrs.priority, "medium");
                assert_eq!(attrs.status, "draft");
            }
            other => panic!("unexpected attrs {other:?}"),
        }
        assert_eq!(story.label(), "as customer I want cancel my order");
    }

    #[test]
    fn node_deserializes_with_defaults() {
        let json = r#"{"id":"c1","kind":"Command","name":"CancelOrder"}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.node_ref(), NodeRef::command("c1"));
        match node.attrs {
            NodeAttrs::Command(attrs) => assert_eq!(attrs.actor, "user"),
            other => panic!("unexpected attrs {other:?}"),
        }
    }

    #[test]
    fn edge_display_names_relation() {
        let edge = Edge::new(
            EdgeKind::Invokes,
            NodeRef::policy("p1"),
            NodeRef::command("c1"),
        );
        assert_eq!(edge.id().to_string(), "Policy:p1 -[INVOKES]-> Command:c1");
        assert_eq!(edge.attrs, EdgeAttrs::Invocation { is_async: true });
    }
}
