//! Forward impact traversal
//!
//! Two passes over an immutable [`GraphStore`]:
//!
//! 1. **Closure**: breadth-first expansion bounded by `max_depth`. Gives the
//!    complete reachable set, each node's minimum depth and the discovery
//!    order every output list is tied to.
//! 2. **Paths**: depth-first enumeration over the closure. A path ends at a
//!    leaf, at a node already on the same path (feedback loop), at a node
//!    fully expanded by an earlier path, or at the hop bound. A node at the
//!    bound still closes loops and converging paths. Each edge ends
//!    at most one path, so enumeration stays linear in the edge count.
//!
//! Both passes check the cancellation token at every hop expansion.

use crate::error::ImpactError;
use crate::options::{AnalysisOptions, IntegrityMode, Interrupt};
use crate::result::{
    AffectedNode, ContextInvocations, ContextRef, Finding, Hop, ImpactMetadata, ImpactResult,
    Invocation, PathEnd, PropagationPath,
};
use esia_ontology::{owning_context, Edge, EdgeKind, GraphStore, NodeKind, NodeRef};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Forward relations followed from a seed kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationProfile {
    relations: &'static [EdgeKind],
}

impl PropagationProfile {
    /// Profile for a UserStory seed
    pub const USER_STORY: Self = Self {
        relations: &[
            EdgeKind::Implements,
            EdgeKind::HasAggregate,
            EdgeKind::HasCommand,
            EdgeKind::Emits,
            EdgeKind::Triggers,
            EdgeKind::Invokes,
        ],
    };

    /// Profile for an Event seed
    pub const EVENT: Self = Self {
        relations: &[EdgeKind::Triggers, EdgeKind::Invokes, EdgeKind::Emits],
    };

    /// Profile for a seed kind, `None` if the kind cannot seed an analysis
    #[must_use]
    pub const fn for_seed(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::UserStory => Some(Self::USER_STORY),
            NodeKind::Event => Some(Self::EVENT),
            _ => None,
        }
    }

    /// Relations in this profile
    #[inline]
    #[must_use]
    pub const fn relations(&self) -> &'static [EdgeKind] {
        self.relations
    }

    /// Relation followed out of a node of `kind`, if the profile allows it
    #[must_use]
    pub fn forward(&self, kind: NodeKind) -> Option<EdgeKind> {
        forward_relation(kind).filter(|relation| self.relations.contains(relation))
    }
}

/// The single forward relation leaving a node kind
///
/// HAS_POLICY is containment only: policies are reached through TRIGGERS.
#[must_use]
pub const fn forward_relation(kind: NodeKind) -> Option<EdgeKind> {
    match kind {
        NodeKind::UserStory => Some(EdgeKind::Implements),
        NodeKind::BoundedContext => Some(EdgeKind::HasAggregate),
        NodeKind::Aggregate => Some(EdgeKind::HasCommand),
        NodeKind::Command => Some(EdgeKind::Emits),
        NodeKind::Event => Some(EdgeKind::Triggers),
        NodeKind::Policy => Some(EdgeKind::Invokes),
        NodeKind::Requirement => None,
    }
}

/// Compute the impact of a change to `seed`
///
/// # Errors
/// - [`ImpactError::UnsupportedSeedKind`] unless the seed is a UserStory or Event
/// - [`ImpactError::NotFound`] if the seed does not exist
/// - [`ImpactError::DanglingEdge`] for a missing endpoint in strict mode
/// - [`ImpactError::Cancelled`] / [`ImpactError::Timeout`] when the token fires
pub fn analyze_impact<G: GraphStore + ?Sized>(
    seed: &NodeRef,
    store: &G,
    options: &AnalysisOptions,
) -> Result<ImpactResult, ImpactError> {
    let profile = PropagationProfile::for_seed(seed.kind)
        .ok_or_else(|| ImpactError::UnsupportedSeedKind { node: seed.clone() })?;
    let seed_node = store
        .get_node(seed)
        .map_err(|_| ImpactError::NotFound { node: seed.clone() })?;

    tracing::debug!(
        "Analyzing impact of {} (max depth {})",
        seed,
        options.max_depth
    );

    let mut traversal = Traversal::new(store, options, profile, seed.clone());
    traversal.close()?;
    let paths = traversal.enumerate_paths()?;
    let result = traversal.finish(seed_node.label(), paths);

    tracing::debug!(
        "Impact of {}: {} nodes, {} affected contexts, {} paths, {} findings",
        seed,
        result.nodes.len(),
        result.affected_contexts.len(),
        result.paths.len(),
        result.findings.len()
    );
    Ok(result)
}

struct Traversal<'a, G: ?Sized> {
    store: &'a G,
    options: &'a AnalysisOptions,
    profile: PropagationProfile,
    seed: NodeRef,
    started: Instant,
    checkpoints: usize,
    edges_followed: usize,
    /// Closure in discovery order, with minimum depth
    reached: IndexMap<NodeRef, usize>,
    /// (policy, command) pairs in discovery order
    invoked: IndexSet<(NodeRef, NodeRef)>,
    /// Command through which each non-seed event was first reached
    emitted_by: HashMap<NodeRef, NodeRef>,
    /// Nodes at the hop bound with unexplored targets
    frontier: Vec<NodeRef>,
    warnings: Vec<Finding>,
    loops: Vec<(NodeRef, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

struct Frame {
    targets: std::vec::IntoIter<(EdgeKind, NodeRef)>,
    /// Node sits at the hop bound; unexplored targets are not entered
    at_bound: bool,
    cut: bool,
}

impl<'a, G: GraphStore + ?Sized> Traversal<'a, G> {
    fn new(
        store: &'a G,
        options: &'a AnalysisOptions,
        profile: PropagationProfile,
        seed: NodeRef,
    ) -> Self {
        Self {
            store,
            options,
            profile,
            seed,
            started: Instant::now(),
            checkpoints: 0,
            edges_followed: 0,
            reached: IndexMap::new(),
            invoked: IndexSet::new(),
            emitted_by: HashMap::new(),
            frontier: Vec::new(),
            warnings: Vec::new(),
            loops: Vec::new(),
        }
    }

    fn checkpoint(&mut self) -> Result<(), ImpactError> {
        self.checkpoints += 1;
        self.options.cancel.check().map_err(|interrupt| match interrupt {
            Interrupt::Cancelled => ImpactError::Cancelled {
                seed: self.seed.clone(),
                checkpoints: self.checkpoints,
            },
            Interrupt::DeadlinePassed => ImpactError::Timeout {
                seed: self.seed.clone(),
                elapsed_ms: u64::try_from(self.started.elapsed().as_millis())
                    .unwrap_or(u64::MAX),
            },
        })
    }

    fn forward_edges(&self, node: &NodeRef) -> Vec<Edge> {
        self.profile
            .forward(node.kind)
            .map(|relation| self.store.edges_from(node, relation))
            .unwrap_or_default()
    }

    /// Forward targets that exist, in edge order
    fn targets(&self, node: &NodeRef) -> Vec<(EdgeKind, NodeRef)> {
        self.forward_edges(node)
            .into_iter()
            .filter(|edge| self.store.contains_node(&edge.to))
            .map(|edge| (edge.kind, edge.to))
            .collect()
    }

    fn close(&mut self) -> Result<(), ImpactError> {
        let max_depth = self.options.max_depth;
        let mut queue = VecDeque::from([(self.seed.clone(), 0usize)]);
        self.reached.insert(self.seed.clone(), 0);

        while let Some((node, depth)) = queue.pop_front() {
            self.checkpoint()?;
            let mut cut = false;

            for edge in self.forward_edges(&node) {
                self.edges_followed += 1;
                if !self.store.contains_node(&edge.to) {
                    self.dangling(edge)?;
                    continue;
                }
                let known = self.reached.contains_key(&edge.to);
                if !known && depth >= max_depth {
                    cut = true;
                    continue;
                }
                if !known {
                    self.reached.insert(edge.to.clone(), depth + 1);
                    queue.push_back((edge.to.clone(), depth + 1));
                    if edge.kind == EdgeKind::Emits {
                        self.emitted_by.insert(edge.to.clone(), edge.from.clone());
                    }
                }
                if edge.kind == EdgeKind::Invokes {
                    self.invoked.insert((edge.from, edge.to));
                }
            }

            if cut {
                self.frontier.push(node);
            }
        }
        Ok(())
    }

    fn dangling(&mut self, edge: Edge) -> Result<(), ImpactError> {
        let id = edge.id();
        match self.options.integrity {
            IntegrityMode::Strict => Err(ImpactError::DanglingEdge {
                edge: id,
                missing: edge.to,
            }),
            IntegrityMode::Permissive => {
                tracing::warn!("Skipping dangling edge {}", id);
                self.warnings.push(Finding::IntegrityWarning {
                    edge: id,
                    missing: edge.to,
                });
                Ok(())
            }
        }
    }

    fn enumerate_paths(&mut self) -> Result<Vec<PropagationPath>, ImpactError> {
        let mut paths = Vec::new();
        let mut marks: HashMap<NodeRef, Mark> = HashMap::new();
        let mut path: Vec<Hop> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        let frame = self.enter(None, self.seed.clone(), &mut path, &mut marks, &mut paths)?;
        stack.push(frame);

        while let Some(frame) = stack.last_mut() {
            let Some((via, target)) = frame.targets.next() else {
                let cut = frame.cut;
                stack.pop();
                if let Some(hop) = path.pop() {
                    if cut {
                        marks.remove(&hop.node);
                    } else {
                        marks.insert(hop.node, Mark::Done);
                    }
                }
                continue;
            };

            match marks.get(&target).copied() {
                Some(Mark::OnPath) => {
                    if !self.loops.iter().any(|(node, _)| *node == target) {
                        self.loops.push((target.clone(), paths.len()));
                    }
                    paths.push(close_path(&path, via, target, PathEnd::FeedbackLoop));
                }
                Some(Mark::Done) => {
                    paths.push(close_path(&path, via, target, PathEnd::Converged));
                }
                None if frame.at_bound => {
                    if !frame.cut {
                        frame.cut = true;
                        self.cut_at_bound(&path, &mut paths);
                    }
                }
                None => {
                    let frame = self.enter(Some(via), target, &mut path, &mut marks, &mut paths)?;
                    stack.push(frame);
                }
            }
        }
        Ok(paths)
    }

    fn enter(
        &mut self,
        via: Option<EdgeKind>,
        node: NodeRef,
        path: &mut Vec<Hop>,
        marks: &mut HashMap<NodeRef, Mark>,
        paths: &mut Vec<PropagationPath>,
    ) -> Result<Frame, ImpactError> {
        self.checkpoint()?;
        let targets = self.targets(&node);
        marks.insert(node.clone(), Mark::OnPath);
        path.push(Hop { via, node });

        let hops = path.len() - 1;
        if targets.is_empty() && hops > 0 {
            paths.push(PropagationPath {
                hops: path.clone(),
                end: PathEnd::Leaf,
                feedback_loop: false,
            });
        }
        Ok(Frame {
            targets: targets.into_iter(),
            at_bound: hops >= self.options.max_depth,
            cut: false,
        })
    }

    /// End the current path at the hop bound and report its last node as
    /// frontier; loops and converging targets are still classified.
    fn cut_at_bound(&mut self, path: &[Hop], paths: &mut Vec<PropagationPath>) {
        paths.push(PropagationPath {
            hops: path.to_vec(),
            end: PathEnd::DepthLimit,
            feedback_loop: false,
        });
        if let Some(hop) = path.last() {
            if !self.frontier.contains(&hop.node) {
                self.frontier.push(hop.node.clone());
            }
        }
    }

    fn finish(self, seed_label: String, paths: Vec<PropagationPath>) -> ImpactResult {
        let mut contexts = ContextCache::default();
        let store = self.store;

        let home_contexts = sorted_contexts(seed_contexts(store, &self.seed, &mut contexts));

        // Events belong to the command that reached them, the seed event to
        // its first home context
        let mut owners: IndexMap<NodeRef, Option<ContextRef>> = IndexMap::new();
        for node in self.reached.keys() {
            let owner = match node.kind {
                NodeKind::Event if *node == self.seed => home_contexts.first().cloned(),
                NodeKind::Event => self
                    .emitted_by
                    .get(node)
                    .and_then(|command| contexts.owner(store, command)),
                _ => contexts.owner(store, node),
            };
            owners.insert(node.clone(), owner);
        }
        let affected_contexts = sorted_contexts(
            owners
                .values()
                .flatten()
                .filter(|context| !home_contexts.contains(context))
                .cloned()
                .collect(),
        );

        let mut groups: IndexMap<Option<ContextRef>, Vec<Invocation>> = IndexMap::new();
        for (policy, command) in &self.invoked {
            let context = owners.get(policy).cloned().flatten();
            groups.entry(context).or_default().push(Invocation {
                policy_name: label(store, policy),
                policy: policy.clone(),
                command_name: label(store, command),
                command: command.clone(),
            });
        }
        let mut invocations: Vec<ContextInvocations> = groups
            .into_iter()
            .map(|(context, invocations)| ContextInvocations {
                context,
                invocations,
            })
            .collect();
        invocations.sort_by(|a, b| context_key(a.context.as_ref()).cmp(&context_key(b.context.as_ref())));

        let mut nodes: Vec<AffectedNode> = self
            .reached
            .iter()
            .map(|(node, depth)| AffectedNode {
                node: node.clone(),
                label: label(store, node),
                depth: *depth,
                context: owners.get(node).cloned().flatten(),
            })
            .collect();
        nodes.sort_by(|a, b| context_key(a.context.as_ref()).cmp(&context_key(b.context.as_ref())));

        // Paths follow the context of their terminal node
        let mut order: Vec<usize> = (0..paths.len()).collect();
        let path_context = |index: usize| {
            paths[index]
                .terminal()
                .and_then(|node| owners.get(node).cloned().flatten())
        };
        order.sort_by(|a, b| {
            context_key(path_context(*a).as_ref()).cmp(&context_key(path_context(*b).as_ref()))
        });
        let mut position = vec![0; paths.len()];
        for (new, old) in order.iter().enumerate() {
            position[*old] = new;
        }
        let mut slots: Vec<Option<PropagationPath>> = paths.into_iter().map(Some).collect();
        let paths: Vec<PropagationPath> = order
            .iter()
            .filter_map(|old| slots[*old].take())
            .map(|mut path| {
                path.feedback_loop = path.end == PathEnd::FeedbackLoop;
                path
            })
            .collect();

        let mut loops: Vec<(Option<ContextRef>, Finding)> = self
            .loops
            .iter()
            .map(|(node, path)| {
                (
                    owners.get(node).cloned().flatten(),
                    Finding::FeedbackLoop {
                        node: node.clone(),
                        path: position[*path],
                    },
                )
            })
            .collect();
        loops.sort_by(|a, b| context_key(a.0.as_ref()).cmp(&context_key(b.0.as_ref())));
        for (_, finding) in &loops {
            if let Finding::FeedbackLoop { node, .. } = finding {
                tracing::warn!("Feedback loop through {} while analyzing {}", node, self.seed);
            }
        }

        let mut findings: Vec<Finding> = loops.into_iter().map(|(_, finding)| finding).collect();
        findings.extend(self.warnings);
        let truncated = !self.frontier.is_empty();
        if truncated {
            tracing::warn!(
                "Traversal of {} cut at depth {} ({} frontier nodes)",
                self.seed,
                self.options.max_depth,
                self.frontier.len()
            );
            findings.push(Finding::TraversalDepthExceeded {
                max_depth: self.options.max_depth,
                frontier: self.frontier,
            });
        }

        let metadata = ImpactMetadata {
            max_depth: self.options.max_depth,
            depth_reached: self.reached.values().copied().max().unwrap_or(0),
            truncated,
            nodes_visited: self.reached.len(),
            edges_followed: self.edges_followed,
            checkpoints: self.checkpoints,
        };

        ImpactResult {
            seed: self.seed,
            seed_label,
            home_contexts,
            affected_contexts,
            invocations,
            nodes,
            paths,
            findings,
            metadata,
        }
    }
}

fn close_path(path: &[Hop], via: EdgeKind, target: NodeRef, end: PathEnd) -> PropagationPath {
    let mut hops = path.to_vec();
    hops.push(Hop {
        via: Some(via),
        node: target,
    });
    PropagationPath {
        hops,
        end,
        feedback_loop: end == PathEnd::FeedbackLoop,
    }
}

/// Sort key: unresolved first, then by name; ties keep discovery order
fn context_key(context: Option<&ContextRef>) -> Option<&str> {
    context.map(|context| context.name.as_str())
}

fn sorted_contexts(mut contexts: Vec<ContextRef>) -> Vec<ContextRef> {
    let mut seen = IndexSet::new();
    contexts.retain(|context| seen.insert(context.id.clone()));
    contexts.sort_by(|a, b| a.name.cmp(&b.name));
    contexts
}

fn seed_contexts<G: GraphStore + ?Sized>(
    store: &G,
    seed: &NodeRef,
    contexts: &mut ContextCache,
) -> Vec<ContextRef> {
    match seed.kind {
        NodeKind::UserStory => store
            .edges_from(seed, EdgeKind::Implements)
            .into_iter()
            .filter_map(|edge| contexts.owner(store, &edge.to))
            .collect(),
        NodeKind::Event => store
            .edges_to(seed, EdgeKind::Emits)
            .into_iter()
            .filter_map(|edge| contexts.owner(store, &edge.from))
            .collect(),
        _ => contexts.owner(store, seed).into_iter().collect(),
    }
}

fn label<G: GraphStore + ?Sized>(store: &G, node: &NodeRef) -> String {
    store
        .get_node(node)
        .map_or_else(|_| node.id.clone(), |found| found.label())
}

/// Resolved context names, keyed by context id
#[derive(Default)]
struct ContextCache {
    names: HashMap<NodeRef, String>,
}

impl ContextCache {
    fn owner<G: GraphStore + ?Sized>(&mut self, store: &G, node: &NodeRef) -> Option<ContextRef> {
        let context = owning_context(store, node)?;
        let name = self
            .names
            .entry(context.clone())
            .or_insert_with(|| label(store, &context))
            .clone();
        Some(ContextRef {
            id: context.id,
            name,
        })
    }
}
