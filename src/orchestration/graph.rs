//! Dependency graph of backend calls for one inbound request.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    sync::Arc,
};

use serde::Serialize;

use super::call::{BackendResult, CallParameters};
use crate::core::{ProxyError, ProxyResult};

/// Label of a call site in the composite request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NodeLabel {
    A,
    B,
    C,
    D,
    E,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 5] = [
        NodeLabel::A,
        NodeLabel::B,
        NodeLabel::C,
        NodeLabel::D,
        NodeLabel::E,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::A => "A",
            NodeLabel::B => "B",
            NodeLabel::C => "C",
            NodeLabel::D => "D",
            NodeLabel::E => "E",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds a node's parameters from its parents' resolved results, passed in
/// the order the parents were declared.
pub type DeriveFn = Arc<dyn Fn(&[Arc<BackendResult>]) -> CallParameters + Send + Sync>;

/// Where a node gets its call parameters from.
#[derive(Clone)]
pub enum ParamSource {
    Fixed(CallParameters),
    Derived(DeriveFn),
}

impl ParamSource {
    pub fn resolve(&self, parents: &[Arc<BackendResult>]) -> CallParameters {
        match self {
            ParamSource::Fixed(params) => params.clone(),
            ParamSource::Derived(derive) => derive(parents),
        }
    }
}

/// One call site in the graph.
#[derive(Clone)]
pub struct DependencyNode {
    pub label: NodeLabel,
    pub parents: Vec<NodeLabel>,
    pub source: ParamSource,
}

impl DependencyNode {
    /// A node that starts immediately with fixed parameters.
    pub fn root(label: NodeLabel, params: CallParameters) -> Self {
        Self {
            label,
            parents: Vec::new(),
            source: ParamSource::Fixed(params),
        }
    }

    /// A node whose parameters are computed once all `parents` have resolved.
    pub fn dependent<F>(label: NodeLabel, parents: Vec<NodeLabel>, derive: F) -> Self
    where
        F: Fn(&[Arc<BackendResult>]) -> CallParameters + Send + Sync + 'static,
    {
        Self {
            label,
            parents,
            source: ParamSource::Derived(Arc::new(derive)),
        }
    }

    /// A node that reuses `template` but takes its correlation id from the
    /// `response_key` of a single parent. A fallback parent yields id 0.
    pub fn chained(label: NodeLabel, parent: NodeLabel, template: CallParameters) -> Self {
        Self::dependent(label, vec![parent], move |parents| CallParameters {
            id: parents.first().map_or(0, |p| p.response_key),
            ..template.clone()
        })
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

impl fmt::Debug for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyNode")
            .field("label", &self.label)
            .field("parents", &self.parents)
            .finish_non_exhaustive()
    }
}

/// Validated, acyclic set of call sites stored in topological order.
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
}

impl DependencyGraph {
    /// Validate `nodes` and order them so every node follows its parents.
    ///
    /// Rejects duplicate labels, undeclared parents and cycles. Among nodes
    /// that become ready together, declaration order is kept.
    pub fn new(nodes: Vec<DependencyNode>) -> ProxyResult<Self> {
        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.label) {
                return Err(ProxyError::Configuration(format!(
                    "duplicate graph node {}",
                    node.label
                )));
            }
        }

        let mut pending: HashMap<NodeLabel, usize> = HashMap::new();
        let mut children: HashMap<NodeLabel, Vec<NodeLabel>> = HashMap::new();
        for node in &nodes {
            for parent in &node.parents {
                if !seen.contains(parent) {
                    return Err(ProxyError::Configuration(format!(
                        "graph node {} depends on undeclared node {parent}",
                        node.label
                    )));
                }
                children.entry(*parent).or_default().push(node.label);
            }
            pending.insert(node.label, node.parents.len());
        }

        let mut ready: VecDeque<NodeLabel> = nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| n.label)
            .collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(label) = ready.pop_front() {
            order.push(label);
            for child in children.get(&label).into_iter().flatten() {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*child);
                    }
                }
            }
        }

        if order.len() != nodes.len() {
            return Err(ProxyError::Configuration(
                "graph contains a dependency cycle".to_string(),
            ));
        }

        let mut by_label: HashMap<NodeLabel, DependencyNode> =
            nodes.into_iter().map(|n| (n.label, n)).collect();
        let nodes = order
            .into_iter()
            .filter_map(|label| by_label.remove(&label))
            .collect();

        Ok(Self { nodes })
    }

    /// The composite request shape: A feeds C and D, B feeds E.
    ///
    /// ```text
    /// A = call(numItems=2,   itemSize=50,   delay=50,  id=input_id)
    /// C = call(numItems=1,   itemSize=5000, delay=80,  id=A.responseKey)
    /// D = call(numItems=1,   itemSize=1000, delay=1,   id=A.responseKey)
    /// B = call(numItems=25,  itemSize=30,   delay=150, id=input_id)
    /// E = call(numItems=100, itemSize=30,   delay=4,   id=B.responseKey)
    /// ```
    pub fn composite(input_id: i64, endpoint: Arc<str>) -> ProxyResult<Self> {
        let call = |num_items, item_size, delay, id| {
            CallParameters::new(endpoint.clone(), num_items, item_size, delay, id)
        };

        Self::new(vec![
            DependencyNode::root(NodeLabel::A, call(2, 50, 50, input_id)),
            DependencyNode::root(NodeLabel::B, call(25, 30, 150, input_id)),
            DependencyNode::chained(NodeLabel::C, NodeLabel::A, call(1, 5000, 80, 0)),
            DependencyNode::chained(NodeLabel::D, NodeLabel::A, call(1, 1000, 1, 0)),
            DependencyNode::chained(NodeLabel::E, NodeLabel::B, call(100, 30, 4, 0)),
        ])
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn node(&self, label: NodeLabel) -> Option<&DependencyNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
