//! A recording graph builder.
//!
//! [`Graph`] keeps every node in insertion order and every pushed value on a
//! stack, which makes it convenient for tests and for tooling that wants to show
//! what a rewrite rule emits for a call site.

use crate::builder::GraphBuilderContext;
use crate::kind::JavaKind;
use crate::node::{BytecodeSource, InvokeKind, MethodRef, Node, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

/// Describes the call site a [`Graph`] stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub invoke: InvokeKind,
    pub bci: u32,
    pub returns: JavaKind,
    pub inlining: bool,
}

impl CallSite {
    pub fn new(invoke: InvokeKind, returns: JavaKind) -> Self {
        CallSite {
            invoke,
            bci: 0,
            returns,
            inlining: true,
        }
    }

    pub fn at(mut self, bci: u32) -> Self {
        self.bci = bci;
        self
    }

    /// Marks the site as compiled out-of-line rather than inlined into a caller.
    pub fn out_of_line(mut self) -> Self {
        self.inlining = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Graph {
    site: CallSite,
    nodes: Vec<Node>,
    stack: Vec<(JavaKind, NodeId)>,
    /// Values known to be non-null, either checked or produced non-null.
    non_null: FxHashSet<NodeId>,
    /// Call site objects whose target the host has proven constant.
    call_site_targets: FxHashMap<NodeId, NodeId>,
    /// Substitutes that fail to parse, for exercising the fall-through path.
    unparsable: FxHashSet<MethodRef>,
}

impl Graph {
    pub fn new(site: CallSite) -> Self {
        Graph {
            site,
            nodes: Vec::new(),
            stack: Vec::new(),
            non_null: FxHashSet::default(),
            call_site_targets: FxHashMap::default(),
            unparsable: FxHashSet::default(),
        }
    }

    pub fn site(&self) -> CallSite {
        self.site
    }

    /// Adds a parameter node standing for one call-site argument.
    pub fn parameter(&mut self, index: u32, kind: JavaKind) -> NodeId {
        self.add(Node::Parameter { index, kind })
    }

    /// Adds one parameter per kind, numbered from zero.
    pub fn parameters(&mut self, kinds: &[JavaKind]) -> Vec<NodeId> {
        kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| self.parameter(index as u32, *kind))
            .collect()
    }

    /// Records that `call_site` is known to always dispatch to `target`.
    pub fn bind_call_site_target(&mut self, call_site: NodeId, target: NodeId) {
        self.call_site_targets.insert(call_site, target);
    }

    pub fn reject_substitute(&mut self, method: MethodRef) {
        self.unparsable.insert(method);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stack(&self) -> &[(JavaKind, NodeId)] {
        &self.stack
    }

    pub fn pop(&mut self) -> Option<(JavaKind, NodeId)> {
        self.stack.pop()
    }

    /// Counts the nodes matching `pred`.
    pub fn count(&self, pred: impl Fn(&Node) -> bool) -> usize {
        self.nodes.iter().filter(|node| pred(node)).count()
    }

    /// The first node matching `pred`, in insertion order.
    pub fn find(&self, pred: impl Fn(&Node) -> bool) -> Option<(NodeId, &Node)> {
        self.nodes().find(|(_, node)| pred(node))
    }
}

impl GraphBuilderContext for Graph {
    fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        if matches!(
            node,
            Node::NullCheck { .. } | Node::CurrentThread { .. } | Node::ComputeObjectAddress { .. }
        ) {
            self.non_null.insert(id);
        }
        self.nodes.push(node);
        id
    }

    fn push(&mut self, kind: JavaKind, value: NodeId) {
        self.stack.push((kind.stack_kind(), value));
    }

    fn null_check(&mut self, value: NodeId) -> NodeId {
        if self.non_null.contains(&value) {
            return value;
        }
        self.add(Node::NullCheck { object: value })
    }

    fn invoke_kind(&self) -> InvokeKind {
        self.site.invoke
    }

    fn bci(&self) -> u32 {
        self.site.bci
    }

    fn invoke_return_kind(&self) -> JavaKind {
        self.site.returns
    }

    fn is_inlining(&self) -> bool {
        self.site.inlining
    }

    fn fold_call_site_target(&mut self, call_site: NodeId) -> Option<NodeId> {
        // Folding sees through the null check to the original value.
        let original = match self.node(call_site) {
            Node::NullCheck { object } => *object,
            _ => call_site,
        };
        self.call_site_targets.get(&original).copied()
    }

    fn inline_substitute(
        &mut self,
        substitute: &MethodRef,
        source: &BytecodeSource,
        args: &[NodeId],
    ) -> bool {
        if self.unparsable.contains(substitute) {
            return false;
        }
        let id = self.add(Node::Substitute {
            method: substitute.clone(),
            source: source.clone(),
            args: args.to_vec(),
        });
        if self.site.returns != JavaKind::Void {
            self.push(self.site.returns, id);
        }
        true
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, node) in self.nodes() {
            writeln!(f, "{id} = {node}")?;
        }
        for (kind, value) in &self.stack {
            writeln!(f, "push {kind} {value}")?;
        }
        Ok(())
    }
}
