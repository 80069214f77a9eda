use crate::kind::JavaKind;
use crate::node::{BytecodeSource, InvokeKind, MethodRef, Node, NodeId};

/// The translation-time surface a rewrite rule emits into.
///
/// One context exists per call site being translated. Rules only ever see it through
/// `&mut dyn GraphBuilderContext`, so the translator is free to back it with whatever
/// graph representation it uses.
pub trait GraphBuilderContext {
    /// Appends `node` to the graph and returns its id.
    fn add(&mut self, node: Node) -> NodeId;

    /// Pushes `value` as the call's result onto the operand stack.
    fn push(&mut self, kind: JavaKind, value: NodeId);

    /// Adds `node` and pushes it as the call's result.
    fn add_push(&mut self, kind: JavaKind, node: Node) -> NodeId {
        let id = self.add(node);
        self.push(kind, id);
        id
    }

    /// Returns `value` guarded against null. Calling this twice on the same value is
    /// allowed and must not emit a second guard.
    fn null_check(&mut self, value: NodeId) -> NodeId;

    fn invoke_kind(&self) -> InvokeKind;

    /// Bytecode index of the call site.
    fn bci(&self) -> u32;

    /// Kind of the value the replaced call returns, `Void` if none.
    fn invoke_return_kind(&self) -> JavaKind;

    /// Whether the call site is being inlined into its caller, as opposed to being
    /// compiled as a stand-alone out-of-line method.
    fn is_inlining(&self) -> bool;

    /// Kind used for raw machine words.
    fn word_kind(&self) -> JavaKind {
        JavaKind::Long
    }

    /// Attempts to constant-fold the target of a call site object.
    fn fold_call_site_target(&mut self, _call_site: NodeId) -> Option<NodeId> {
        None
    }

    /// Parses the body of `substitute` from `source` in place of the current call,
    /// binding `args` to its parameters. Returns `false` if the substitute could not
    /// be parsed, in which case the generic call is emitted instead.
    fn inline_substitute(
        &mut self,
        substitute: &MethodRef,
        source: &BytecodeSource,
        args: &[NodeId],
    ) -> bool;
}
