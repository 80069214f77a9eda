//! Node vocabulary available to rewrite rules.
//!
//! Rules build address arithmetic, memory reads and foreign calls out of these,
//! plus a handful of opaque VM-specific nodes that the backend lowers itself.

use crate::kind::JavaKind;
use std::borrow::Cow;
use std::fmt;

/// Identifier of a node within one [`Graph`](crate::Graph). Local to that graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// How the call site being translated dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Special,
    Virtual,
    Interface,
}

impl fmt::Display for InvokeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvokeKind::Static => "static",
            InvokeKind::Special => "special",
            InvokeKind::Virtual => "virtual",
            InvokeKind::Interface => "interface",
        };
        f.write_str(name)
    }
}

/// The memory location a read touches, for alias analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationIdentity {
    /// A named VM-internal field. Immutable locations may be freely reordered.
    Named { name: &'static str, immutable: bool },
    /// Any element of an array of the given kind.
    ArrayElement(JavaKind),
    Any,
}

impl LocationIdentity {
    pub const fn immutable(name: &'static str) -> Self {
        LocationIdentity::Named { name, immutable: true }
    }

    pub const fn mutable(name: &'static str) -> Self {
        LocationIdentity::Named { name, immutable: false }
    }
}

impl fmt::Display for LocationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationIdentity::Named { name, immutable: true } => write!(f, "{name} (final)"),
            LocationIdentity::Named { name, .. } => f.write_str(name),
            LocationIdentity::ArrayElement(kind) => write!(f, "{kind}[]"),
            LocationIdentity::Any => f.write_str("any"),
        }
    }
}

/// A precompiled native routine reachable by direct call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignCallTarget {
    pub symbol: &'static str,
    pub address: u64,
}

impl fmt::Display for ForeignCallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.symbol, self.address)
    }
}

/// A method named by owner type and method name only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    pub owner: Cow<'static, str>,
    pub name: Cow<'static, str>,
}

impl MethodRef {
    pub fn new(owner: impl Into<Cow<'static, str>>, name: impl Into<Cow<'static, str>>) -> Self {
        MethodRef {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// Where the translator fetches bytecode for a substitute method body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BytecodeSource(pub Cow<'static, str>);

impl BytecodeSource {
    /// The default provider holding the compiler's own replacement classes.
    pub const fn replacements() -> Self {
        BytecodeSource(Cow::Borrowed("replacements"))
    }
}

impl Default for BytecodeSource {
    fn default() -> Self {
        BytecodeSource::replacements()
    }
}

impl fmt::Display for BytecodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node in the IR graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An incoming value of the method being translated.
    Parameter { index: u32, kind: JavaKind },
    /// Integer constant of `kind` (`Int` or `Long`).
    Constant { kind: JavaKind, value: i64 },
    Add { x: NodeId, y: NodeId },
    Sub { x: NodeId, y: NodeId },
    Mul { x: NodeId, y: NodeId },
    LeftShift { x: NodeId, y: NodeId },
    /// Widens `value` to `to`, sign-extending.
    SignExtend { value: NodeId, to: JavaKind },
    /// Guard that deoptimizes when `object` is null; the node is the checked value.
    NullCheck { object: NodeId },
    /// Raw address `base + offset`.
    OffsetAddress { base: NodeId, offset: NodeId },
    /// Address of a location inside a managed object, `object + offset`.
    ComputeObjectAddress { object: NodeId, offset: NodeId },
    Read {
        address: NodeId,
        kind: JavaKind,
        location: LocationIdentity,
    },
    ForeignCall {
        target: ForeignCallTarget,
        args: Vec<NodeId>,
        result: JavaKind,
    },
    /// The VM's native thread structure for the executing thread.
    CurrentThread { word: JavaKind },
    /// The VM class structure backing a class mirror.
    ClassGetHub { class: NodeId },
    ObjectClone {
        invoke: InvokeKind,
        bci: u32,
        object: NodeId,
    },
    IdentityHashCode { object: NodeId },
    ArrayCopy {
        bci: u32,
        src: NodeId,
        src_pos: NodeId,
        dst: NodeId,
        dst_pos: NodeId,
        length: NodeId,
    },
    CallSiteTarget {
        invoke: InvokeKind,
        bci: u32,
        call_site: NodeId,
    },
    ReflectionGetCallerClass { invoke: InvokeKind, bci: u32 },
    /// A substitute method body parsed in place of the original call.
    Substitute {
        method: MethodRef,
        source: BytecodeSource,
        args: Vec<NodeId>,
    },
}

fn list(ids: &[NodeId]) -> String {
    ids.iter()
        .map(NodeId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Parameter { index, kind } => write!(f, "param({index}: {kind})"),
            Node::Constant { kind, value } => write!(f, "const {kind} {value}"),
            Node::Add { x, y } => write!(f, "add {x}, {y}"),
            Node::Sub { x, y } => write!(f, "sub {x}, {y}"),
            Node::Mul { x, y } => write!(f, "mul {x}, {y}"),
            Node::LeftShift { x, y } => write!(f, "shl {x}, {y}"),
            Node::SignExtend { value, to } => write!(f, "sext {value} to {to}"),
            Node::NullCheck { object } => write!(f, "null_check {object}"),
            Node::OffsetAddress { base, offset } => write!(f, "address {base} + {offset}"),
            Node::ComputeObjectAddress { object, offset } => {
                write!(f, "object_address {object} + {offset}")
            }
            Node::Read {
                address,
                kind,
                location,
            } => write!(f, "read {kind} [{address}] @ {location}"),
            Node::ForeignCall {
                target,
                args,
                result,
            } => write!(f, "foreign_call {target}({}) -> {result}", list(args)),
            Node::CurrentThread { word } => write!(f, "current_thread: {word}"),
            Node::ClassGetHub { class } => write!(f, "class_get_hub {class}"),
            Node::ObjectClone {
                invoke,
                bci,
                object,
            } => write!(f, "object_clone {object} ({invoke} @ {bci})"),
            Node::IdentityHashCode { object } => write!(f, "identity_hash_code {object}"),
            Node::ArrayCopy {
                bci,
                src,
                src_pos,
                dst,
                dst_pos,
                length,
            } => write!(
                f,
                "array_copy {src}[{src_pos}] -> {dst}[{dst_pos}] x {length} (@ {bci})"
            ),
            Node::CallSiteTarget {
                invoke,
                bci,
                call_site,
            } => write!(f, "call_site_target {call_site} ({invoke} @ {bci})"),
            Node::ReflectionGetCallerClass { invoke, bci } => {
                write!(f, "caller_class ({invoke} @ {bci})")
            }
            Node::Substitute {
                method,
                source,
                args,
            } => write!(f, "substitute {method} from {source}({})", list(args)),
        }
    }
}
