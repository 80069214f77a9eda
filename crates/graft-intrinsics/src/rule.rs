//! Rewrite rules: what replaces a recognized call.
//!
//! A rule is plain data plus, for inline intrinsics, an emission closure. Anything a
//! rule depends on (layout offsets, stub addresses, name spellings) is captured when
//! the rule is built, so applying a rule never consults the capability snapshot and
//! never mutates shared state.

use crate::capability::{StubId, VmLayout};
use graft_ir::{
    BytecodeSource, ForeignCallTarget, GraphBuilderContext, JavaKind, LocationIdentity, MethodRef,
    Node, NodeId,
};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Emission step of an inline intrinsic. Receives the call-site arguments, receiver
/// first, and returns whether the call was fully replaced.
pub type InlineFn = dyn Fn(&mut dyn GraphBuilderContext, &[NodeId]) -> bool + Send + Sync;

/// Replaces a call with a small hand-built subgraph.
#[derive(Clone)]
pub struct InlineIntrinsic {
    label: &'static str,
    emit: Arc<InlineFn>,
    inline_only: bool,
}

impl InlineIntrinsic {
    pub fn new<F>(label: &'static str, emit: F) -> Self
    where
        F: Fn(&mut dyn GraphBuilderContext, &[NodeId]) -> bool + Send + Sync + 'static,
    {
        InlineIntrinsic {
            label,
            emit: Arc::new(emit),
            inline_only: false,
        }
    }

    /// Restricts the rule to call sites that are being inlined into a caller.
    pub fn inline_only(mut self) -> Self {
        self.inline_only = true;
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_inline_only(&self) -> bool {
        self.inline_only
    }
}

impl fmt::Debug for InlineIntrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineIntrinsic")
            .field("label", &self.label)
            .field("inline_only", &self.inline_only)
            .finish()
    }
}

/// How one native stub argument is computed from the call-site arguments.
///
/// Argument indices count the receiver, when there is one, as 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubArg {
    /// The call-site argument unchanged.
    Pass(usize),
    /// Address of an array element: `array + base_offset + index * scale`, or of
    /// element zero when there is no index argument.
    ArrayElement {
        array: usize,
        base_offset: i64,
        scale: i64,
        index: Option<usize>,
    },
    /// `object + offset` where `offset` is a `long` argument.
    ObjectOffset { object: usize, offset: usize },
    /// Raw `address` argument plus a sign-extended `int` offset argument.
    AddressOffset { address: usize, offset: usize },
    /// Address of a field at a fixed offset inside `object`.
    FieldAddress { object: usize, offset: i64 },
    /// Loads a chain of reference fields starting at `object`, then takes the
    /// address of element zero of the array reached.
    FieldArray {
        object: usize,
        fields: Vec<i64>,
        base_offset: i64,
    },
    /// `array.length - value`, reading the length out of the array header.
    ArrayLengthMinus {
        array: usize,
        length_offset: i64,
        value: usize,
    },
    Sum(usize, usize),
    Difference(usize, usize),
}

const ARRAY_LENGTH: LocationIdentity = LocationIdentity::immutable("arrayLength");

impl StubArg {
    pub fn array(layout: &VmLayout, array: usize, kind: JavaKind, index: Option<usize>) -> Self {
        StubArg::ArrayElement {
            array,
            base_offset: layout.array_base_offset(kind),
            scale: layout.array_index_scale(kind),
            index,
        }
    }

    pub fn field_array(layout: &VmLayout, object: usize, fields: &[i64], kind: JavaKind) -> Self {
        StubArg::FieldArray {
            object,
            fields: fields.to_vec(),
            base_offset: layout.array_base_offset(kind),
        }
    }

    pub fn array_length_minus(layout: &VmLayout, array: usize, value: usize) -> Self {
        StubArg::ArrayLengthMinus {
            array,
            length_offset: layout.array_length_offset,
            value,
        }
    }

    /// Highest call-site argument index this formula reads.
    pub fn max_arg_index(&self) -> usize {
        match self {
            StubArg::Pass(i) => *i,
            StubArg::ArrayElement { array, index, .. } => (*array).max(index.unwrap_or(0)),
            StubArg::ObjectOffset { object, offset } => (*object).max(*offset),
            StubArg::AddressOffset { address, offset } => (*address).max(*offset),
            StubArg::FieldAddress { object, .. } | StubArg::FieldArray { object, .. } => *object,
            StubArg::ArrayLengthMinus { array, value, .. } => (*array).max(*value),
            StubArg::Sum(a, b) | StubArg::Difference(a, b) => (*a).max(*b),
        }
    }

    fn emit(&self, b: &mut dyn GraphBuilderContext, args: &[NodeId]) -> NodeId {
        match self {
            StubArg::Pass(i) => args[*i],
            StubArg::ArrayElement {
                array,
                base_offset,
                scale,
                index,
            } => {
                let mut offset = long_constant(b, *base_offset);
                if let Some(index) = index {
                    let wide = b.add(Node::SignExtend {
                        value: args[*index],
                        to: JavaKind::Long,
                    });
                    let scaled = match *scale {
                        1 => wide,
                        s if s.count_ones() == 1 => {
                            let shift = int_constant(b, i64::from(s.trailing_zeros()));
                            b.add(Node::LeftShift { x: wide, y: shift })
                        }
                        s => {
                            let factor = long_constant(b, s);
                            b.add(Node::Mul { x: wide, y: factor })
                        }
                    };
                    offset = b.add(Node::Add { x: offset, y: scaled });
                }
                b.add(Node::ComputeObjectAddress {
                    object: args[*array],
                    offset,
                })
            }
            StubArg::ObjectOffset { object, offset } => b.add(Node::ComputeObjectAddress {
                object: args[*object],
                offset: args[*offset],
            }),
            StubArg::AddressOffset { address, offset } => {
                let wide = b.add(Node::SignExtend {
                    value: args[*offset],
                    to: JavaKind::Long,
                });
                b.add(Node::Add {
                    x: args[*address],
                    y: wide,
                })
            }
            StubArg::FieldAddress { object, offset } => {
                let offset = long_constant(b, *offset);
                b.add(Node::ComputeObjectAddress {
                    object: args[*object],
                    offset,
                })
            }
            StubArg::FieldArray {
                object,
                fields,
                base_offset,
            } => {
                let mut current = args[*object];
                for field in fields {
                    let offset = long_constant(b, *field);
                    let address = b.add(Node::OffsetAddress {
                        base: current,
                        offset,
                    });
                    current = b.add(Node::Read {
                        address,
                        kind: JavaKind::Object,
                        location: LocationIdentity::Any,
                    });
                }
                let offset = long_constant(b, *base_offset);
                b.add(Node::ComputeObjectAddress {
                    object: current,
                    offset,
                })
            }
            StubArg::ArrayLengthMinus {
                array,
                length_offset,
                value,
            } => {
                let array = b.null_check(args[*array]);
                let offset = long_constant(b, *length_offset);
                let address = b.add(Node::ComputeObjectAddress { object: array, offset });
                let length = b.add(Node::Read {
                    address,
                    kind: JavaKind::Int,
                    location: ARRAY_LENGTH,
                });
                b.add(Node::Sub {
                    x: length,
                    y: args[*value],
                })
            }
            StubArg::Sum(x, y) => b.add(Node::Add {
                x: args[*x],
                y: args[*y],
            }),
            StubArg::Difference(x, y) => b.add(Node::Sub {
                x: args[*x],
                y: args[*y],
            }),
        }
    }
}

impl fmt::Display for StubArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubArg::Pass(i) => write!(f, "arg{i}"),
            StubArg::ArrayElement {
                array,
                base_offset,
                scale,
                index,
            } => {
                write!(f, "arg{array} + {base_offset}")?;
                match index {
                    Some(i) if *scale > 1 => write!(f, " + arg{i} * {scale}"),
                    Some(i) => write!(f, " + arg{i}"),
                    None => Ok(()),
                }
            }
            StubArg::ObjectOffset { object, offset } => write!(f, "arg{object} + arg{offset}"),
            StubArg::AddressOffset { address, offset } => {
                write!(f, "arg{address} + sext(arg{offset})")
            }
            StubArg::FieldAddress { object, offset } => write!(f, "arg{object} + {offset}"),
            StubArg::FieldArray {
                object,
                fields,
                base_offset,
            } => {
                let loaded = fields
                    .iter()
                    .fold(format!("arg{object}"), |acc, field| format!("[{acc} + {field}]"));
                write!(f, "{loaded} + {base_offset}")
            }
            StubArg::ArrayLengthMinus { array, value, .. } => write!(f, "len(arg{array}) - arg{value}"),
            StubArg::Sum(x, y) => write!(f, "arg{x} + arg{y}"),
            StubArg::Difference(x, y) => write!(f, "arg{x} - arg{y}"),
        }
    }
}

fn long_constant(b: &mut dyn GraphBuilderContext, value: i64) -> NodeId {
    b.add(Node::Constant {
        kind: JavaKind::Long,
        value,
    })
}

fn int_constant(b: &mut dyn GraphBuilderContext, value: i64) -> NodeId {
    b.add(Node::Constant {
        kind: JavaKind::Int,
        value,
    })
}

/// What the replaced call evaluates to after the stub returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubResult {
    /// The stub's own return value.
    Returned,
    /// A call-site argument the stub filled in, returned unchanged.
    Argument(usize),
    Void,
}

impl fmt::Display for StubResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubResult::Returned => f.write_str("returned"),
            StubResult::Argument(i) => write!(f, "arg{i}"),
            StubResult::Void => f.write_str("void"),
        }
    }
}

/// Replaces a call with a direct call to a native routine at a known address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStubCall {
    stub: StubId,
    target: ForeignCallTarget,
    entry: Cow<'static, str>,
    args: Vec<StubArg>,
    result: StubResult,
    null_check_receiver: bool,
}

impl NativeStubCall {
    pub fn new(stub: StubId, address: u64) -> Self {
        NativeStubCall {
            stub,
            target: ForeignCallTarget {
                symbol: stub.symbol(),
                address,
            },
            entry: Cow::Borrowed(stub.symbol()),
            args: Vec::new(),
            result: StubResult::Returned,
            null_check_receiver: false,
        }
    }

    pub fn arg(mut self, arg: StubArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = StubArg>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn returns(mut self, result: StubResult) -> Self {
        self.result = result;
        self
    }

    /// Names the entry point this call stands for when it differs from the stub's
    /// own symbol, e.g. an alternate decrypt path that passes an extra key.
    pub fn entry(mut self, entry: impl Into<Cow<'static, str>>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn null_checked_receiver(mut self) -> Self {
        self.null_check_receiver = true;
        self
    }

    pub fn stub(&self) -> StubId {
        self.stub
    }

    pub fn address(&self) -> u64 {
        self.target.address
    }

    pub fn target(&self) -> ForeignCallTarget {
        self.target
    }

    pub fn entry_name(&self) -> &str {
        &self.entry
    }

    pub fn stub_args(&self) -> &[StubArg] {
        &self.args
    }

    pub fn result(&self) -> StubResult {
        self.result
    }

    pub fn checks_receiver(&self) -> bool {
        self.null_check_receiver
    }

    fn max_arg_index(&self) -> Option<usize> {
        let result = match self.result {
            StubResult::Argument(i) => Some(i),
            _ => None,
        };
        let receiver = self.null_check_receiver.then_some(0);
        self.args
            .iter()
            .map(StubArg::max_arg_index)
            .chain(result)
            .chain(receiver)
            .max()
    }

    fn apply(&self, b: &mut dyn GraphBuilderContext, args: &[NodeId]) -> bool {
        let mut args = args.to_vec();
        if self.null_check_receiver {
            args[0] = b.null_check(args[0]);
        }

        let lowered: Vec<NodeId> = self.args.iter().map(|arg| arg.emit(b, &args)).collect();
        let returns = b.invoke_return_kind();
        let call_result = match self.result {
            StubResult::Returned => returns,
            StubResult::Argument(_) | StubResult::Void => JavaKind::Void,
        };
        let call = b.add(Node::ForeignCall {
            target: self.target,
            args: lowered,
            result: call_result,
        });

        match self.result {
            StubResult::Returned if returns != JavaKind::Void => b.push(returns, call),
            StubResult::Argument(i) if returns != JavaKind::Void => b.push(returns, args[i]),
            _ => {}
        }
        true
    }
}

/// Replaces a whole method body with a substitute parsed from a secondary bytecode
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyReplacement {
    substitute: MethodRef,
    renamed: bool,
    source: BytecodeSource,
}

impl BodyReplacement {
    /// A substitute in `owner` with the same name as the method it replaces, or
    /// `name_override` when given.
    pub fn new(
        owner: impl Into<Cow<'static, str>>,
        original_name: impl Into<Cow<'static, str>>,
        name_override: Option<&'static str>,
        source: BytecodeSource,
    ) -> Self {
        let name = match name_override {
            Some(name) => Cow::Borrowed(name),
            None => original_name.into(),
        };
        BodyReplacement {
            substitute: MethodRef::new(owner, name),
            renamed: name_override.is_some(),
            source,
        }
    }

    pub fn substitute(&self) -> &MethodRef {
        &self.substitute
    }

    /// Whether the substitute's name differs from the replaced method's.
    pub fn is_renamed(&self) -> bool {
        self.renamed
    }

    pub fn source(&self) -> &BytecodeSource {
        &self.source
    }
}

/// How a matched call is replaced.
#[derive(Debug, Clone)]
pub enum RewriteRule {
    Inline(InlineIntrinsic),
    NativeStub(NativeStubCall),
    Body(BodyReplacement),
}

impl RewriteRule {
    pub fn is_inline_only(&self) -> bool {
        match self {
            RewriteRule::Inline(inline) => inline.inline_only,
            RewriteRule::NativeStub(_) | RewriteRule::Body(_) => false,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            RewriteRule::Inline(_) => "inline",
            RewriteRule::NativeStub(_) => "native-stub",
            RewriteRule::Body(_) => "substitute",
        }
    }

    pub fn as_native_stub(&self) -> Option<&NativeStubCall> {
        match self {
            RewriteRule::NativeStub(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_body(&self) -> Option<&BodyReplacement> {
        match self {
            RewriteRule::Body(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_inline(&self) -> Option<&InlineIntrinsic> {
        match self {
            RewriteRule::Inline(inline) => Some(inline),
            _ => None,
        }
    }

    /// Highest call-site argument index the rule's data refers to, if any.
    pub(crate) fn max_arg_index(&self) -> Option<usize> {
        match self {
            RewriteRule::NativeStub(call) => call.max_arg_index(),
            RewriteRule::Inline(_) | RewriteRule::Body(_) => None,
        }
    }

    /// Emits the replacement. Contract checks (inline-only, arity) are the caller's
    /// job; see [`Registry::try_apply`](crate::Registry::try_apply).
    pub(crate) fn apply(&self, b: &mut dyn GraphBuilderContext, args: &[NodeId]) -> bool {
        match self {
            RewriteRule::Inline(inline) => (inline.emit)(b, args),
            RewriteRule::NativeStub(call) => call.apply(b, args),
            RewriteRule::Body(body) => b.inline_substitute(&body.substitute, &body.source, args),
        }
    }
}

impl From<InlineIntrinsic> for RewriteRule {
    fn from(inline: InlineIntrinsic) -> Self {
        RewriteRule::Inline(inline)
    }
}

impl From<NativeStubCall> for RewriteRule {
    fn from(call: NativeStubCall) -> Self {
        RewriteRule::NativeStub(call)
    }
}

impl From<BodyReplacement> for RewriteRule {
    fn from(body: BodyReplacement) -> Self {
        RewriteRule::Body(body)
    }
}

impl fmt::Display for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteRule::Inline(inline) => {
                write!(f, "inline {}", inline.label)?;
                if inline.inline_only {
                    f.write_str(" [inline-only]")?;
                }
                Ok(())
            }
            RewriteRule::NativeStub(call) => {
                write!(f, "native-stub {}(", call.target)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ") -> {}", call.result)?;
                if call.entry != call.target.symbol {
                    write!(f, " via {}", call.entry)?;
                }
                if call.null_check_receiver {
                    f.write_str(" [receiver checked]")?;
                }
                Ok(())
            }
            RewriteRule::Body(body) => {
                write!(f, "substitute {} from {}", body.substitute, body.source)
            }
        }
    }
}
