//! Core library passes: object identity, class metadata, system, threads, call
//! sites, reflection, unsafe memory, arrays and strings.

use super::{PassContext, Receiver, Registrar};
use crate::capability::{Feature, LayoutOffset, StubId};
use crate::error::PipelineError;
use crate::key::JavaType;
use crate::registry::{Guard, Registry};
use crate::rule::{InlineIntrinsic, NativeStubCall};
use graft_ir::{JavaKind, LocationIdentity, Node};
use log::debug;

const JAVA_THREAD_THREAD_OBJECT: LocationIdentity = LocationIdentity::mutable("JavaThread::_threadObj");

pub(crate) fn register_object(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let mut r = Registrar::new(registry, ctx, "object", "java.lang.Object");
    // Position-independent code cannot record the assumptions clone relies on.
    if !ctx.options.generate_pic {
        let clone = InlineIntrinsic::new("object-clone", |b, args| {
            let object = b.null_check(args[0]);
            let node = Node::ObjectClone {
                invoke: b.invoke_kind(),
                bci: b.bci(),
                object,
            };
            b.add_push(JavaKind::Object, node);
            true
        })
        .inline_only();
        r.register("clone", Receiver::Instance, vec![], clone)?;
    }
    r.substitute("hashCode", Receiver::Instance, vec![])?;
    r.substitute_guarded(
        "notify",
        Receiver::Instance,
        vec![],
        Guard::Feature(Feature::InlineNotify),
    )?;
    r.substitute_guarded(
        "notifyAll",
        Receiver::Instance,
        vec![],
        Guard::Feature(Feature::InlineNotifyAll),
    )?;
    Ok(())
}

pub(crate) fn register_class(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let mut r = Registrar::new(registry, ctx, "class", "java.lang.Class");
    for name in ["getModifiers", "isInterface", "isArray", "isPrimitive", "getSuperclass"] {
        r.substitute(name, Receiver::Instance, vec![])?;
    }
    r.substitute_guarded(
        "getComponentType",
        Receiver::Instance,
        vec![],
        Guard::LayoutOffset(LayoutOffset::ArrayComponentMirror),
    )
}

pub(crate) fn register_system(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let mut r = Registrar::new(registry, ctx, "system", "java.lang.System");
    for (name, stub) in [
        ("currentTimeMillis", StubId::JavaTimeMillis),
        ("nanoTime", StubId::JavaTimeNanos),
    ] {
        match ctx.caps.stub_address(stub) {
            Some(address) => r.register(name, Receiver::Static, vec![], NativeStubCall::new(stub, address))?,
            None => debug!("host exports no {stub}, System.{name} stays a regular call"),
        }
    }

    let identity_hash = InlineIntrinsic::new("identity-hash-code", |b, args| {
        b.add_push(JavaKind::Int, Node::IdentityHashCode { object: args[0] });
        true
    })
    .inline_only();
    r.register("identityHashCode", Receiver::Static, vec![JavaType::OBJECT], identity_hash)?;

    let arraycopy = InlineIntrinsic::new("arraycopy", |b, args| {
        let node = Node::ArrayCopy {
            bci: b.bci(),
            src: args[0],
            src_pos: args[1],
            dst: args[2],
            dst_pos: args[3],
            length: args[4],
        };
        b.add(node);
        true
    })
    .inline_only();
    r.register(
        "arraycopy",
        Receiver::Static,
        vec![
            JavaType::OBJECT,
            JavaType::INT,
            JavaType::OBJECT,
            JavaType::INT,
            JavaType::INT,
        ],
        arraycopy,
    )
}

pub(crate) fn register_thread(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let thread_object_offset = ctx.layout().thread_object_offset;
    let mut r = Registrar::new(registry, ctx, "thread", "java.lang.Thread");

    let current_thread = InlineIntrinsic::new("current-thread", move |b, _| {
        let word = b.word_kind();
        let thread = b.add(Node::CurrentThread { word });
        let offset = b.add(Node::Constant {
            kind: JavaKind::Long,
            value: thread_object_offset,
        });
        let address = b.add(Node::OffsetAddress {
            base: thread,
            offset,
        });
        // The thread object field is never compressed.
        let read = Node::Read {
            address,
            kind: JavaKind::Object,
            location: JAVA_THREAD_THREAD_OBJECT,
        };
        b.add_push(JavaKind::Object, read);
        true
    });
    r.register("currentThread", Receiver::Static, vec![], current_thread)?;
    r.substitute("isInterrupted", Receiver::Instance, vec![JavaType::BOOLEAN])
}

pub(crate) fn register_call_site(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let target = InlineIntrinsic::new("call-site-target", |b, args| {
        let call_site = b.null_check(args[0]);
        match b.fold_call_site_target(call_site) {
            Some(folded) => b.push(JavaKind::Object, folded),
            None => {
                let node = Node::CallSiteTarget {
                    invoke: b.invoke_kind(),
                    bci: b.bci(),
                    call_site,
                };
                b.add_push(JavaKind::Object, node);
            }
        }
        true
    })
    .inline_only();

    for owner in [
        "java.lang.invoke.ConstantCallSite",
        "java.lang.invoke.MutableCallSite",
        "java.lang.invoke.VolatileCallSite",
    ] {
        Registrar::new(registry, ctx, "call-site", owner).register(
            "getTarget",
            Receiver::Instance,
            vec![],
            target.clone(),
        )?;
    }
    Ok(())
}

pub(crate) fn register_reflection(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let mut r = Registrar::new(registry, ctx, "reflection", ctx.names.reflection_class);
    let caller_class = InlineIntrinsic::new("caller-class", |b, _| {
        let node = Node::ReflectionGetCallerClass {
            invoke: b.invoke_kind(),
            bci: b.bci(),
        };
        b.add_push(JavaKind::Object, node);
        true
    })
    .inline_only();
    r.register("getCallerClass", Receiver::Static, vec![], caller_class)?;
    r.substitute("getClassAccessFlags", Receiver::Static, vec![JavaType::CLASS])
}

pub(crate) fn register_unsafe(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    Registrar::new(registry, ctx, "unsafe", ctx.names.unsafe_class)
        .substitutions("graft.replacements.UnsafeSubstitutions")
        .substitute_as(
            "copyMemory",
            ctx.names.copy_memory_substitute,
            Receiver::Instance,
            vec![
                JavaType::OBJECT,
                JavaType::LONG,
                JavaType::OBJECT,
                JavaType::LONG,
                JavaType::LONG,
            ],
        )
}

pub(crate) fn register_array(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    Registrar::new(registry, ctx, "array", "java.lang.reflect.Array")
        .allow_overwrite()
        .substitute("newInstance", Receiver::Static, vec![JavaType::CLASS, JavaType::INT])
}

pub(crate) fn register_string(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let mut r = Registrar::new(registry, ctx, "string", "java.lang.StringUTF16");
    r.substitute(
        "toBytes",
        Receiver::Static,
        vec![JavaType::CHAR_ARRAY, JavaType::INT, JavaType::INT],
    )?;
    r.substitute(
        "getChars",
        Receiver::Static,
        vec![
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::CHAR_ARRAY,
            JavaType::INT,
        ],
    )
}
