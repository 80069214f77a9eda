use super::{PassContext, Receiver, Registrar};
use crate::error::PipelineError;
use crate::key::JavaType;
use crate::registry::Registry;
use crate::rule::InlineIntrinsic;
use graft_ir::{GraphBuilderContext, JavaKind, LocationIdentity, Node, NodeId};

const INSTANCE_KLASS_CONSTANTS: LocationIdentity = LocationIdentity::immutable("InstanceKlass::_constants");
const CONSTANT_POOL_LENGTH: LocationIdentity = LocationIdentity::immutable("ConstantPool::_length");

/// Offsets needed to walk from a holder class to its metaspace constant pool.
#[derive(Debug, Clone, Copy)]
struct PoolLayout {
    constants_offset: i64,
    header_size: i64,
    length_offset: i64,
}

impl PoolLayout {
    /// Emits a read of the metaspace constant pool pointer for `holder`, the class
    /// a reflective constant pool object wraps.
    fn metaspace_pool(self, b: &mut dyn GraphBuilderContext, holder: NodeId) -> NodeId {
        let holder = b.null_check(holder);
        let klass = b.add(Node::ClassGetHub { class: holder });
        let offset = b.add(Node::Constant {
            kind: JavaKind::Long,
            value: self.constants_offset,
        });
        let address = b.add(Node::OffsetAddress { base: klass, offset });
        let word = b.word_kind();
        b.add(Node::Read {
            address,
            kind: word,
            location: INSTANCE_KLASS_CONSTANTS,
        })
    }

    fn push_length(self, b: &mut dyn GraphBuilderContext, holder: NodeId) {
        let pool = self.metaspace_pool(b, holder);
        let offset = b.add(Node::Constant {
            kind: JavaKind::Long,
            value: self.length_offset,
        });
        let address = b.add(Node::OffsetAddress { base: pool, offset });
        b.add_push(
            JavaKind::Int,
            Node::Read {
                address,
                kind: JavaKind::Int,
                location: CONSTANT_POOL_LENGTH,
            },
        );
    }

    /// Pool entries are word sized and start right after the pool header.
    fn push_element(self, b: &mut dyn GraphBuilderContext, holder: NodeId, index: NodeId, kind: JavaKind) {
        let pool = self.metaspace_pool(b, holder);
        let shift = b.add(Node::Constant {
            kind: JavaKind::Int,
            value: i64::from(b.word_kind().byte_count().trailing_zeros()),
        });
        let wide = b.add(Node::SignExtend {
            value: index,
            to: JavaKind::Long,
        });
        let scaled = b.add(Node::LeftShift { x: wide, y: shift });
        let header = b.add(Node::Constant {
            kind: JavaKind::Long,
            value: self.header_size,
        });
        let offset = b.add(Node::Add { x: scaled, y: header });
        let address = b.add(Node::OffsetAddress { base: pool, offset });
        b.add_push(
            kind,
            Node::Read {
                address,
                kind,
                location: LocationIdentity::ArrayElement(kind),
            },
        );
    }
}

pub(crate) fn register_constant_pool(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    let pool = PoolLayout {
        constants_offset: layout.instance_klass_constants_offset,
        header_size: layout.constant_pool_size,
        length_offset: layout.constant_pool_length_offset,
    };
    let mut r = Registrar::new(registry, ctx, "constant-pool", ctx.names.constant_pool_class);

    let size = InlineIntrinsic::new("constant-pool-size", move |b, args| {
        b.null_check(args[0]);
        pool.push_length(b, args[1]);
        true
    });
    r.register("getSize0", Receiver::Instance, vec![JavaType::OBJECT], size)?;

    for (name, kind) in [
        ("getIntAt0", JavaKind::Int),
        ("getLongAt0", JavaKind::Long),
        ("getFloatAt0", JavaKind::Float),
        ("getDoubleAt0", JavaKind::Double),
    ] {
        let element = InlineIntrinsic::new("constant-pool-element", move |b, args| {
            b.null_check(args[0]);
            pool.push_element(b, args[1], args[2], kind);
            true
        });
        r.register(
            name,
            Receiver::Instance,
            vec![JavaType::OBJECT, JavaType::INT],
            element,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_ir::{CallSite, Graph, InvokeKind};

    const POOL: PoolLayout = PoolLayout {
        constants_offset: 216,
        header_size: 80,
        length_offset: 72,
    };

    #[test]
    fn element_read_scales_index_by_word_size() {
        let mut g = Graph::new(CallSite::new(InvokeKind::Virtual, JavaKind::Long));
        let args = g.parameters(&[JavaKind::Object, JavaKind::Object, JavaKind::Int]);
        POOL.push_element(&mut g, args[1], args[2], JavaKind::Long);

        assert!(g
            .find(|n| *n == Node::Constant { kind: JavaKind::Int, value: 3 })
            .is_some());
        let (_, read) = g
            .find(|n| {
                matches!(
                    n,
                    Node::Read {
                        location: LocationIdentity::ArrayElement(_),
                        ..
                    }
                )
            })
            .unwrap();
        assert!(matches!(read, Node::Read { kind: JavaKind::Long, .. }));
        assert_eq!(g.stack().len(), 1);
    }

    #[test]
    fn holder_is_null_checked_before_the_hub_read() {
        let mut g = Graph::new(CallSite::new(InvokeKind::Virtual, JavaKind::Int));
        let args = g.parameters(&[JavaKind::Object, JavaKind::Object]);
        POOL.push_length(&mut g, args[1]);
        let (check, _) = g.find(|n| matches!(n, Node::NullCheck { .. })).unwrap();
        let (hub, _) = g.find(|n| matches!(n, Node::ClassGetHub { .. })).unwrap();
        assert!(check < hub);
        assert_eq!(g.stack(), &[(JavaKind::Int, graft_ir::NodeId(g.len() as u32 - 1))]);
    }
}
