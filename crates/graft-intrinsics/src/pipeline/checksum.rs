use super::{PassContext, Receiver, Registrar};
use crate::capability::{Feature, StubId};
use crate::error::PipelineError;
use crate::key::JavaType;
use crate::registry::Registry;
use crate::rule::StubArg;
use graft_ir::JavaKind;

fn checksum_params(buffer: JavaType) -> Vec<JavaType> {
    vec![JavaType::INT, buffer, JavaType::INT, JavaType::INT]
}

pub(crate) fn register_crc32(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    let names = ctx.names;
    let mut r = Registrar::new(registry, ctx, "crc32", "java.util.zip.CRC32");
    r.substitute("update", Receiver::Static, vec![JavaType::INT, JavaType::INT])?;

    // (crc, buffer, offset, length)
    let bytes = ctx
        .stub_call(Feature::Crc32, StubId::UpdateBytesCrc32)?
        .args([
            StubArg::Pass(0),
            StubArg::array(layout, 1, JavaKind::Byte, Some(2)),
            StubArg::Pass(3),
        ]);
    r.register(
        names.crc32_update_bytes,
        Receiver::Static,
        checksum_params(JavaType::BYTE_ARRAY),
        bytes,
    )?;

    let buffer = ctx
        .stub_call(Feature::Crc32, StubId::UpdateBytesCrc32)?
        .args([
            StubArg::Pass(0),
            StubArg::AddressOffset { address: 1, offset: 2 },
            StubArg::Pass(3),
        ]);
    r.register(
        names.crc32_update_byte_buffer,
        Receiver::Static,
        checksum_params(JavaType::LONG),
        buffer,
    )
}

pub(crate) fn register_crc32c(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    let mut r = Registrar::new(registry, ctx, "crc32c", "java.util.zip.CRC32C");

    // (crc, buffer, offset, end): the stub wants a length.
    let bytes = ctx
        .stub_call(Feature::Crc32c, StubId::UpdateBytesCrc32c)?
        .args([
            StubArg::Pass(0),
            StubArg::array(layout, 1, JavaKind::Byte, Some(2)),
            StubArg::Difference(3, 2),
        ]);
    r.register(
        "updateBytes",
        Receiver::Static,
        checksum_params(JavaType::BYTE_ARRAY),
        bytes,
    )?;

    let direct = ctx
        .stub_call(Feature::Crc32c, StubId::UpdateBytesCrc32c)?
        .args([
            StubArg::Pass(0),
            StubArg::AddressOffset { address: 1, offset: 2 },
            StubArg::Difference(3, 2),
        ]);
    r.register(
        "updateDirectByteBuffer",
        Receiver::Static,
        checksum_params(JavaType::LONG),
        direct,
    )
}
