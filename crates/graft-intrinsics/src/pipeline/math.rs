use super::{PassContext, Receiver, Registrar};
use crate::capability::{Feature, StubId};
use crate::error::PipelineError;
use crate::key::JavaType;
use crate::registry::Registry;
use crate::rule::{StubArg, StubResult};
use graft_ir::JavaKind;

pub(crate) fn register_big_integer(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    let ints = |array| StubArg::array(layout, array, JavaKind::Int, None);
    let mut r = Registrar::new(registry, ctx, "big-integer", "java.math.BigInteger");

    // The result array may be null and has to be allocated first, which only a
    // substitute body can do.
    if ctx.has_feature(Feature::MultiplyToLen) {
        r.substitute_as(
            ctx.names.multiply_to_len,
            "multiplyToLenStatic",
            Receiver::Static,
            vec![
                JavaType::INT_ARRAY,
                JavaType::INT,
                JavaType::INT_ARRAY,
                JavaType::INT,
                JavaType::INT_ARRAY,
            ],
        )?;
    }

    if ctx.has_feature(Feature::MulAdd) {
        // implMulAdd(out, in, offset, len, k); the stub counts the offset from the
        // end of `out`.
        let call = ctx.stub_call(Feature::MulAdd, StubId::MulAdd)?.args([
            ints(0),
            ints(1),
            StubArg::array_length_minus(layout, 0, 2),
            StubArg::Pass(3),
            StubArg::Pass(4),
        ]);
        r.register(
            "implMulAdd",
            Receiver::Static,
            vec![
                JavaType::INT_ARRAY,
                JavaType::INT_ARRAY,
                JavaType::INT,
                JavaType::INT,
                JavaType::INT,
            ],
            call,
        )?;
    }

    if ctx.has_feature(Feature::MontgomeryMultiply) {
        // implMontgomeryMultiply(a, b, n, len, inv, product)
        let call = ctx
            .stub_call(Feature::MontgomeryMultiply, StubId::MontgomeryMultiply)?
            .args([
                ints(0),
                ints(1),
                ints(2),
                StubArg::Pass(3),
                StubArg::Pass(4),
                ints(5),
            ])
            .returns(StubResult::Argument(5));
        r.register(
            "implMontgomeryMultiply",
            Receiver::Static,
            vec![
                JavaType::INT_ARRAY,
                JavaType::INT_ARRAY,
                JavaType::INT_ARRAY,
                JavaType::INT,
                JavaType::LONG,
                JavaType::INT_ARRAY,
            ],
            call,
        )?;
    }

    if ctx.has_feature(Feature::MontgomerySquare) {
        // implMontgomerySquare(a, n, len, inv, product)
        let call = ctx
            .stub_call(Feature::MontgomerySquare, StubId::MontgomerySquare)?
            .args([
                ints(0),
                ints(1),
                StubArg::Pass(2),
                StubArg::Pass(3),
                ints(4),
            ])
            .returns(StubResult::Argument(4));
        r.register(
            "implMontgomerySquare",
            Receiver::Static,
            vec![
                JavaType::INT_ARRAY,
                JavaType::INT_ARRAY,
                JavaType::INT,
                JavaType::LONG,
                JavaType::INT_ARRAY,
            ],
            call,
        )?;
    }

    if ctx.has_feature(Feature::SquareToLen) {
        // implSquareToLen(x, len, z, zlen)
        let call = ctx
            .stub_call(Feature::SquareToLen, StubId::SquareToLen)?
            .args([ints(0), StubArg::Pass(1), ints(2), StubArg::Pass(3)])
            .returns(StubResult::Argument(2));
        r.register(
            "implSquareToLen",
            Receiver::Static,
            vec![
                JavaType::INT_ARRAY,
                JavaType::INT,
                JavaType::INT_ARRAY,
                JavaType::INT,
            ],
            call,
        )?;
    }
    Ok(())
}

pub(crate) fn register_arrays_support(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    // vectorizedMismatch(a, aOffset, b, bOffset, length, log2ArrayIndexScale)
    let call = ctx
        .stub_call(Feature::VectorizedMismatch, StubId::VectorizedMismatch)?
        .args([
            StubArg::ObjectOffset { object: 0, offset: 1 },
            StubArg::ObjectOffset { object: 2, offset: 3 },
            StubArg::Pass(4),
            StubArg::Pass(5),
        ]);
    Registrar::new(registry, ctx, "arrays-support", "jdk.internal.util.ArraysSupport").register(
        "vectorizedMismatch",
        Receiver::Static,
        vec![
            JavaType::OBJECT,
            JavaType::LONG,
            JavaType::OBJECT,
            JavaType::LONG,
            JavaType::INT,
            JavaType::INT,
        ],
        call,
    )
}
