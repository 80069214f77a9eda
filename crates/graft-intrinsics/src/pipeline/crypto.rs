//! Cipher, digest and encoding passes. All of them dispatch to native stubs that
//! read key and state arrays straight out of the provider objects.

use super::{PassContext, Receiver, Registrar};
use crate::capability::{Feature, StubId};
use crate::error::PipelineError;
use crate::key::JavaType;
use crate::registry::Registry;
use crate::rule::{StubArg, StubResult};
use graft_ir::JavaKind;

pub(crate) fn register_aes(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    let crypto = &layout.crypto;
    let names = ctx.names;
    let bytes = |array, index| StubArg::array(layout, array, JavaKind::Byte, Some(index));

    // Block cipher: (in, inOffset, out, outOffset), key schedule in `this`.
    let block = vec![JavaType::BYTE_ARRAY, JavaType::INT, JavaType::BYTE_ARRAY, JavaType::INT];
    let key = StubArg::field_array(layout, 0, &[crypto.aes_key_offset], JavaKind::Int);
    let original_key = StubArg::field_array(layout, 0, &[crypto.aes_last_key_offset], JavaKind::Byte);

    let encrypt = ctx
        .stub_call(Feature::Aes, StubId::AesEncryptBlock)?
        .args([bytes(1, 2), bytes(3, 4), key.clone()])
        .returns(StubResult::Void)
        .null_checked_receiver();
    let mut decrypt = ctx
        .stub_call(Feature::Aes, StubId::AesDecryptBlock)?
        .args([bytes(1, 2), bytes(3, 4), key])
        .returns(StubResult::Void)
        .null_checked_receiver();
    if names.decrypt_with_original_key {
        decrypt = decrypt
            .arg(original_key)
            .entry(names.decrypt_entry(names.aes_decrypt));
    }
    let mut r = Registrar::new(registry, ctx, "aes", "com.sun.crypto.provider.AESCrypt");
    r.register(names.aes_encrypt, Receiver::Instance, block.clone(), encrypt)?;
    r.register(names.aes_decrypt, Receiver::Instance, block, decrypt)?;

    // Chaining: (in, inOffset, inLength, out, outOffset), returning inLength.
    let chained = vec![
        JavaType::BYTE_ARRAY,
        JavaType::INT,
        JavaType::INT,
        JavaType::BYTE_ARRAY,
        JavaType::INT,
    ];
    let cbc_key = StubArg::field_array(
        layout,
        0,
        &[crypto.cbc_embedded_cipher_offset, crypto.aes_key_offset],
        JavaKind::Int,
    );
    let cbc_original_key = StubArg::field_array(
        layout,
        0,
        &[crypto.cbc_embedded_cipher_offset, crypto.aes_last_key_offset],
        JavaKind::Byte,
    );
    let iv = StubArg::field_array(layout, 0, &[crypto.cbc_r_offset], JavaKind::Byte);

    let encrypt = ctx
        .stub_call(Feature::Aes, StubId::CbcEncrypt)?
        .args([bytes(1, 2), bytes(4, 5), cbc_key.clone(), iv.clone(), StubArg::Pass(3)])
        .returns(StubResult::Argument(3))
        .null_checked_receiver();
    let mut decrypt = ctx
        .stub_call(Feature::Aes, StubId::CbcDecrypt)?
        .args([bytes(1, 2), bytes(4, 5), cbc_key, iv, StubArg::Pass(3)])
        .returns(StubResult::Argument(3))
        .null_checked_receiver();
    if names.decrypt_with_original_key {
        decrypt = decrypt
            .arg(cbc_original_key)
            .entry(names.decrypt_entry(names.cbc_decrypt));
    }
    let mut r = Registrar::new(registry, ctx, "aes", "com.sun.crypto.provider.CipherBlockChaining");
    r.register(names.cbc_encrypt, Receiver::Instance, chained.clone(), encrypt)?;
    r.register(names.cbc_decrypt, Receiver::Instance, chained, decrypt)
}

pub(crate) fn register_sha(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    let any_sha = [Feature::Sha1, Feature::Sha256, Feature::Sha512]
        .into_iter()
        .any(|feature| ctx.has_feature(feature));
    if ctx.names.has_multi_block_digest && any_sha {
        Registrar::new(registry, ctx, "sha", "sun.security.provider.DigestBase").substitute(
            "implCompressMultiBlock0",
            Receiver::Instance,
            vec![JavaType::BYTE_ARRAY, JavaType::INT, JavaType::INT],
        )?;
    }

    for (feature, stub, owner, state) in [
        (Feature::Sha1, StubId::Sha1ImplCompress, "sun.security.provider.SHA", JavaKind::Int),
        (Feature::Sha256, StubId::Sha256ImplCompress, "sun.security.provider.SHA2", JavaKind::Int),
        (Feature::Sha512, StubId::Sha512ImplCompress, "sun.security.provider.SHA5", JavaKind::Long),
    ] {
        if !ctx.has_feature(feature) {
            continue;
        }
        let call = ctx
            .stub_call(feature, stub)?
            .args([
                StubArg::array(layout, 1, JavaKind::Byte, Some(2)),
                StubArg::field_array(layout, 0, &[layout.crypto.sha_state_offset], state),
            ])
            .returns(StubResult::Void)
            .null_checked_receiver();
        Registrar::new(registry, ctx, "sha", owner).register(
            ctx.names.sha_impl_compress,
            Receiver::Instance,
            vec![JavaType::BYTE_ARRAY, JavaType::INT],
            call,
        )?;
    }
    Ok(())
}

pub(crate) fn register_ghash(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    // processBlocks(data, inOffset, blocks, state, subkeyH); the stub takes the
    // state and subkey first.
    let call = ctx
        .stub_call(Feature::Ghash, StubId::GhashProcessBlocks)?
        .args([
            StubArg::array(layout, 3, JavaKind::Long, None),
            StubArg::array(layout, 4, JavaKind::Long, None),
            StubArg::array(layout, 0, JavaKind::Byte, Some(1)),
            StubArg::Pass(2),
        ])
        .returns(StubResult::Void);
    Registrar::new(registry, ctx, "ghash", "com.sun.crypto.provider.GHASH").register(
        "processBlocks",
        Receiver::Static,
        vec![
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::LONG_ARRAY,
            JavaType::LONG_ARRAY,
        ],
        call,
    )
}

pub(crate) fn register_counter_mode(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    let crypto = &layout.crypto;
    let call = ctx
        .stub_call(Feature::AesCtr, StubId::CounterModeCrypt)?
        .args([
            StubArg::array(layout, 1, JavaKind::Byte, Some(2)),
            StubArg::array(layout, 4, JavaKind::Byte, Some(5)),
            StubArg::field_array(
                layout,
                0,
                &[crypto.ctr_embedded_cipher_offset, crypto.aes_key_offset],
                JavaKind::Int,
            ),
            StubArg::field_array(layout, 0, &[crypto.ctr_counter_offset], JavaKind::Byte),
            StubArg::Pass(3),
            StubArg::field_array(layout, 0, &[crypto.ctr_encrypted_counter_offset], JavaKind::Byte),
            StubArg::FieldAddress {
                object: 0,
                offset: crypto.ctr_used_offset,
            },
        ])
        .null_checked_receiver();
    Registrar::new(registry, ctx, "counter-mode", "com.sun.crypto.provider.CounterMode").register(
        "implCrypt",
        Receiver::Instance,
        vec![
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::BYTE_ARRAY,
            JavaType::INT,
        ],
        call,
    )
}

pub(crate) fn register_base64(ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
    let layout = ctx.layout();
    // encodeBlock(src, sp, sl, dst, dp, isURL); offsets are passed through.
    let call = ctx
        .stub_call(Feature::Base64, StubId::Base64EncodeBlock)?
        .args([
            StubArg::array(layout, 1, JavaKind::Byte, None),
            StubArg::Pass(2),
            StubArg::Pass(3),
            StubArg::array(layout, 4, JavaKind::Byte, None),
            StubArg::Pass(5),
            StubArg::Pass(6),
        ])
        .returns(StubResult::Void)
        .null_checked_receiver();
    Registrar::new(registry, ctx, "base64", "java.util.Base64$Encoder").register(
        "encodeBlock",
        Receiver::Instance,
        vec![
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::BOOLEAN,
        ],
        call,
    )
}
