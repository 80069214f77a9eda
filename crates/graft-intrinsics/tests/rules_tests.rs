mod common;

use common::*;
use expect_test::expect;
use graft_intrinsics::{
    ApplyError, CapabilitySnapshot, Feature, JavaType, MethodKey, Registry, StubId, VmEra,
};
use graft_ir::{JavaKind, LocationIdentity, MethodRef, Node};
use std::sync::Arc;

fn baseline() -> Arc<Registry> {
    run(Arc::new(CapabilitySnapshot::builder(VmEra::Current, "amd64").build())).registry
}

/// Every feature on, so every stub pass registers.
fn full(era: VmEra) -> Arc<Registry> {
    run(Arc::new(full_snapshot(era, "amd64"))).registry
}

/// Applies the rule for `key` at a fresh call site and renders the graph.
fn emitted(registry: &Registry, key: &MethodKey, returns: JavaKind) -> String {
    let (mut graph, args) = call_site(key, returns, true);
    assert_eq!(registry.try_apply(&mut graph, key, &args), Ok(true), "{key}");
    graph.to_string()
}

#[test]
fn crc32_stub_call_graph() {
    let registry = run(crc32_snapshot(VmEra::Current)).registry;
    let key = crc32_update_bytes("updateBytes0");
    let (mut graph, args) = call_site(&key, JavaKind::Int, true);

    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(true));
    expect![[r#"
        n0 = param(0: int)
        n1 = param(1: object)
        n2 = param(2: int)
        n3 = param(3: int)
        n4 = const long 16
        n5 = sext n2 to long
        n6 = add n4, n5
        n7 = object_address n1 + n6
        n8 = foreign_call updateBytesCRC32@0x1000(n0, n7, n3) -> int
        push int n8
    "#]]
    .assert_eq(&graph.to_string());
}

#[test]
fn miss_falls_through_to_the_generic_invoke() {
    let registry = baseline();
    let key = MethodKey::static_method("java.lang.Math", "sqrt", vec![JavaType::Primitive(JavaKind::Double)]);
    let (mut graph, args) = call_site(&key, JavaKind::Double, true);
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(false));
    assert_eq!(graph.len(), args.len());
    assert!(graph.stack().is_empty());
}

#[test]
fn inline_only_rule_is_refused_out_of_line() {
    let registry = baseline();
    let clone = MethodKey::instance_method("java.lang.Object", "clone", vec![]);

    let (mut graph, args) = call_site(&clone, JavaKind::Object, false);
    assert_eq!(
        registry.try_apply(&mut graph, &clone, &args),
        Err(ApplyError::InlineOnly { key: clone.clone() })
    );
    assert_eq!(graph.len(), 1);

    let (mut graph, args) = call_site(&clone, JavaKind::Object, true);
    assert_eq!(registry.try_apply(&mut graph, &clone, &args), Ok(true));
    let (check, _) = graph.find(|n| matches!(n, Node::NullCheck { .. })).unwrap();
    let (copy, node) = graph.find(|n| matches!(n, Node::ObjectClone { .. })).unwrap();
    assert!(check < copy);
    assert!(matches!(node, Node::ObjectClone { bci: 12, object, .. } if *object == check));
    assert_eq!(graph.stack(), &[(JavaKind::Object, copy)]);
}

#[test]
fn argument_count_is_checked_at_the_call_boundary() {
    let registry = run(crc32_snapshot(VmEra::Current)).registry;
    let key = crc32_update_bytes("updateBytes0");
    let (mut graph, args) = call_site(&key, JavaKind::Int, true);
    assert_eq!(
        registry.try_apply(&mut graph, &key, &args[..3]),
        Err(ApplyError::ArgumentCount {
            key,
            expected: 4,
            found: 3,
        })
    );
}

#[test]
fn unparsable_substitute_declines() {
    let registry = baseline();
    let key = MethodKey::instance_method("java.lang.Object", "hashCode", vec![]);
    let (mut graph, args) = call_site(&key, JavaKind::Int, true);
    graph.reject_substitute(MethodRef::new("graft.replacements.ObjectSubstitutions", "hashCode"));
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(false));

    let (mut graph, args) = call_site(&key, JavaKind::Int, true);
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(true));
    assert!(graph.find(|n| matches!(n, Node::Substitute { .. })).is_some());
}

#[test]
fn constant_call_site_target_folds() {
    let registry = baseline();
    let key = MethodKey::instance_method("java.lang.invoke.ConstantCallSite", "getTarget", vec![]);

    let (mut graph, args) = call_site(&key, JavaKind::Object, true);
    let target = graph.parameter(1, JavaKind::Object);
    graph.bind_call_site_target(args[0], target);
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(true));
    assert_eq!(graph.stack(), &[(JavaKind::Object, target)]);
    assert!(graph.find(|n| matches!(n, Node::CallSiteTarget { .. })).is_none());

    let (mut graph, args) = call_site(&key, JavaKind::Object, true);
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(true));
    assert!(graph.find(|n| matches!(n, Node::CallSiteTarget { .. })).is_some());
}

#[test]
fn current_thread_reads_the_thread_object_field() {
    let registry = baseline();
    let key = MethodKey::static_method("java.lang.Thread", "currentThread", vec![]);
    let (mut graph, args) = call_site(&key, JavaKind::Object, true);
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(true));
    assert!(graph
        .find(|n| *n == Node::Constant { kind: JavaKind::Long, value: 360 })
        .is_some());
    let (read, _) = graph
        .find(|n| {
            matches!(
                n,
                Node::Read {
                    location: LocationIdentity::Named { name: "JavaThread::_threadObj", .. },
                    ..
                }
            )
        })
        .unwrap();
    assert_eq!(graph.stack(), &[(JavaKind::Object, read)]);
}

#[test]
fn square_to_len_returns_the_result_array() {
    let caps = CapabilitySnapshot::builder(VmEra::Current, "amd64")
        .enable(Feature::SquareToLen)
        .stub(StubId::SquareToLen, 0x3000)
        .build();
    let registry = run(Arc::new(caps)).registry;
    let key = MethodKey::static_method(
        "java.math.BigInteger",
        "implSquareToLen",
        vec![JavaType::INT_ARRAY, JavaType::INT, JavaType::INT_ARRAY, JavaType::INT],
    );
    let (mut graph, args) = call_site(&key, JavaKind::Object, true);
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(true));
    assert_eq!(graph.stack(), &[(JavaKind::Object, args[2])]);
    assert!(matches!(
        graph.find(|n| matches!(n, Node::ForeignCall { .. })).unwrap().1,
        Node::ForeignCall { result: JavaKind::Void, .. }
    ));
}

#[test]
fn stub_rules_check_the_receiver() {
    let caps = CapabilitySnapshot::builder(VmEra::Current, "amd64")
        .enable(Feature::Base64)
        .stub(StubId::Base64EncodeBlock, 0x4000)
        .build();
    let registry = run(Arc::new(caps)).registry;
    let key = MethodKey::instance_method(
        "java.util.Base64$Encoder",
        "encodeBlock",
        vec![
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::BOOLEAN,
        ],
    );
    let (mut graph, args) = call_site(&key, JavaKind::Void, true);
    assert_eq!(registry.try_apply(&mut graph, &key, &args), Ok(true));
    assert_eq!(graph.count(|n| matches!(n, Node::NullCheck { .. })), 1);
    assert!(graph.stack().is_empty());
}

#[test]
fn crc32_byte_buffer_adds_the_sign_extended_offset() {
    let registry = run(crc32_snapshot(VmEra::Current)).registry;
    let key = MethodKey::static_method(
        "java.util.zip.CRC32",
        "updateByteBuffer0",
        vec![JavaType::INT, JavaType::LONG, JavaType::INT, JavaType::INT],
    );
    expect![[r#"
        n0 = param(0: int)
        n1 = param(1: long)
        n2 = param(2: int)
        n3 = param(3: int)
        n4 = sext n2 to long
        n5 = add n1, n4
        n6 = foreign_call updateBytesCRC32@0x1000(n0, n5, n3) -> int
        push int n6
    "#]]
    .assert_eq(&emitted(&registry, &key, JavaKind::Int));
}

#[test]
fn crc32c_passes_end_minus_start_as_length() {
    let registry = full(VmEra::Current);
    let bytes = MethodKey::static_method(
        "java.util.zip.CRC32C",
        "updateBytes",
        vec![JavaType::INT, JavaType::BYTE_ARRAY, JavaType::INT, JavaType::INT],
    );
    expect![[r#"
        n0 = param(0: int)
        n1 = param(1: object)
        n2 = param(2: int)
        n3 = param(3: int)
        n4 = const long 16
        n5 = sext n2 to long
        n6 = add n4, n5
        n7 = object_address n1 + n6
        n8 = sub n3, n2
        n9 = foreign_call updateBytesCRC32C@0x100600(n0, n7, n8) -> int
        push int n9
    "#]]
    .assert_eq(&emitted(&registry, &bytes, JavaKind::Int));

    let direct = MethodKey::static_method(
        "java.util.zip.CRC32C",
        "updateDirectByteBuffer",
        vec![JavaType::INT, JavaType::LONG, JavaType::INT, JavaType::INT],
    );
    expect![[r#"
        n0 = param(0: int)
        n1 = param(1: long)
        n2 = param(2: int)
        n3 = param(3: int)
        n4 = sext n2 to long
        n5 = add n1, n4
        n6 = sub n3, n2
        n7 = foreign_call updateBytesCRC32C@0x100600(n0, n5, n6) -> int
        push int n7
    "#]]
    .assert_eq(&emitted(&registry, &direct, JavaKind::Int));
}

#[test]
fn ghash_passes_state_and_subkey_before_the_data() {
    let registry = full(VmEra::Current);
    let key = MethodKey::static_method(
        "com.sun.crypto.provider.GHASH",
        "processBlocks",
        vec![
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::LONG_ARRAY,
            JavaType::LONG_ARRAY,
        ],
    );
    expect![[r#"
        n0 = param(0: object)
        n1 = param(1: int)
        n2 = param(2: int)
        n3 = param(3: object)
        n4 = param(4: object)
        n5 = const long 16
        n6 = object_address n3 + n5
        n7 = const long 16
        n8 = object_address n4 + n7
        n9 = const long 16
        n10 = sext n1 to long
        n11 = add n9, n10
        n12 = object_address n0 + n11
        n13 = foreign_call ghash_processBlocks@0x100f00(n6, n8, n12, n2) -> void
    "#]]
    .assert_eq(&emitted(&registry, &key, JavaKind::Void));
}

#[test]
fn counter_mode_reads_cipher_state_from_the_receiver() {
    let registry = full(VmEra::Current);
    let key = MethodKey::instance_method(
        "com.sun.crypto.provider.CounterMode",
        "implCrypt",
        vec![
            JavaType::BYTE_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::BYTE_ARRAY,
            JavaType::INT,
        ],
    );
    expect![[r#"
        n0 = param(0: object)
        n1 = param(1: object)
        n2 = param(2: int)
        n3 = param(3: int)
        n4 = param(4: object)
        n5 = param(5: int)
        n6 = null_check n0
        n7 = const long 16
        n8 = sext n2 to long
        n9 = add n7, n8
        n10 = object_address n1 + n9
        n11 = const long 16
        n12 = sext n5 to long
        n13 = add n11, n12
        n14 = object_address n4 + n13
        n15 = const long 12
        n16 = address n6 + n15
        n17 = read object [n16] @ any
        n18 = const long 16
        n19 = address n17 + n18
        n20 = read object [n19] @ any
        n21 = const long 16
        n22 = object_address n20 + n21
        n23 = const long 16
        n24 = address n6 + n23
        n25 = read object [n24] @ any
        n26 = const long 16
        n27 = object_address n25 + n26
        n28 = const long 20
        n29 = address n6 + n28
        n30 = read object [n29] @ any
        n31 = const long 16
        n32 = object_address n30 + n31
        n33 = const long 24
        n34 = object_address n6 + n33
        n35 = foreign_call counterMode_AESCrypt@0x100400(n10, n14, n22, n27, n3, n32, n34) -> int
        push int n35
    "#]]
    .assert_eq(&emitted(&registry, &key, JavaKind::Int));
}

#[test]
fn vectorized_mismatch_addresses_both_operands() {
    let registry = full(VmEra::Current);
    let key = MethodKey::static_method(
        "jdk.internal.util.ArraysSupport",
        "vectorizedMismatch",
        vec![
            JavaType::OBJECT,
            JavaType::LONG,
            JavaType::OBJECT,
            JavaType::LONG,
            JavaType::INT,
            JavaType::INT,
        ],
    );
    expect![[r#"
        n0 = param(0: object)
        n1 = param(1: long)
        n2 = param(2: object)
        n3 = param(3: long)
        n4 = param(4: int)
        n5 = param(5: int)
        n6 = object_address n0 + n1
        n7 = object_address n2 + n3
        n8 = foreign_call vectorizedMismatch@0x101100(n6, n7, n4, n5) -> int
        push int n8
    "#]]
    .assert_eq(&emitted(&registry, &key, JavaKind::Int));
}

#[test]
fn mul_add_counts_the_offset_from_the_end_of_out() {
    let registry = full(VmEra::Current);
    let key = MethodKey::static_method(
        "java.math.BigInteger",
        "implMulAdd",
        vec![
            JavaType::INT_ARRAY,
            JavaType::INT_ARRAY,
            JavaType::INT,
            JavaType::INT,
            JavaType::INT,
        ],
    );
    expect![[r#"
        n0 = param(0: object)
        n1 = param(1: object)
        n2 = param(2: int)
        n3 = param(3: int)
        n4 = param(4: int)
        n5 = const long 16
        n6 = object_address n0 + n5
        n7 = const long 16
        n8 = object_address n1 + n7
        n9 = null_check n0
        n10 = const long 12
        n11 = object_address n9 + n10
        n12 = read int [n11] @ arrayLength (final)
        n13 = sub n12, n2
        n14 = foreign_call mulAdd@0x100800(n6, n8, n13, n3, n4) -> int
        push int n14
    "#]]
    .assert_eq(&emitted(&registry, &key, JavaKind::Int));
}

#[test]
fn constant_pool_reads_go_through_the_holder_class() {
    let registry = baseline();
    let size = MethodKey::instance_method(
        "jdk.internal.reflect.ConstantPool",
        "getSize0",
        vec![JavaType::OBJECT],
    );
    expect![[r#"
        n0 = param(0: object)
        n1 = param(1: object)
        n2 = null_check n0
        n3 = null_check n1
        n4 = class_get_hub n3
        n5 = const long 216
        n6 = address n4 + n5
        n7 = read long [n6] @ InstanceKlass::_constants (final)
        n8 = const long 72
        n9 = address n7 + n8
        n10 = read int [n9] @ ConstantPool::_length (final)
        push int n10
    "#]]
    .assert_eq(&emitted(&registry, &size, JavaKind::Int));

    let long_at = MethodKey::instance_method(
        "jdk.internal.reflect.ConstantPool",
        "getLongAt0",
        vec![JavaType::OBJECT, JavaType::INT],
    );
    expect![[r#"
        n0 = param(0: object)
        n1 = param(1: object)
        n2 = param(2: int)
        n3 = null_check n0
        n4 = null_check n1
        n5 = class_get_hub n4
        n6 = const long 216
        n7 = address n5 + n6
        n8 = read long [n7] @ InstanceKlass::_constants (final)
        n9 = const int 3
        n10 = sext n2 to long
        n11 = shl n10, n9
        n12 = const long 80
        n13 = add n11, n12
        n14 = address n8 + n13
        n15 = read long [n14] @ long[]
        push long n15
    "#]]
    .assert_eq(&emitted(&registry, &long_at, JavaKind::Long));
}

#[test]
fn multiply_to_len_is_spelled_per_era_and_uses_the_static_substitute() {
    let params = || {
        vec![
            JavaType::INT_ARRAY,
            JavaType::INT,
            JavaType::INT_ARRAY,
            JavaType::INT,
            JavaType::INT_ARRAY,
        ]
    };
    for (era, name, other) in [
        (VmEra::Current, "implMultiplyToLen", "multiplyToLen"),
        (VmEra::Legacy, "multiplyToLen", "implMultiplyToLen"),
    ] {
        let registry = full(era);
        let miss = MethodKey::static_method("java.math.BigInteger", other, params());
        assert!(registry.lookup(&miss).is_none(), "{era}: {miss}");

        let key = MethodKey::static_method("java.math.BigInteger", name, params());
        expect![[r#"
            n0 = param(0: object)
            n1 = param(1: int)
            n2 = param(2: object)
            n3 = param(3: int)
            n4 = param(4: object)
            n5 = substitute graft.replacements.BigIntegerSubstitutions.multiplyToLenStatic from replacements(n0, n1, n2, n3, n4)
            push object n5
        "#]]
        .assert_eq(&emitted(&registry, &key, JavaKind::Object));
    }
}
