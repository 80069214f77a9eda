// Shared helpers for the graft-intrinsics integration tests.
#![allow(dead_code)]

use graft_intrinsics::{
    CapabilitySnapshot, CompilerOptions, Feature, JavaType, MethodKey, Pipeline, Plugins, StubId,
    VmEra,
};
use graft_ir::{CallSite, Graph, InvokeKind, JavaKind, NodeId};
use std::sync::Arc;

pub const CRC32_STUB: u64 = 0x1000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Only CRC32 enabled, with its stub at [`CRC32_STUB`].
pub fn crc32_snapshot(era: VmEra) -> Arc<CapabilitySnapshot> {
    Arc::new(
        CapabilitySnapshot::builder(era, "amd64")
            .enable(Feature::Crc32)
            .stub(StubId::UpdateBytesCrc32, CRC32_STUB)
            .build(),
    )
}

/// Every feature enabled and every stub present, at distinct addresses.
pub fn full_snapshot(era: VmEra, arch: &str) -> CapabilitySnapshot {
    let mut builder = CapabilitySnapshot::builder(era, arch);
    for feature in Feature::ALL {
        builder = builder.enable(*feature);
    }
    for (i, stub) in StubId::ALL.iter().enumerate() {
        builder = builder.stub(*stub, 0x10_0000 + 0x100 * i as u64);
    }
    builder.build()
}

pub fn run(caps: Arc<CapabilitySnapshot>) -> Plugins {
    run_with(caps, CompilerOptions::default())
}

pub fn run_with(caps: Arc<CapabilitySnapshot>, options: CompilerOptions) -> Plugins {
    init_logging();
    Pipeline::standard(options)
        .run(caps)
        .expect("pipeline should succeed")
}

pub fn crc32_update_bytes(name: &'static str) -> MethodKey {
    MethodKey::static_method(
        "java.util.zip.CRC32",
        name,
        vec![JavaType::INT, JavaType::BYTE_ARRAY, JavaType::INT, JavaType::INT],
    )
}

/// A recording graph for a call to `key`, with one parameter node per argument.
pub fn call_site(key: &MethodKey, returns: JavaKind, inlining: bool) -> (Graph, Vec<NodeId>) {
    let invoke = if key.has_receiver() {
        InvokeKind::Virtual
    } else {
        InvokeKind::Static
    };
    let mut site = CallSite::new(invoke, returns).at(12);
    if !inlining {
        site = site.out_of_line();
    }
    let mut graph = Graph::new(site);
    let args = graph.parameters(&key.argument_kinds());
    (graph, args)
}
