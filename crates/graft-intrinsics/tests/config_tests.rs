mod common;

use common::*;
use graft_intrinsics::{
    ConfigError, Feature, HostProfile, Pipeline, RewriteRule, StubId, VmEra,
};
use std::path::PathBuf;
use std::sync::Arc;

fn profile_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../profiles")
        .join(name)
}

#[test]
fn bundled_amd64_profile_builds_a_registry() {
    init_logging();
    let profile = HostProfile::load(profile_path("amd64-current.toml")).unwrap();
    let caps = profile.snapshot().unwrap();
    assert_eq!(caps.vm_era(), VmEra::Current);
    assert!(caps.missing_stubs().is_empty());
    assert_eq!(caps.stub_address(StubId::UpdateBytesCrc32), Some(0x7f3a_0000_1500));
    assert!(!caps.has_feature(Feature::MontgomeryMultiply));

    let plugins = Pipeline::standard(profile.compiler.clone())
        .run(Arc::new(caps))
        .unwrap();
    let rule = plugins
        .registry
        .lookup(&crc32_update_bytes("updateBytes0"))
        .and_then(RewriteRule::as_native_stub)
        .unwrap();
    assert_eq!(rule.address(), 0x7f3a_0000_1500);
}

#[test]
fn bundled_sparc_profile_is_pic_and_legacy() {
    let profile = HostProfile::load(profile_path("sparc-legacy.toml")).unwrap();
    assert!(profile.compiler.generate_pic);
    assert!(profile.compiler.tiered_aot);
    assert_eq!(profile.layout.array_component_mirror_offset, Some(136));

    let caps = profile.snapshot().unwrap();
    assert_eq!(caps.architecture_name(), "sparcv9");
    assert!(caps.missing_stubs().is_empty());
}

#[test]
fn profile_round_trips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("host.toml");
    std::fs::write(
        &path,
        r#"
era = "legacy"
arch = "aarch64"

[features]
crc32 = true

[stubs]
update_bytes_crc32 = "0xffff_8000_0000_1000"
"#,
    )
    .unwrap();

    let caps = HostProfile::load(&path).unwrap().snapshot().unwrap();
    assert_eq!(caps.vm_era(), VmEra::Legacy);
    assert_eq!(caps.stub_address(StubId::UpdateBytesCrc32), Some(0xffff_8000_0000_1000));
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    match HostProfile::load(&path) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected an io error, got {other:?}"),
    }
}

#[test]
fn malformed_profiles_are_rejected() {
    assert!(matches!(
        HostProfile::from_toml_str("era = \"future\"\narch = \"amd64\"\n"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        HostProfile::from_toml_str("era = \"current\"\narch = \"amd64\"\nextra = 1\n"),
        Err(ConfigError::Parse(_))
    ));

    let profile = HostProfile::from_toml_str(
        "era = \"current\"\narch = \"amd64\"\n[stubs]\nsha3_impl_compress = 1\n",
    )
    .unwrap();
    assert!(matches!(
        profile.snapshot(),
        Err(ConfigError::UnknownStub(name)) if name == "sha3_impl_compress"
    ));
}

#[test]
fn enabled_feature_without_stub_fails_in_the_pipeline() {
    init_logging();
    let profile =
        HostProfile::from_toml_str("era = \"current\"\narch = \"amd64\"\n[features]\nghash = true\n")
            .unwrap();
    let caps = Arc::new(profile.snapshot().unwrap());
    assert!(Pipeline::standard(profile.compiler).run(caps).is_err());
}
