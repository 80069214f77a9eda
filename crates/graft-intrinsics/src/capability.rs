//! What the hosting VM supports, captured once at startup.

use graft_ir::JavaKind;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Major version era of the hosted VM. Several owner and method spellings changed
/// at the boundary between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmEra {
    Legacy,
    Current,
}

impl fmt::Display for VmEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmEra::Legacy => f.write_str("legacy"),
            VmEra::Current => f.write_str("current"),
        }
    }
}

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name { $($variant,)* }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// The snake_case spelling used in host profiles.
            pub fn name(self) -> &'static str {
                match self { $($name::$variant => $text,)* }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)*
                    other => Err(other.to_string()),
                }
            }
        }
    };
}

named_enum! {
    /// A capability the VM may or may not enable for compiled code.
    pub enum Feature {
        Aes => "aes",
        AesCtr => "aes_ctr",
        Crc32 => "crc32",
        Crc32c => "crc32c",
        MultiplyToLen => "multiply_to_len",
        MulAdd => "mul_add",
        MontgomeryMultiply => "montgomery_multiply",
        MontgomerySquare => "montgomery_square",
        SquareToLen => "square_to_len",
        Sha1 => "sha1",
        Sha256 => "sha256",
        Sha512 => "sha512",
        Ghash => "ghash",
        Base64 => "base64",
        VectorizedMismatch => "vectorized_mismatch",
        InlineNotify => "inline_notify",
        InlineNotifyAll => "inline_notify_all",
    }
}

named_enum! {
    /// A precompiled native routine the VM may export to compiled code.
    pub enum StubId {
        AesEncryptBlock => "aes_encrypt_block",
        AesDecryptBlock => "aes_decrypt_block",
        CbcEncrypt => "cbc_encrypt",
        CbcDecrypt => "cbc_decrypt",
        CounterModeCrypt => "counter_mode_crypt",
        UpdateBytesCrc32 => "update_bytes_crc32",
        UpdateBytesCrc32c => "update_bytes_crc32c",
        MultiplyToLen => "multiply_to_len",
        MulAdd => "mul_add",
        MontgomeryMultiply => "montgomery_multiply",
        MontgomerySquare => "montgomery_square",
        SquareToLen => "square_to_len",
        Sha1ImplCompress => "sha1_impl_compress",
        Sha256ImplCompress => "sha256_impl_compress",
        Sha512ImplCompress => "sha512_impl_compress",
        GhashProcessBlocks => "ghash_process_blocks",
        Base64EncodeBlock => "base64_encode_block",
        VectorizedMismatch => "vectorized_mismatch",
        JavaTimeMillis => "java_time_millis",
        JavaTimeNanos => "java_time_nanos",
    }
}

impl Feature {
    /// Native routines that must be present whenever this feature is enabled.
    pub fn required_stubs(self) -> &'static [StubId] {
        match self {
            Feature::Aes => &[
                StubId::AesEncryptBlock,
                StubId::AesDecryptBlock,
                StubId::CbcEncrypt,
                StubId::CbcDecrypt,
            ],
            Feature::AesCtr => &[StubId::CounterModeCrypt],
            Feature::Crc32 => &[StubId::UpdateBytesCrc32],
            Feature::Crc32c => &[StubId::UpdateBytesCrc32c],
            Feature::MultiplyToLen => &[StubId::MultiplyToLen],
            Feature::MulAdd => &[StubId::MulAdd],
            Feature::MontgomeryMultiply => &[StubId::MontgomeryMultiply],
            Feature::MontgomerySquare => &[StubId::MontgomerySquare],
            Feature::SquareToLen => &[StubId::SquareToLen],
            Feature::Sha1 => &[StubId::Sha1ImplCompress],
            Feature::Sha256 => &[StubId::Sha256ImplCompress],
            Feature::Sha512 => &[StubId::Sha512ImplCompress],
            Feature::Ghash => &[StubId::GhashProcessBlocks],
            Feature::Base64 => &[StubId::Base64EncodeBlock],
            Feature::VectorizedMismatch => &[StubId::VectorizedMismatch],
            Feature::InlineNotify | Feature::InlineNotifyAll => &[],
        }
    }
}

impl StubId {
    /// Symbol of the routine as the VM exports it.
    pub fn symbol(self) -> &'static str {
        match self {
            StubId::AesEncryptBlock => "aescrypt_encryptBlock",
            StubId::AesDecryptBlock => "aescrypt_decryptBlock",
            StubId::CbcEncrypt => "cipherBlockChaining_encryptAESCrypt",
            StubId::CbcDecrypt => "cipherBlockChaining_decryptAESCrypt",
            StubId::CounterModeCrypt => "counterMode_AESCrypt",
            StubId::UpdateBytesCrc32 => "updateBytesCRC32",
            StubId::UpdateBytesCrc32c => "updateBytesCRC32C",
            StubId::MultiplyToLen => "multiplyToLen",
            StubId::MulAdd => "mulAdd",
            StubId::MontgomeryMultiply => "montgomeryMultiply",
            StubId::MontgomerySquare => "montgomerySquare",
            StubId::SquareToLen => "squareToLen",
            StubId::Sha1ImplCompress => "sha1_implCompress",
            StubId::Sha256ImplCompress => "sha256_implCompress",
            StubId::Sha512ImplCompress => "sha512_implCompress",
            StubId::GhashProcessBlocks => "ghash_processBlocks",
            StubId::Base64EncodeBlock => "base64_encodeBlock",
            StubId::VectorizedMismatch => "vectorizedMismatch",
            StubId::JavaTimeMillis => "javaTimeMillis",
            StubId::JavaTimeNanos => "javaTimeNanos",
        }
    }
}

/// Structural offsets that are only known on some VM builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutOffset {
    ArrayComponentMirror,
    UnsafeAccessGuard,
}

impl fmt::Display for LayoutOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutOffset::ArrayComponentMirror => f.write_str("array_component_mirror_offset"),
            LayoutOffset::UnsafeAccessGuard => f.write_str("unsafe_access_guard_offset"),
        }
    }
}

/// Field offsets inside the crypto provider objects the cipher stubs read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoLayout {
    /// `AESCrypt.K`, the expanded key schedule.
    pub aes_key_offset: i64,
    /// `AESCrypt.lastKey`, the original key for the alternate decrypt entry.
    pub aes_last_key_offset: i64,
    pub cbc_embedded_cipher_offset: i64,
    pub cbc_r_offset: i64,
    pub ctr_embedded_cipher_offset: i64,
    pub ctr_counter_offset: i64,
    pub ctr_encrypted_counter_offset: i64,
    pub ctr_used_offset: i64,
    /// The `state` array shared by the SHA digest variants.
    pub sha_state_offset: i64,
}

impl Default for CryptoLayout {
    fn default() -> Self {
        CryptoLayout {
            aes_key_offset: 16,
            aes_last_key_offset: 20,
            cbc_embedded_cipher_offset: 12,
            cbc_r_offset: 24,
            ctr_embedded_cipher_offset: 12,
            ctr_counter_offset: 16,
            ctr_encrypted_counter_offset: 20,
            ctr_used_offset: 24,
            sha_state_offset: 28,
        }
    }
}

/// VM internal layout the inline rules compute addresses against.
///
/// Defaults describe a 64-bit VM with compressed class pointers and references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmLayout {
    /// Offset of the length field in an array header.
    pub array_length_offset: i64,
    /// Size in bytes of a heap reference.
    pub heap_oop_size: i64,
    /// `JavaThread::_threadObj`.
    pub thread_object_offset: i64,
    /// `InstanceKlass::_constants`.
    pub instance_klass_constants_offset: i64,
    /// `sizeof(ConstantPool)`; pool entries start right after the header.
    pub constant_pool_size: i64,
    /// `ConstantPool::_length`.
    pub constant_pool_length_offset: i64,
    /// `ArrayKlass::_component_mirror`, absent on builds that dropped the field.
    pub array_component_mirror_offset: Option<i64>,
    /// `JavaThread::_doing_unsafe_access`, present when guarded unsafe copies exist.
    pub unsafe_access_guard_offset: Option<i64>,
    pub crypto: CryptoLayout,
}

impl Default for VmLayout {
    fn default() -> Self {
        VmLayout {
            array_length_offset: 12,
            heap_oop_size: 4,
            thread_object_offset: 360,
            instance_klass_constants_offset: 216,
            constant_pool_size: 80,
            constant_pool_length_offset: 72,
            array_component_mirror_offset: None,
            unsafe_access_guard_offset: None,
            crypto: CryptoLayout::default(),
        }
    }
}

impl VmLayout {
    /// Distance in bytes between an element and the next in an array of `kind`.
    pub fn array_index_scale(&self, kind: JavaKind) -> i64 {
        match kind {
            JavaKind::Object => self.heap_oop_size,
            other => i64::from(other.byte_count()),
        }
    }

    /// Offset of element zero in an array of `kind`.
    pub fn array_base_offset(&self, kind: JavaKind) -> i64 {
        let header_end = self.array_length_offset + 4;
        let align = self.array_index_scale(kind).clamp(1, 8);
        (header_end + align - 1) / align * align
    }

    pub fn offset(&self, which: LayoutOffset) -> Option<i64> {
        match which {
            LayoutOffset::ArrayComponentMirror => self.array_component_mirror_offset,
            LayoutOffset::UnsafeAccessGuard => self.unsafe_access_guard_offset,
        }
    }
}

/// Immutable description of the running platform. Built once by the host and shared
/// by reference for the lifetime of every registry built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilitySnapshot {
    era: VmEra,
    arch: String,
    features: FxHashMap<Feature, bool>,
    stubs: FxHashMap<StubId, u64>,
    layout: VmLayout,
}

impl CapabilitySnapshot {
    pub fn builder(era: VmEra, arch: impl Into<String>) -> CapabilitySnapshotBuilder {
        CapabilitySnapshotBuilder {
            snapshot: CapabilitySnapshot {
                era,
                arch: arch.into(),
                features: FxHashMap::default(),
                stubs: FxHashMap::default(),
                layout: VmLayout::default(),
            },
        }
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }

    /// Address of a native routine. A zero address counts as absent.
    pub fn stub_address(&self, stub: StubId) -> Option<u64> {
        self.stubs.get(&stub).copied().filter(|address| *address != 0)
    }

    pub fn vm_era(&self) -> VmEra {
        self.era
    }

    pub fn architecture_name(&self) -> &str {
        &self.arch
    }

    pub fn layout(&self) -> &VmLayout {
        &self.layout
    }

    /// Enabled features in declaration order.
    pub fn enabled_features(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL
            .iter()
            .copied()
            .filter(|feature| self.has_feature(*feature))
    }

    /// Every (feature, stub) pair where the feature is enabled but the stub has no
    /// address. A non-empty result means the snapshot cannot be trusted.
    pub fn missing_stubs(&self) -> Vec<(Feature, StubId)> {
        self.enabled_features()
            .flat_map(|feature| {
                feature
                    .required_stubs()
                    .iter()
                    .filter(|stub| self.stub_address(**stub).is_none())
                    .map(move |stub| (feature, *stub))
            })
            .collect()
    }
}

pub struct CapabilitySnapshotBuilder {
    snapshot: CapabilitySnapshot,
}

impl CapabilitySnapshotBuilder {
    pub fn feature(mut self, feature: Feature, enabled: bool) -> Self {
        self.snapshot.features.insert(feature, enabled);
        self
    }

    pub fn enable(self, feature: Feature) -> Self {
        self.feature(feature, true)
    }

    pub fn stub(mut self, stub: StubId, address: u64) -> Self {
        self.snapshot.stubs.insert(stub, address);
        self
    }

    pub fn layout(mut self, layout: VmLayout) -> Self {
        self.snapshot.layout = layout;
        self
    }

    pub fn build(self) -> CapabilitySnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_layout_puts_every_array_base_at_sixteen() {
        let layout = VmLayout::default();
        for kind in [JavaKind::Byte, JavaKind::Int, JavaKind::Long, JavaKind::Object] {
            assert_eq!(layout.array_base_offset(kind), 16, "{kind}");
        }
    }

    #[test]
    fn uncompressed_layout_aligns_wide_elements() {
        let layout = VmLayout {
            array_length_offset: 16,
            heap_oop_size: 8,
            ..VmLayout::default()
        };
        assert_eq!(layout.array_base_offset(JavaKind::Byte), 20);
        assert_eq!(layout.array_base_offset(JavaKind::Int), 20);
        assert_eq!(layout.array_base_offset(JavaKind::Long), 24);
        assert_eq!(layout.array_base_offset(JavaKind::Object), 24);
    }

    #[test]
    fn zero_stub_address_counts_as_absent() {
        let caps = CapabilitySnapshot::builder(VmEra::Current, "amd64")
            .enable(Feature::Crc32)
            .stub(StubId::UpdateBytesCrc32, 0)
            .build();
        assert_eq!(caps.stub_address(StubId::UpdateBytesCrc32), None);
        assert_eq!(
            caps.missing_stubs(),
            vec![(Feature::Crc32, StubId::UpdateBytesCrc32)]
        );
    }

    #[test]
    fn disabled_features_need_no_stubs() {
        let caps = CapabilitySnapshot::builder(VmEra::Legacy, "aarch64")
            .feature(Feature::Aes, false)
            .enable(Feature::InlineNotify)
            .build();
        assert!(caps.missing_stubs().is_empty());
        assert_eq!(caps.enabled_features().collect::<Vec<_>>(), vec![Feature::InlineNotify]);
    }

    #[test]
    fn feature_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>(), Ok(*feature));
        }
        assert_eq!("sha3".parse::<Feature>(), Err("sha3".to_string()));
    }
}
