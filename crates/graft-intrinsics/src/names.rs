use crate::capability::{CapabilitySnapshot, LayoutOffset, VmEra};

/// Owner and method spellings that depend on the VM era, the target architecture
/// or the VM layout. Computed once per pipeline run and read by every pass, so no
/// pass ever branches on the era itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameResolution {
    pub cbc_encrypt: &'static str,
    pub cbc_decrypt: &'static str,
    pub aes_encrypt: &'static str,
    pub aes_decrypt: &'static str,
    /// Decryption must go through the entry point that also receives the original
    /// (unexpanded) key.
    pub decrypt_with_original_key: bool,
    pub reflection_class: &'static str,
    pub constant_pool_class: &'static str,
    pub unsafe_class: &'static str,
    pub crc32_update_bytes: &'static str,
    pub crc32_update_byte_buffer: &'static str,
    pub multiply_to_len: &'static str,
    pub sha_impl_compress: &'static str,
    pub copy_memory_substitute: &'static str,
    /// `StringUTF16` and `DigestBase.implCompressMultiBlock0` only exist in the
    /// current era.
    pub has_compact_strings: bool,
    pub has_multi_block_digest: bool,
}

const DECRYPT_SUFFIX_ARCHS: &[&str] = &["sparc", "sparcv9"];

impl NameResolution {
    pub fn resolve(caps: &CapabilitySnapshot) -> Self {
        let legacy = caps.vm_era() == VmEra::Legacy;
        let decrypt_with_original_key = DECRYPT_SUFFIX_ARCHS
            .iter()
            .any(|arch| *arch == caps.architecture_name());
        let guarded_copy = caps
            .layout()
            .offset(LayoutOffset::UnsafeAccessGuard)
            .is_some();

        NameResolution {
            cbc_encrypt: if legacy { "encrypt" } else { "implEncrypt" },
            cbc_decrypt: if legacy { "decrypt" } else { "implDecrypt" },
            aes_encrypt: if legacy { "encryptBlock" } else { "implEncryptBlock" },
            aes_decrypt: if legacy { "decryptBlock" } else { "implDecryptBlock" },
            decrypt_with_original_key,
            reflection_class: if legacy {
                "sun.reflect.Reflection"
            } else {
                "jdk.internal.reflect.Reflection"
            },
            constant_pool_class: if legacy {
                "sun.reflect.ConstantPool"
            } else {
                "jdk.internal.reflect.ConstantPool"
            },
            unsafe_class: if legacy {
                "sun.misc.Unsafe"
            } else {
                "jdk.internal.misc.Unsafe"
            },
            crc32_update_bytes: if legacy { "updateBytes" } else { "updateBytes0" },
            crc32_update_byte_buffer: if legacy {
                "updateByteBuffer"
            } else {
                "updateByteBuffer0"
            },
            multiply_to_len: if legacy {
                "multiplyToLen"
            } else {
                "implMultiplyToLen"
            },
            sha_impl_compress: if legacy { "implCompress" } else { "implCompress0" },
            copy_memory_substitute: if guarded_copy {
                "copyMemoryGuarded"
            } else {
                "copyMemory"
            },
            has_compact_strings: !legacy,
            has_multi_block_digest: !legacy,
        }
    }

    /// Entry point name for `decrypt`, with the original-key suffix when needed.
    pub fn decrypt_entry(&self, base: &'static str) -> String {
        if self.decrypt_with_original_key {
            format!("{base}WithOriginalKey")
        } else {
            base.to_string()
        }
    }
}
