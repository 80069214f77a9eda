//! Host profiles: a TOML description of a capability snapshot plus compiler options.
//!
//! ```toml
//! era = "current"
//! arch = "amd64"
//!
//! [features]
//! crc32 = true
//!
//! [stubs]
//! update_bytes_crc32 = 0x1000
//!
//! [layout]
//! thread_object_offset = 360
//!
//! [compiler]
//! generate_pic = false
//! ```
//!
//! Loading is purely structural. A feature enabled without its stub loads fine and
//! is rejected later by the pipeline.

use crate::capability::{CapabilitySnapshot, Feature, StubId, VmEra, VmLayout};
use crate::error::ConfigError;
use crate::pipeline::CompilerOptions;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A stub address, either as a TOML integer or as a decimal or `0x` string for
/// addresses that do not fit a signed 64-bit integer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Number(u64),
    Text(String),
}

impl Address {
    fn resolve(&self, stub: &str) -> Result<u64, ConfigError> {
        let text = match self {
            Address::Number(address) => return Ok(*address),
            Address::Text(text) => text.trim(),
        };
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
            None => text.replace('_', "").parse::<u64>(),
        };
        parsed.map_err(|_| ConfigError::InvalidAddress {
            stub: stub.to_string(),
            value: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostProfile {
    pub era: VmEra,
    pub arch: String,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub stubs: BTreeMap<String, Address>,
    #[serde(default)]
    pub layout: VmLayout,
    #[serde(default)]
    pub compiler: CompilerOptions,
}

impl HostProfile {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profile = Self::from_toml_str(&source)?;
        log::debug!(
            "loaded host profile {} ({} era, {})",
            path.display(),
            profile.era,
            profile.arch
        );
        Ok(profile)
    }

    /// Builds the capability snapshot the profile describes.
    pub fn snapshot(&self) -> Result<CapabilitySnapshot, ConfigError> {
        let mut builder = CapabilitySnapshot::builder(self.era, self.arch.clone()).layout(self.layout.clone());
        for (name, enabled) in &self.features {
            let feature: Feature = name
                .parse()
                .map_err(ConfigError::UnknownFeature)?;
            builder = builder.feature(feature, *enabled);
        }
        for (name, address) in &self.stubs {
            let stub: StubId = name.parse().map_err(ConfigError::UnknownStub)?;
            builder = builder.stub(stub, address.resolve(name)?);
        }
        Ok(builder.build())
    }
}
