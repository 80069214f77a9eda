use crate::capability::{Feature, StubId};
use crate::key::MethodKey;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Misuse of the registry lifecycle. These are programmer errors and are never
/// silently ignored.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum RegistryError {
    /// A registration arrived after the registry was sealed.
    #[error("cannot register `{key}`: the registry is sealed")]
    #[diagnostic(
        code(graft::registry::sealed),
        help("all registrations must happen before the registry is sealed")
    )]
    Sealed { key: MethodKey },

    /// `seal` was called a second time.
    #[error("the registry was already sealed")]
    #[diagnostic(code(graft::registry::double_seal))]
    AlreadySealed,

    /// A stub rule targets an address the snapshot does not report for that stub.
    #[error("native stub rule for `{key}` calls `{stub}`, which the capability snapshot does not provide at {address:#x}")]
    #[diagnostic(
        code(graft::registry::unverified_stub),
        help("native stub targets must be taken from the registry's own capability snapshot")
    )]
    UnverifiedStub {
        key: MethodKey,
        stub: StubId,
        address: u64,
    },

    /// A stub rule reads an argument the method does not have.
    #[error("rule for `{key}` reads argument {index}, but the method takes {count}")]
    #[diagnostic(code(graft::registry::argument_out_of_range))]
    ArgumentOutOfRange {
        key: MethodKey,
        index: usize,
        count: usize,
    },
}

/// Failure to build a registry from a capability snapshot.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum PipelineError {
    /// An enabled feature is missing one of its native stubs.
    #[error("feature `{feature}` is enabled but native stub `{stub}` has no address")]
    #[diagnostic(
        code(graft::pipeline::missing_stub),
        help("the VM and the compiler disagree about the platform; no compilation can be trusted")
    )]
    MissingStub { feature: Feature, stub: StubId },

    /// The registry rejected a registration.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),
}

/// A rule could not be applied at a call site.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum ApplyError {
    /// The registry has not been sealed yet.
    #[error("lookup of `{key}` in a registry that has not been sealed")]
    #[diagnostic(code(graft::apply::open_registry))]
    RegistryOpen { key: MethodKey },

    /// An inline-only rule was reached from an out-of-line compilation.
    #[error("`{key}` is inline-only but the call site is not being inlined")]
    #[diagnostic(
        code(graft::apply::inline_only),
        help("inline-only rules must not be used for a stand-alone compilation of the replaced method")
    )]
    InlineOnly { key: MethodKey },

    /// The call site passed the wrong number of arguments.
    #[error("`{key}` takes {expected} arguments but the call site passes {found}")]
    #[diagnostic(code(graft::apply::argument_count))]
    ArgumentCount {
        key: MethodKey,
        expected: usize,
        found: usize,
    },
}

/// Errors loading a host profile.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The profile file could not be read.
    #[error("failed to read host profile {path}")]
    #[diagnostic(code(graft::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The profile is not valid TOML or does not match the schema.
    #[error("invalid host profile: {0}")]
    #[diagnostic(
        code(graft::config::parse),
        help("check the profile's TOML syntax and field types")
    )]
    Parse(#[from] toml::de::Error),

    /// A `[features]` key names no known feature.
    #[error("unknown feature `{0}` in host profile")]
    #[diagnostic(code(graft::config::unknown_feature))]
    UnknownFeature(String),

    /// A `[stubs]` key names no known stub.
    #[error("unknown native stub `{0}` in host profile")]
    #[diagnostic(code(graft::config::unknown_stub))]
    UnknownStub(String),

    /// A stub address is neither an integer nor a parsable number.
    #[error("invalid address `{value}` for native stub `{stub}`")]
    #[diagnostic(
        code(graft::config::invalid_address),
        help("write addresses as integers or as strings such as \"0x7f3a00001000\"")
    )]
    InvalidAddress { stub: String, value: String },
}
