//! # graft intrinsics
//!
//! The intrinsic substitution layer of the graft JIT front end. While the translator
//! turns bytecode into an IR graph it asks a sealed [`Registry`] whether the method
//! being called has a [`RewriteRule`]. On a hit the rule replaces the call with a
//! small inline subgraph, a direct call to a native stub, or a substitute method
//! body, and the generic invoke is never emitted.
//!
//! The registry is built once per capability snapshot by the [`Pipeline`], either
//! directly or on first use through [`LazyIntrinsics`], and is read-only afterwards.
//!
//! ```no_run
//! use graft_intrinsics::{CapabilitySnapshot, CompilerOptions, Pipeline, VmEra};
//! use std::sync::Arc;
//!
//! let caps = Arc::new(CapabilitySnapshot::builder(VmEra::Current, "amd64").build());
//! let plugins = Pipeline::standard(CompilerOptions::default()).run(caps)?;
//! println!("{}", plugins.registry.dump());
//! # Ok::<(), graft_intrinsics::PipelineError>(())
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod key;
pub mod lazy;
pub mod names;
pub mod pipeline;
pub mod registry;
pub mod rule;

pub use capability::{
    CapabilitySnapshot, CapabilitySnapshotBuilder, CryptoLayout, Feature, LayoutOffset, StubId,
    VmEra, VmLayout,
};
pub use config::HostProfile;
pub use error::{ApplyError, ConfigError, PipelineError, RegistryError};
pub use key::{JavaType, MethodKey};
pub use lazy::LazyIntrinsics;
pub use names::NameResolution;
pub use pipeline::{
    CompilerOptions, GraphBuilderPlugins, PassContext, Pipeline, Plugins, ProfilingMode,
    Receiver, Registrar, RegistrationPass,
};
pub use registry::{Entry, Guard, Registration, Registry, RegistryState, SealStats};
pub use rule::{BodyReplacement, InlineIntrinsic, NativeStubCall, RewriteRule, StubArg, StubResult};
