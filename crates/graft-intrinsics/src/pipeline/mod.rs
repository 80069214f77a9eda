//! The registration pipeline: a fixed, ordered list of passes that populate an open
//! [`Registry`] from a capability snapshot and then seal it.

mod checksum;
mod constant_pool;
mod crypto;
mod lang;
mod math;

use crate::capability::{CapabilitySnapshot, Feature, StubId, VmLayout};
use crate::error::PipelineError;
use crate::key::{JavaType, MethodKey};
use crate::names::NameResolution;
use crate::registry::{Guard, Registration, Registry, SealStats};
use crate::rule::{BodyReplacement, NativeStubCall, RewriteRule};
use graft_ir::BytecodeSource;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Compiler-wide switches that gate whole passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Position-independent (ahead-of-time) compilation.
    pub generate_pic: bool,
    /// Collect tiered profiles in position-independent code.
    pub tiered_aot: bool,
    pub inline_during_parsing: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            generate_pic: false,
            tiered_aot: false,
            inline_during_parsing: true,
        }
    }
}

/// Everything a pass may read. Passes never see the registry's entries.
pub struct PassContext<'a> {
    pub caps: &'a CapabilitySnapshot,
    pub options: &'a CompilerOptions,
    pub names: &'a NameResolution,
    pub bytecode: &'a BytecodeSource,
}

impl<'a> PassContext<'a> {
    pub fn layout(&self) -> &'a VmLayout {
        self.caps.layout()
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.caps.has_feature(feature)
    }

    /// A call to `stub`, which `feature` requires.
    pub fn stub_call(&self, feature: Feature, stub: StubId) -> Result<NativeStubCall, PipelineError> {
        self.caps
            .stub_address(stub)
            .map(|address| NativeStubCall::new(stub, address))
            .ok_or(PipelineError::MissingStub { feature, stub })
    }
}

/// A named group of registrations.
pub trait RegistrationPass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Mode and feature gate for the whole pass.
    fn enabled(&self, _ctx: &PassContext<'_>) -> bool {
        true
    }

    fn register(&self, ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError>;
}

type RegisterFn = fn(&PassContext<'_>, &mut Registry) -> Result<(), PipelineError>;

#[derive(Clone, Copy)]
struct BuiltinPass {
    name: &'static str,
    enabled: fn(&PassContext<'_>) -> bool,
    register: RegisterFn,
}

impl RegistrationPass for BuiltinPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn enabled(&self, ctx: &PassContext<'_>) -> bool {
        (self.enabled)(ctx)
    }

    fn register(&self, ctx: &PassContext<'_>, registry: &mut Registry) -> Result<(), PipelineError> {
        (self.register)(ctx, registry)
    }
}

const BUILTIN_PASSES: &[BuiltinPass] = &[
    BuiltinPass {
        name: "object",
        enabled: |_| true,
        register: lang::register_object,
    },
    BuiltinPass {
        name: "class",
        enabled: |_| true,
        register: lang::register_class,
    },
    BuiltinPass {
        name: "system",
        enabled: |_| true,
        register: lang::register_system,
    },
    BuiltinPass {
        name: "thread",
        enabled: |_| true,
        register: lang::register_thread,
    },
    BuiltinPass {
        name: "call-site",
        enabled: |ctx| !ctx.options.generate_pic,
        register: lang::register_call_site,
    },
    BuiltinPass {
        name: "reflection",
        enabled: |_| true,
        register: lang::register_reflection,
    },
    BuiltinPass {
        name: "constant-pool",
        enabled: |_| true,
        register: constant_pool::register_constant_pool,
    },
    BuiltinPass {
        name: "aes",
        enabled: |ctx| ctx.has_feature(Feature::Aes),
        register: crypto::register_aes,
    },
    BuiltinPass {
        name: "crc32",
        enabled: |ctx| ctx.has_feature(Feature::Crc32),
        register: checksum::register_crc32,
    },
    BuiltinPass {
        name: "crc32c",
        enabled: |ctx| ctx.has_feature(Feature::Crc32c),
        register: checksum::register_crc32c,
    },
    BuiltinPass {
        name: "big-integer",
        enabled: |_| true,
        register: math::register_big_integer,
    },
    BuiltinPass {
        name: "sha",
        enabled: |_| true,
        register: crypto::register_sha,
    },
    BuiltinPass {
        name: "ghash",
        enabled: |ctx| ctx.has_feature(Feature::Ghash),
        register: crypto::register_ghash,
    },
    BuiltinPass {
        name: "counter-mode",
        enabled: |ctx| ctx.has_feature(Feature::AesCtr),
        register: crypto::register_counter_mode,
    },
    BuiltinPass {
        name: "base64",
        enabled: |ctx| ctx.has_feature(Feature::Base64),
        register: crypto::register_base64,
    },
    BuiltinPass {
        name: "unsafe",
        enabled: |_| true,
        register: lang::register_unsafe,
    },
    BuiltinPass {
        name: "array",
        enabled: |_| true,
        register: lang::register_array,
    },
    BuiltinPass {
        name: "string",
        enabled: |ctx| ctx.names.has_compact_strings,
        register: lang::register_string,
    },
    BuiltinPass {
        name: "arrays-support",
        enabled: |ctx| ctx.has_feature(Feature::VectorizedMismatch),
        register: math::register_arrays_support,
    },
];

/// Whether a method takes a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    Static,
    Instance,
}

/// Registers rules for methods of one owner class on behalf of one pass.
pub struct Registrar<'a> {
    registry: &'a mut Registry,
    origin: &'static str,
    owner: Cow<'static, str>,
    substitutions: Cow<'static, str>,
    source: BytecodeSource,
    allow_overwrite: bool,
}

impl<'a> Registrar<'a> {
    pub fn new(
        registry: &'a mut Registry,
        ctx: &PassContext<'_>,
        origin: &'static str,
        owner: impl Into<Cow<'static, str>>,
    ) -> Self {
        let owner = owner.into();
        let simple_name = owner.rsplit('.').next().unwrap_or_default();
        let substitutions = Cow::Owned(format!("graft.replacements.{simple_name}Substitutions"));
        Registrar {
            registry,
            origin,
            owner,
            substitutions,
            source: ctx.bytecode.clone(),
            allow_overwrite: false,
        }
    }

    /// Class holding the substitute bodies for this owner.
    pub fn substitutions(mut self, class: &'static str) -> Self {
        self.substitutions = Cow::Borrowed(class);
        self
    }

    /// Later registrations from this registrar are expected to replace earlier ones.
    pub fn allow_overwrite(mut self) -> Self {
        self.allow_overwrite = true;
        self
    }

    pub fn key(&self, name: &'static str, receiver: Receiver, params: Vec<JavaType>) -> MethodKey {
        MethodKey::new(
            self.owner.clone(),
            name,
            params,
            receiver == Receiver::Instance,
        )
    }

    pub fn register(
        &mut self,
        name: &'static str,
        receiver: Receiver,
        params: Vec<JavaType>,
        rule: impl Into<RewriteRule>,
    ) -> Result<(), PipelineError> {
        self.register_guarded(name, receiver, params, rule, Guard::Always)
    }

    pub fn register_guarded(
        &mut self,
        name: &'static str,
        receiver: Receiver,
        params: Vec<JavaType>,
        rule: impl Into<RewriteRule>,
        guard: Guard,
    ) -> Result<(), PipelineError> {
        let mut registration = Registration::new(self.key(name, receiver, params), rule)
            .guarded(guard)
            .origin(self.origin);
        registration.allow_overwrite = self.allow_overwrite;
        self.registry.register(registration)?;
        Ok(())
    }

    /// Replaces the body of `name` with the same-named substitute.
    pub fn substitute(
        &mut self,
        name: &'static str,
        receiver: Receiver,
        params: Vec<JavaType>,
    ) -> Result<(), PipelineError> {
        let body = self.body(name, None);
        self.register(name, receiver, params, body)
    }

    /// Replaces the body of `name` with the substitute called `substitute_name`.
    pub fn substitute_as(
        &mut self,
        name: &'static str,
        substitute_name: &'static str,
        receiver: Receiver,
        params: Vec<JavaType>,
    ) -> Result<(), PipelineError> {
        let renamed = (substitute_name != name).then_some(substitute_name);
        let body = self.body(name, renamed);
        self.register(name, receiver, params, body)
    }

    pub fn substitute_guarded(
        &mut self,
        name: &'static str,
        receiver: Receiver,
        params: Vec<JavaType>,
        guard: Guard,
    ) -> Result<(), PipelineError> {
        let body = self.body(name, None);
        self.register_guarded(name, receiver, params, body, guard)
    }

    fn body(&self, name: &'static str, name_override: Option<&'static str>) -> BodyReplacement {
        BodyReplacement::new(
            self.substitutions.clone(),
            name,
            name_override,
            self.source.clone(),
        )
    }
}

/// Profiling instrumentation selected for position-independent code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingMode {
    TieredAot,
}

/// Graph builder extensions other than invocation plugins, decided by the mode
/// gate alongside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphBuilderPlugins {
    pub method_handle_folding: bool,
    pub inline_during_parsing: bool,
    pub class_initialization: bool,
    pub profiling: Option<ProfilingMode>,
}

impl GraphBuilderPlugins {
    pub fn for_options(options: &CompilerOptions) -> Self {
        GraphBuilderPlugins {
            method_handle_folding: !options.generate_pic,
            inline_during_parsing: options.inline_during_parsing,
            class_initialization: options.generate_pic,
            profiling: (options.generate_pic && options.tiered_aot).then_some(ProfilingMode::TieredAot),
        }
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct Plugins {
    pub registry: Arc<Registry>,
    pub graph_builder: GraphBuilderPlugins,
    pub stats: SealStats,
}

/// Ordered registration passes plus the options that gate them.
pub struct Pipeline {
    options: CompilerOptions,
    bytecode: BytecodeSource,
    passes: Vec<Box<dyn RegistrationPass>>,
}

impl Pipeline {
    /// The built-in passes, in their fixed order.
    pub fn standard(options: CompilerOptions) -> Self {
        Pipeline {
            options,
            bytecode: BytecodeSource::replacements(),
            passes: BUILTIN_PASSES
                .iter()
                .map(|pass| Box::new(*pass) as Box<dyn RegistrationPass>)
                .collect(),
        }
    }

    /// Appends a host-supplied pass after every pass added so far.
    pub fn with_pass(mut self, pass: impl RegistrationPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Where body replacements fetch their substitute bytecode.
    pub fn with_bytecode_source(mut self, source: BytecodeSource) -> Self {
        self.bytecode = source;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs every enabled pass in order and seals the result.
    ///
    /// Fails before any pass runs if an enabled feature lacks one of its stubs.
    pub fn run(&self, caps: Arc<CapabilitySnapshot>) -> Result<Plugins, PipelineError> {
        if let Some((feature, stub)) = caps.missing_stubs().into_iter().next() {
            return Err(PipelineError::MissingStub { feature, stub });
        }

        let names = NameResolution::resolve(&caps);
        let mut registry = Registry::new(Arc::clone(&caps));
        let ctx = PassContext {
            caps: &caps,
            options: &self.options,
            names: &names,
            bytecode: &self.bytecode,
        };
        info!(
            "registering intrinsics for {} ({} era) with {} passes",
            caps.architecture_name(),
            caps.vm_era(),
            self.passes.len()
        );

        for pass in &self.passes {
            if !pass.enabled(&ctx) {
                debug!("pass {} is disabled", pass.name());
                continue;
            }
            let before = registry.pending();
            pass.register(&ctx, &mut registry)?;
            debug!(
                "pass {} queued {} registrations",
                pass.name(),
                registry.pending() - before
            );
        }

        let stats = registry.seal()?;
        Ok(Plugins {
            registry: Arc::new(registry),
            graph_builder: GraphBuilderPlugins::for_options(&self.options),
            stats,
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("bytecode", &self.bytecode)
            .field("passes", &self.pass_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::VmEra;

    #[test]
    fn builtin_passes_run_in_fixed_order() {
        let names = Pipeline::standard(CompilerOptions::default()).pass_names();
        assert_eq!(names.first(), Some(&"object"));
        assert_eq!(names.last(), Some(&"arrays-support"));
        assert_eq!(names.len(), 19);
    }

    #[test]
    fn pic_disables_method_handle_folding() {
        let options = CompilerOptions {
            generate_pic: true,
            tiered_aot: true,
            ..CompilerOptions::default()
        };
        let plugins = GraphBuilderPlugins::for_options(&options);
        assert!(!plugins.method_handle_folding);
        assert!(plugins.class_initialization);
        assert_eq!(plugins.profiling, Some(ProfilingMode::TieredAot));

        let plugins = GraphBuilderPlugins::for_options(&CompilerOptions::default());
        assert!(plugins.method_handle_folding);
        assert_eq!(plugins.profiling, None);
    }

    #[test]
    fn substitutions_class_follows_owner() {
        let caps = CapabilitySnapshot::builder(VmEra::Current, "amd64").build();
        let names = NameResolution::resolve(&caps);
        let options = CompilerOptions::default();
        let bytecode = BytecodeSource::replacements();
        let ctx = PassContext {
            caps: &caps,
            options: &options,
            names: &names,
            bytecode: &bytecode,
        };
        let mut registry = Registry::new(Arc::new(caps.clone()));
        let r = Registrar::new(&mut registry, &ctx, "test", "java.util.zip.CRC32");
        assert_eq!(r.substitutions, "graft.replacements.CRC32Substitutions");
    }
}
