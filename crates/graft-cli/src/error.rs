use graft_intrinsics::{ApplyError, ConfigError, MethodKey, PipelineError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    /// The host profile could not be loaded.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// The pipeline refused the profile's snapshot.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),

    /// The rule could not be applied to the synthetic call site.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Apply(#[from] ApplyError),

    /// Nothing is registered under the requested key.
    #[error("no rewrite rule for `{key}`")]
    #[diagnostic(
        code(graft::cli::no_rule),
        help("keys match exactly; check the parameter types and whether the method takes a receiver")
    )]
    NoRule { key: MethodKey },
}
