use crate::capability::CapabilitySnapshot;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, Plugins};
use crate::registry::Registry;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Defers the registration pipeline until a compilation first needs the registry.
///
/// The pipeline runs at most once no matter how many threads race on
/// [`get`](LazyIntrinsics::get). A fatal pipeline error is kept and handed to every
/// caller, so no compilation proceeds against a half-built registry.
pub struct LazyIntrinsics {
    caps: Arc<CapabilitySnapshot>,
    pipeline: Pipeline,
    plugins: OnceCell<Result<Plugins, PipelineError>>,
}

impl LazyIntrinsics {
    pub fn new(caps: Arc<CapabilitySnapshot>, pipeline: Pipeline) -> Self {
        LazyIntrinsics {
            caps,
            pipeline,
            plugins: OnceCell::new(),
        }
    }

    /// Returns the plugins, running the pipeline first if needed.
    pub fn get(&self) -> Result<&Plugins, PipelineError> {
        self.plugins
            .get_or_init(|| {
                log::debug!("first use of the intrinsic registry, running the pipeline");
                self.pipeline.run(Arc::clone(&self.caps))
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn registry(&self) -> Result<Arc<Registry>, PipelineError> {
        self.get().map(|plugins| Arc::clone(&plugins.registry))
    }

    pub fn is_initialized(&self) -> bool {
        self.plugins.get().is_some()
    }

    pub fn capabilities(&self) -> &Arc<CapabilitySnapshot> {
        &self.caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Feature, VmEra};
    use crate::pipeline::CompilerOptions;

    #[test]
    fn pipeline_runs_on_first_use_only() {
        let caps = Arc::new(CapabilitySnapshot::builder(VmEra::Current, "amd64").build());
        let lazy = LazyIntrinsics::new(caps, Pipeline::standard(CompilerOptions::default()));
        assert!(!lazy.is_initialized());

        let first = lazy.registry().unwrap();
        assert!(lazy.is_initialized());
        let second = lazy.registry().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_sealed());
    }

    #[test]
    fn fatal_error_is_returned_to_every_caller() {
        let caps = Arc::new(
            CapabilitySnapshot::builder(VmEra::Current, "amd64")
                .enable(Feature::Ghash)
                .build(),
        );
        let lazy = LazyIntrinsics::new(caps, Pipeline::standard(CompilerOptions::default()));
        let first = lazy.get().unwrap_err();
        let second = lazy.get().unwrap_err();
        assert_eq!(first, second);
        assert!(matches!(first, PipelineError::MissingStub { feature: Feature::Ghash, .. }));
    }
}
