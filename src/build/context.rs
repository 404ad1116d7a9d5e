//! Build context: the descriptor and processors shared by every build.

use crate::descriptor::{ConfigurationError, PipelineDescriptor, TransformStep};
use crate::transform::{Processor, ProcessorRegistry, TransformContext};
use std::sync::Arc;

/// Everything a build needs besides the source tree.
///
/// Cloning is cheap; the descriptor and registry are shared read-only
/// between the watcher, the pipeline and transform workers.
#[derive(Debug, Clone)]
pub struct BuildContext {
    descriptor: Arc<PipelineDescriptor>,
    registry: Arc<ProcessorRegistry>,
}

impl BuildContext {
    /// Create a context, checking every chain step against the registry.
    pub fn new(
        descriptor: PipelineDescriptor,
        registry: ProcessorRegistry,
    ) -> Result<Self, ConfigurationError> {
        check_chains(&descriptor, &registry)?;
        Ok(Self { descriptor: Arc::new(descriptor), registry: Arc::new(registry) })
    }

    pub fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    /// Shared handle to the descriptor.
    pub fn shared_descriptor(&self) -> Arc<PipelineDescriptor> {
        Arc::clone(&self.descriptor)
    }

    /// The processor a step names. Present for any step of a checked chain.
    pub fn processor(&self, step: &TransformStep) -> Option<Arc<dyn Processor>> {
        self.registry.get(step.processor())
    }

    /// Mode-gated options for one step.
    ///
    /// A step emits a source map only when it asks for one and the
    /// descriptor has maps enabled.
    pub fn step_context(&self, step: &TransformStep) -> TransformContext {
        let descriptor = &self.descriptor;
        TransformContext {
            mode: descriptor.mode(),
            minify: descriptor.minify_enabled(),
            source_map: descriptor.source_maps_enabled() && step.bool_option("source_map").unwrap_or(false),
            options: step.options().clone(),
            root: descriptor.root().to_path_buf(),
        }
    }
}

fn check_chains(
    descriptor: &PipelineDescriptor,
    registry: &ProcessorRegistry,
) -> Result<(), ConfigurationError> {
    for (index, rule) in descriptor.rules().iter().enumerate() {
        for step in rule.chain().steps() {
            let processor = registry.get(step.processor()).ok_or_else(|| {
                ConfigurationError::UnknownProcessor { rule: index, processor: step.processor().to_string() }
            })?;

            let recognized = processor.recognized_options();
            if let Some(option) = step.options().keys().find(|k| !recognized.contains(&k.as_str())) {
                return Err(ConfigurationError::UnrecognizedOption {
                    rule: index,
                    processor: step.processor().to_string(),
                    option: option.clone(),
                });
            }
        }
    }
    Ok(())
}
