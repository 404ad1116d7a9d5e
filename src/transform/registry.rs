//! Named processor lookup.

use super::{CommandProcessor, CommandSpec, CssProcessor, JsonProcessor, Processor};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Processors available to transform chains, keyed by name.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRegistry").field("processors", &self.names()).finish()
    }
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `typescript`, `sass`, `json` and `css`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CommandProcessor::new("typescript", CommandSpec::typescript()));
        registry.register(CommandProcessor::new("sass", CommandSpec::sass()));
        registry.register(JsonProcessor);
        registry.register(CssProcessor);
        registry
    }

    /// Built-ins overlaid with configured command processors.
    pub fn with_commands<I>(commands: I) -> Self
    where
        I: IntoIterator<Item = (String, CommandSpec)>,
    {
        let mut registry = Self::with_builtins();
        for (name, spec) in commands {
            registry.register(CommandProcessor::new(name, spec));
        }
        registry
    }

    /// Add a processor, replacing any with the same name.
    pub fn register<P: Processor + 'static>(&mut self, processor: P) {
        self.register_arc(Arc::new(processor));
    }

    pub fn register_arc(&mut self, processor: Arc<dyn Processor>) {
        self.processors.insert(processor.name().to_string(), processor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{ToolError, TransformContext, TransformInput};

    struct Upper;

    impl Processor for Upper {
        fn name(&self) -> &str {
            "sass"
        }

        fn process(&self, input: &TransformInput<'_>, _ctx: &TransformContext) -> Result<String, ToolError> {
            Ok(input.source.to_uppercase())
        }
    }

    #[test]
    fn test_builtins() {
        let registry = ProcessorRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["css", "json", "sass", "typescript"]);
        assert!(registry.contains("typescript"));
        assert!(registry.get("babel").is_none());
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = ProcessorRegistry::with_builtins();
        registry.register(Upper);
        assert_eq!(registry.names().len(), 4);
        let sass = registry.get("sass").unwrap();
        assert!(sass.recognized_options().contains(&"source_map"));
    }

    #[test]
    fn test_configured_commands() {
        let spec = CommandSpec {
            program: "swc".to_string(),
            args: vec!["compile".to_string()],
            source_map_args: vec![],
            minify_args: vec![],
        };
        let registry = ProcessorRegistry::with_commands(vec![
            ("typescript".to_string(), spec.clone()),
            ("swc".to_string(), spec),
        ]);
        assert!(registry.contains("swc"));
        assert_eq!(registry.names().len(), 5);
    }
}
