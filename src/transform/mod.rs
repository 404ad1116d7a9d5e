//! Transform processors.
//!
//! A processor turns one module's source text into compiled output. Each
//! rule's chain names processors by registry key; the build engine feeds
//! the raw source to the first step and each step's output to the next.
//!
//! Built-in processors:
//! - `typescript` and `sass` run external compilers (see [`CommandProcessor`])
//! - `json` wraps a JSON document as a CommonJS module
//! - `css` parses and prints stylesheets with lightningcss

mod command;
mod native;
mod registry;

pub use command::{CommandProcessor, CommandSpec};
pub use native::{CssProcessor, JsonProcessor};
pub use registry::ProcessorRegistry;

use crate::descriptor::{Mode, StepOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reported by a processor, passed through verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ToolError(pub String);

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// One module's input to a transform step.
#[derive(Debug, Clone, Copy)]
pub struct TransformInput<'a> {
    /// Absolute path of the module on disk
    pub path: &'a Path,
    /// Source text, or the previous step's output
    pub source: &'a str,
}

/// Options a step runs with, after mode gating.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub mode: Mode,
    pub minify: bool,
    /// Effective source map flag: step option AND descriptor maps enabled
    pub source_map: bool,
    /// The step's declared options
    pub options: StepOptions,
    /// Project root, for tools that resolve further includes
    pub root: PathBuf,
}

/// A named transform implementation.
pub trait Processor: Send + Sync {
    /// Registry key steps refer to.
    fn name(&self) -> &str;

    /// Option names a step may set for this processor.
    fn recognized_options(&self) -> &[&str] {
        &["source_map"]
    }

    /// Transform one module's source.
    fn process(&self, input: &TransformInput<'_>, ctx: &TransformContext) -> Result<String, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_passes_message_through() {
        let err = ToolError::new("Error: expected \";\".\n  line 3");
        assert_eq!(err.to_string(), "Error: expected \";\".\n  line 3");
        assert_eq!(err.message(), err.0);
    }
}
