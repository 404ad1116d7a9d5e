//! Configuration errors raised while querying a pipeline descriptor.

use std::path::PathBuf;
use thiserror::Error;

/// A fatal configuration problem detected while resolving the pipeline.
///
/// These are reported once and never retried: a one-shot build stops,
/// a watch session reports the error and waits for the next change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A file reached by the dependency graph matches no rule
    #[error("no rule matches '{}' (unmatched file type)", .path.display())]
    UnmatchedFileType { path: PathBuf },

    /// An import could not be resolved with any policy extension
    #[error("cannot resolve import '{specifier}' (looked for '{}')", .request.display())]
    UnresolvedImport {
        /// The specifier as written in the importing module
        specifier: String,
        /// The requested location, relative to the project root when possible
        request: PathBuf,
    },

    /// A declared entry point does not exist on disk
    #[error("entry point '{}' does not exist", .path.display())]
    MissingEntry { path: PathBuf },

    /// A transform step names a processor that is not registered
    #[error("rules[{rule}]: unknown processor '{processor}'")]
    UnknownProcessor { rule: usize, processor: String },

    /// A transform step passes an option its processor does not recognize
    #[error("rules[{rule}]: processor '{processor}' does not recognize option '{option}'")]
    UnrecognizedOption { rule: usize, processor: String, option: String },
}
