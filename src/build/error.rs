//! Build failures.

use crate::descriptor::ConfigurationError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A processor failed on a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {step} failed:\n{message}", .file.display())]
pub struct TransformError {
    /// Module that failed, relative to the project root
    pub file: PathBuf,
    /// The failing step as written in the chain
    pub step: String,
    /// Tool output, passed through unchanged
    pub message: String,
}

/// An artifact could not be written.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Error during build execution.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Rule or import resolution failed while walking the graph
    #[error("{}: {source}", .file.display())]
    Configuration {
        /// The module being resolved, or the entry itself
        file: PathBuf,
        #[source]
        source: ConfigurationError,
    },
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to assemble bundle '{name}': {source}")]
    Assemble {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    /// A newer change started another build; results were discarded
    #[error("build superseded by a newer change")]
    Superseded,
}

impl BuildError {
    /// The file the failure is attributed to, if any.
    pub fn file(&self) -> Option<&Path> {
        match self {
            BuildError::Configuration { file, .. } => Some(file),
            BuildError::Transform(e) => Some(&e.file),
            BuildError::Write(e) => Some(&e.path),
            BuildError::Read { path, .. } => Some(path),
            BuildError::Assemble { .. } | BuildError::Superseded => None,
        }
    }

    /// The underlying configuration error, for resolution failures.
    pub fn configuration(&self) -> Option<&ConfigurationError> {
        match self {
            BuildError::Configuration { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, BuildError::Superseded)
    }
}
