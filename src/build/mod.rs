//! Build engine for sitepack
//!
//! Turns a [`PipelineDescriptor`](crate::descriptor::PipelineDescriptor)
//! and a source tree into script bundles, source maps and style bundles.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Graph**: walk imports from each entry, resolving rules and paths
//! - **Transform**: run each module through its chain, in parallel, cached
//! - **Bundle**: assemble the script runtime, source map and stylesheet
//! - **Write**: atomically replace every artifact once all succeeded
//!
//! # Example
//!
//! ```ignore
//! use sitepack::build::{BuildContext, BuildPipeline};
//! use sitepack::transform::ProcessorRegistry;
//!
//! let context = BuildContext::new(descriptor, ProcessorRegistry::with_builtins())?;
//! let pipeline = BuildPipeline::new(context);
//!
//! let result = pipeline.build()?;
//! println!("{}", result.summary());
//! ```

pub mod bundle;
pub mod cache;
pub mod context;
pub mod error;
pub mod generation;
pub mod graph;
pub mod pipeline;
pub mod result;
pub mod sourcemap;
pub mod write;

pub use cache::{SharedCache, TransformCache};
pub use context::*;
pub use error::*;
pub use generation::{BuildGeneration, BuildTicket};
pub use graph::{ModuleGraph, ModuleNode};
pub use pipeline::*;
pub use result::*;
