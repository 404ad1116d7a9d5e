//! sitepack - Library for bundling TypeScript and SCSS sources into static assets
//!
//! This library provides functionality to:
//! - Describe a build pipeline: entries, match rules, resolution and outputs
//! - Load that description from `sitepack.toml`
//! - Build script bundles, source maps and style bundles from a source tree
//! - Watch the tree and rebuild on change

pub mod build;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod logging;
pub mod transform;
pub mod watch;
