//! Configuration module for sitepack
//!
//! Provides types and parsing for `sitepack.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
