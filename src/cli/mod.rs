//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod check;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use glob::glob;

use crate::config::{
    build_descriptor, find_config, load_config, merge_cli_overrides, CliOverrides, ConfigError,
    SitepackConfig,
};
use crate::descriptor::{Mode, PipelineDescriptor};
use crate::logging::init_logging;

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Expand a command-line path into files: directories are walked recursively.
pub fn expand_source_paths(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let pattern = format!("{}/**/*", glob::Pattern::escape(&path.display().to_string()));
    let mut files: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// sitepack - Bundle TypeScript and SCSS sources into static assets
#[derive(Parser)]
#[command(name = "sitepack")]
#[command(about = "sitepack - Bundle TypeScript and SCSS sources into static script and style assets")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every entry into script, map and style bundles
    Build {
        /// Path to sitepack.toml (default: search upward from the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the public output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Bundling mode
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// Emit source maps regardless of mode
        #[arg(long, conflicts_with = "no_source_maps")]
        source_maps: bool,

        /// Never emit source maps
        #[arg(long)]
        no_source_maps: bool,

        /// Poll for changes every N milliseconds in watch mode (0 = native events)
        #[arg(long)]
        poll: Option<u64>,

        /// Watch for changes and rebuild automatically
        #[arg(short, long, conflicts_with = "dry_run")]
        watch: bool,

        /// Dry run (show what would be written without writing)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the rule and import resolution for source files
    Check {
        /// Files or directories to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Path to sitepack.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// A loaded project: its configuration and the descriptor built from it.
pub(crate) struct Project {
    pub config: SitepackConfig,
    pub descriptor: PipelineDescriptor,
}

/// Load configuration, apply overrides and build the descriptor.
///
/// Without an explicit path, sitepack.toml is searched upward from the
/// current directory; with none found, defaults apply to the current directory.
pub(crate) fn load_project(
    config_path: Option<&Path>,
    overrides: &CliOverrides,
    verbose: bool,
) -> Result<Project, ConfigError> {
    let config_path = config_path.map(Path::to_path_buf).or_else(find_config);

    let (mut config, project_root) = match config_path {
        Some(path) => {
            if verbose {
                println!("Using config: {}", path.display());
            }
            let config = load_config(Some(&path))?;
            let root = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => std::env::current_dir()?,
            };
            (config, root)
        }
        None => {
            if verbose {
                println!("No sitepack.toml found, using defaults");
            }
            (load_config(None)?, std::env::current_dir()?)
        }
    };

    merge_cli_overrides(&mut config, overrides);
    let descriptor = build_descriptor(&config, &project_root)?;
    Ok(Project { config, descriptor })
}

/// Parse arguments and run the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build { config, out, mode, source_maps, no_source_maps, poll, watch, dry_run } => {
            let overrides = CliOverrides {
                out,
                mode,
                source_maps: match (source_maps, no_source_maps) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                poll_ms: poll,
            };
            build::run_build(config.as_deref(), &overrides, watch, dry_run, cli.verbose)
        }
        Commands::Check { files, config, json } => {
            check::run_check(&files, config.as_deref(), json, cli.verbose)
        }
    }
}
