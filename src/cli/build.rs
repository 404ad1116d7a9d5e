//! Build command implementation

use std::path::Path;
use std::process::ExitCode;

use crate::build::{BuildContext, BuildPipeline};
use crate::config::CliOverrides;
use crate::transform::ProcessorRegistry;
use crate::watch::{watch_and_rebuild, WatchOptions};

use super::{load_project, EXIT_ERROR, EXIT_SUCCESS};

/// Run the build command
pub fn run_build(
    config_path: Option<&Path>,
    overrides: &CliOverrides,
    watch: bool,
    dry_run: bool,
    verbose: bool,
) -> ExitCode {
    let project = match load_project(config_path, overrides, verbose) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let registry = ProcessorRegistry::with_commands(project.config.commands());
    let context = match BuildContext::new(project.descriptor, registry) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let descriptor = context.descriptor();
    if verbose {
        println!("Root: {}", descriptor.root().display());
        println!("Output: {}", descriptor.output().root().display());
        println!("Mode: {} (source maps {})", descriptor.mode(), on_off(descriptor.source_maps_enabled()));
    }

    let pipeline = BuildPipeline::new(context).with_dry_run(dry_run);

    if watch {
        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        let options = WatchOptions { clear_screen: project.config.watch.clear_screen, verbose };
        return match watch_and_rebuild(pipeline, options) {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    if dry_run {
        println!("Dry run - would write:");
    } else {
        println!("Building ({})...", pipeline.context().descriptor().mode());
    }

    match pipeline.build() {
        Ok(result) => {
            println!("{}", result.summary());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
