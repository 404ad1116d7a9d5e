//! sitepack - Command-line bundler for TypeScript and SCSS sources

use std::process::ExitCode;

use sitepack::cli;

fn main() -> ExitCode {
    cli::run()
}
