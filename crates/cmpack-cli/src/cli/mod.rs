//! Command-line interface definition for cmpack.
//!
//! # Command Structure
//!
//! - `cmpack build` - Production build with a gzip size report
//! - `cmpack buildDll` - Pre-build the shared vendor bundle
//! - `cmpack server` - Development server with live reload and mocks
//!
//! Any other word in command position is captured so the binary can warn
//! about it instead of failing with a usage error.

mod commands;
mod validation;

use clap::Parser;

pub use commands::{BuildArgs, Command};
pub use validation::parse_output_path;

/// cmpack - configuration composer and build front-end for webpack-style bundlers
#[derive(Parser, Debug)]
#[command(
    name = "cmpack",
    about = "Compose bundler configs, build with size reports, and serve with live reload",
    long_about = "cmpack turns a small project config (.cmpack) into complete bundler\n\
                  configurations, runs production builds with gzip size-change reports,\n\
                  and runs a development server with live reload, mocking and proxying.",
    disable_version_flag = true
)]
pub struct Cli {
    /// Print the version and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Enable verbose logging (debug level)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}
