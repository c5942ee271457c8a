use clap::{Args, Subcommand};

use crate::cli::validation::parse_output_path;

/// Available cmpack subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a production build
    ///
    /// Measures the previous output, clears the output directory, builds every
    /// target and prints gzip sizes with the change since the last build.
    Build(BuildArgs),

    /// Build the shared vendor (DLL) bundle
    ///
    /// Requires `dllPlugin` in .cmpack. The bundle and its manifest land in
    /// node_modules/cmpack-dlls and are referenced by later builds.
    #[command(name = "buildDll", alias = "build-dll")]
    BuildDll,

    /// Start the development server
    ///
    /// Compiles in watch mode, serves the result with live reload, applies
    /// proxy rules and mock routes, and restarts when project config changes.
    Server,

    /// Anything else is reported as an unknown script.
    #[command(external_subcommand)]
    External(Vec<String>),
}

/// Arguments for the build command
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    /// Development build without compression
    ///
    /// Keeps development defines and source maps; useful for debugging a
    /// production-only problem.
    #[arg(long)]
    pub debug: bool,

    /// Rebuild on every source change until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Output directory, overriding `outputPath` from .cmpack
    #[arg(short = 'o', long, value_name = "PATH", value_parser = parse_output_path)]
    pub output_path: Option<String>,

    /// Generate a bundle visualization next to the output
    #[arg(long)]
    pub analyze: bool,
}
