//! Logging infrastructure for the cmpack CLI.
//!
//! User-facing status lines go through [`crate::ui`]; this module wires up the
//! `tracing` subscriber used for internal diagnostics (config merging, bundler
//! invocations, mock reloads).
//!
//! # Verbosity Levels
//!
//! 1. `--verbose`: DEBUG for cmpack
//! 2. `--quiet`: ERROR only
//! 3. `RUST_LOG` environment variable: custom filter
//! 4. Default: WARN for cmpack (status output is handled by `ui`)

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used for `--verbose`.
const VERBOSE_FILTER: &str = "cmpack_cli=debug,cmpack=debug";

/// Filter used for `--quiet`.
const QUIET_FILTER: &str = "cmpack_cli=error,cmpack=error";

/// Filter used when neither flag nor `RUST_LOG` is given.
const DEFAULT_FILTER: &str = "cmpack_cli=warn,cmpack=warn";

/// Initialize the tracing subscriber with the specified options.
///
/// Should be called once at the start of the program, before any logging
/// occurs. Calling it twice is harmless: the second registration is ignored.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(build_filter(verbose, quiet), no_color);
}

/// Initialize logger with custom environment filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn build_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}
