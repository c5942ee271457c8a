//! Error handling for the cmpack CLI.
//!
//! This module provides a hierarchical error type system using `thiserror`.
//! Each error variant is designed to be actionable: configuration and assembly
//! errors need a fixed project file and a restart, compile errors are reported
//! and (outside watch mode) end the process with status 1.
//!
//! # Architecture
//!
//! - **Top-level errors** (`CliError`) represent broad categories of failures
//! - **Domain-specific errors** (`ConfigError`, `BuildError`) provide detailed context
//! - **Error conversion** is automatic via `#[from]` attributes
//! - **Context helpers** allow attaching additional information to errors
//!
//! # Example
//!
//! ```rust,no_run
//! use cmpack_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_manifest(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_path(path)
//! }
//! ```

mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
///
/// This is the primary error type returned by commands. It converts from the
/// domain-specific errors via `From` implementations.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (invalid syntax, unreadable manifest, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Build process errors (missing entry points, compile failures, etc.)
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Development server errors
    #[error("Server error: {0}")]
    Server(String),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
///
/// These errors occur while loading `.cmpack`, `.cmpack.js`, the package
/// manifest, or environment settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The project config file is not valid JSON (after comment stripping)
    #[error("Failed to parse {} at line {line}, column {column}: {message}", .path.display())]
    Parse {
        /// Config file that failed to parse
        path: PathBuf,
        /// 1-based line of the error
        line: usize,
        /// 1-based column of the error
        column: usize,
        /// Parser message
        message: String,
        /// Full file contents, kept for diagnostic rendering
        source_text: String,
    },

    /// The package manifest could not be read while substituting variables
    #[error("Failed to read package manifest: {}\n\nHint: $npm_package_name and $npm_package_version need a readable package.json", .0.display())]
    MissingManifest(PathBuf),

    /// An executable config or override script failed to evaluate
    #[error("Failed to evaluate {}: {message}", .path.display())]
    Script {
        /// Script that failed
        path: PathBuf,
        /// Failure description (stderr or decode error)
        message: String,
    },

    /// The config document has a shape we cannot use
    #[error("Invalid config shape in {}: {message}\n\nHint: The config must be an object or an array of objects", .path.display())]
    InvalidShape {
        /// Config file with the bad shape
        path: PathBuf,
        /// What was wrong
        message: String,
    },

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },

    /// I/O error while reading config
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Build process errors.
///
/// These errors occur while assembling bundler configurations or while the
/// bundler is running.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No entry file matched the configured patterns or the default conventions
    #[error("Entry point not found: {pattern}\n\nHint: Check the 'entry' field in .cmpack or create src/index.js")]
    EntryNotFound {
        /// Pattern or conventional path that was searched
        pattern: String,
    },

    /// Theme file missing or not an object
    #[error("Failed to load theme {}: {reason}\n\nHint: 'theme' must be an object or a path to a file exporting an object", .path.display())]
    ThemeLoad {
        /// Theme file path
        path: PathBuf,
        /// Failure reason
        reason: String,
    },

    /// One or more compile errors reported by the bundler
    #[error("Failed to compile with {} error(s).", .errors.len())]
    Compile {
        /// Formatted compiler messages
        errors: Vec<String>,
    },

    /// Fatal bundler failure (could not start, crashed, unreadable stats)
    #[error("Bundler failed: {0}")]
    Bundler(String),

    /// `buildDll` was run without `dllPlugin` in the project config
    #[error("dllPlugin config not found in .cmpack")]
    DllNotConfigured,

    /// `dllPlugin` is enabled but the DLL manifest has not been built yet
    #[error("Failed to start the server, since you have enabled dllPlugin, but have not run `cmpack buildDll` before `cmpack server`.\n\nExpected manifest: {}", .0.display())]
    DllManifestMissing(PathBuf),

    /// Failed to write output file or asset
    #[error("Failed to write asset: {0}\n\nHint: Check output directory permissions")]
    AssetWriteFailed(String),
}

/// Mock definition errors.
///
/// Never fatal: the dev server keeps running without the broken mocks, shows
/// the error, and tries again when the mock file changes.
#[derive(Debug, Clone, Error)]
pub enum MockLoadError {
    /// The mock file could not be read, parsed or evaluated
    #[error("{0}")]
    Load(String),

    /// The mock module did not export an object
    #[error("mock config must be an object of routes, but got {0}")]
    NotAnObject(String),

    /// The key names an HTTP method the router does not know
    #[error("method of {key} is not valid")]
    InvalidMethod {
        /// Route key as written
        key: String,
    },

    /// The value is neither a handler, an object nor a proxy target
    #[error("mock value of {key} should be function or object or string, but got {kind}")]
    InvalidValue {
        /// Route key as written
        key: String,
        /// JavaScript type name of the value
        kind: String,
    },

    /// The route path cannot be turned into a matcher
    #[error("invalid path in mock key {key}: {message}")]
    InvalidPath {
        /// Route key as written
        key: String,
        /// Regex compile error
        message: String,
    },
}

impl From<ConfigError> for MockLoadError {
    fn from(err: ConfigError) -> Self {
        MockLoadError::Load(err.to_string())
    }
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Add a file path to the error context.
    ///
    /// I/O "not found" errors become [`CliError::FileNotFound`].
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Add a helpful hint to the error context.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error with a custom message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
