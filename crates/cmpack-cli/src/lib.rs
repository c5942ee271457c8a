//! cmpack CLI - configuration composer and build front-end for webpack-style
//! bundlers.
//!
//! A project describes itself in a small `.cmpack` file. cmpack turns that
//! into complete bundler configurations, drives an external bundler, reports
//! gzip sizes with the change since the previous build, and runs a
//! development server with live reload, proxying and mock routes.
//!
//! # Architecture
//!
//! - [`config`] - Loading and merging `.cmpack`, environment settings
//! - [`bundler_config`] - Assembling development, production and DLL configs
//! - [`bundler`] - The bundler seam and the external bundler process
//! - [`size`] - Gzip size snapshots and reports
//! - [`dev`] - Development server middleware and state
//! - [`commands`] - `build`, `buildDll` and `server`
//! - [`error`] - Error types with actionable messages
//! - [`logger`] / [`ui`] - Diagnostics and user-facing output
//!
//! # Example
//!
//! ```rust,no_run
//! use cmpack_cli::{config::EnvSettings, context::AppContext, extension::Extensions};
//!
//! # async fn run() -> cmpack_cli::Result<()> {
//! let ctx = AppContext::new(".", EnvSettings::from_env()?, Extensions::new());
//! cmpack_cli::commands::build_dll_execute(&ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod bundler;
pub mod bundler_config;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod dev;
pub mod error;
pub mod extension;
pub mod logger;
pub mod paths;
pub mod size;
pub mod targets;
pub mod ui;
pub mod watcher;

pub use error::{BuildError, CliError, ConfigError, MockLoadError, Result, ResultExt};
