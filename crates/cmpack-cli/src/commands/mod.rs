//! Command implementations for the cmpack CLI.
//!
//! - [`build`] - Production build with a gzip size report
//! - [`build_dll`] - Shared vendor bundle
//! - [`server`] - Development server with live reload and mocks
//!
//! Each command provides an `execute` function taking the per-run
//! [`AppContext`](crate::context::AppContext).

pub mod build;
pub mod build_dll;
pub mod server;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use build_dll::execute as build_dll_execute;
pub use server::execute as server_execute;
