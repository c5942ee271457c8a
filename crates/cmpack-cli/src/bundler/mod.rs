//! The bundler seam.
//!
//! cmpack never compiles anything itself. It hands assembled configurations
//! to a [`Bundler`] and reacts to the statistics that come back. The
//! production implementation is [`ExternalBundler`]; tests drive the
//! orchestrators with an in-process fake.

mod external;
mod stats;

pub use external::{ExternalBundler, CONFIG_JSON, CONFIG_LOADER};
pub use stats::{Asset, BuildStats, TargetStats};

use crate::bundler_config::BundlerConfig;
use crate::error::BuildError;
use crate::targets::Targets;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Progress of a watching bundler.
#[derive(Debug)]
pub enum BundlerEvent {
    /// Sources changed; a recompile is about to start.
    Invalidated,
    /// A compile finished. Compile errors arrive as `Ok` stats with a
    /// non-empty error list; `Err` means the bundler itself failed.
    Done(Result<BuildStats, BuildError>),
}

/// Black-box module bundler.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Compile once.
    async fn run(&self, configs: &Targets<BundlerConfig>) -> Result<BuildStats, BuildError>;

    /// Compile now and again after every change, debounced by `poll`.
    ///
    /// Watching stops when the receiver is dropped.
    async fn watch(
        &self,
        configs: Targets<BundlerConfig>,
        poll: Duration,
    ) -> Result<mpsc::Receiver<BundlerEvent>, BuildError>;
}
