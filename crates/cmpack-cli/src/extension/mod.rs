//! Extension points.
//!
//! Projects customise cmpack in three places: an executable config file
//! (`.cmpack.js`), a raw bundler-config override (`webpack.config.js`) and
//! mock handlers. Each is a trait object accepted at a fixed point in the
//! pipeline. The defaults evaluate the project's files through
//! [`ScriptRunner`]; embedders register Rust implementations on
//! [`Extensions`] instead.

mod script;

pub use script::{ScriptOverride, ScriptRunner, HANDLER_MARKER};

use crate::bundler_config::BundlerConfig;
use crate::dev::mock::MockValue;
use crate::error::ConfigError;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Turns an executable config file into a JSON document.
pub trait ConfigScript: Send + Sync {
    fn evaluate(&self, path: &Path) -> Result<Value, ConfigError>;
}

/// Final mutation of an assembled bundler config.
///
/// The returned config replaces the input entirely, with no validation.
pub trait ConfigOverride: Send + Sync {
    fn apply(&self, config: BundlerConfig, environment: &str)
        -> Result<BundlerConfig, ConfigError>;
}

impl<F> ConfigOverride for F
where
    F: Fn(BundlerConfig, &str) -> Result<BundlerConfig, ConfigError> + Send + Sync,
{
    fn apply(
        &self,
        config: BundlerConfig,
        environment: &str,
    ) -> Result<BundlerConfig, ConfigError> {
        self(config, environment)
    }
}

/// Programmatic extensions, consulted before the project's files.
#[derive(Clone, Default)]
pub struct Extensions {
    config_script: Option<Arc<dyn ConfigScript>>,
    config_override: Option<Arc<dyn ConfigOverride>>,
    mock_routes: Vec<(String, MockValue)>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `.cmpack.js` with `script` instead of the script runtime.
    pub fn with_config_script(mut self, script: impl ConfigScript + 'static) -> Self {
        self.config_script = Some(Arc::new(script));
        self
    }

    /// Use `hook` instead of the project's `webpack.config.js`.
    pub fn with_config_override(mut self, hook: impl ConfigOverride + 'static) -> Self {
        self.config_override = Some(Arc::new(hook));
        self
    }

    /// Add a mock route (`"GET /api/user"` style key).
    pub fn with_mock_route(mut self, key: impl Into<String>, value: MockValue) -> Self {
        self.mock_routes.push((key.into(), value));
        self
    }

    pub fn config_script(&self) -> Option<Arc<dyn ConfigScript>> {
        self.config_script.clone()
    }

    pub fn config_override(&self) -> Option<Arc<dyn ConfigOverride>> {
        self.config_override.clone()
    }

    pub fn mock_routes(&self) -> &[(String, MockValue)] {
        &self.mock_routes
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("config_script", &self.config_script.is_some())
            .field("config_override", &self.config_override.is_some())
            .field("mock_routes", &self.mock_routes.len())
            .finish()
    }
}
