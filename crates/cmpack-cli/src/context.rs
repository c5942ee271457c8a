//! Per-run application context.
//!
//! Everything an orchestrator reads besides its own arguments: project paths,
//! environment settings, registered extensions and the bundler. Passing this
//! value explicitly keeps config loading and assembly free of process-wide
//! state, so tests can run them against a temporary project.

use crate::bundler::{Bundler, ExternalBundler};
use crate::bundler_config::{AssemblyContext, OVERRIDE_FILE};
use crate::config::{self, EnvSettings, RcConfig};
use crate::error::ConfigError;
use crate::extension::{ConfigOverride, ConfigScript, Extensions, ScriptOverride, ScriptRunner};
use crate::paths::ProjectPaths;
use crate::targets::Targets;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinError;

#[derive(Clone)]
pub struct AppContext {
    pub paths: ProjectPaths,
    pub settings: EnvSettings,
    pub extensions: Extensions,
    pub runner: ScriptRunner,
    pub bundler: Arc<dyn Bundler>,
}

impl AppContext {
    /// Context for the project at `root`, with the external bundler and
    /// script runtime taken from `settings`.
    pub fn new(root: impl AsRef<Path>, settings: EnvSettings, extensions: Extensions) -> Self {
        let paths = ProjectPaths::new(root);
        let bundler = Arc::new(ExternalBundler::new(&settings.bundler, &paths));
        let runner = ScriptRunner::new(&settings.node);
        Self {
            paths,
            settings,
            extensions,
            runner,
            bundler,
        }
    }

    /// Replace the bundler (tests use an in-process fake).
    pub fn with_bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = bundler;
        self
    }

    /// Evaluator for `.cmpack.js` and script theme files.
    pub fn config_script(&self) -> Arc<dyn ConfigScript> {
        self.extensions
            .config_script()
            .unwrap_or_else(|| Arc::new(self.runner.clone()))
    }

    /// The registered override, else the project's override file when present.
    pub fn config_override(&self) -> Option<Arc<dyn ConfigOverride>> {
        if let Some(hook) = self.extensions.config_override() {
            return Some(hook);
        }
        let file = self.paths.resolve_app(OVERRIDE_FILE);
        file.is_file().then(|| {
            Arc::new(ScriptOverride::new(self.runner.clone(), file)) as Arc<dyn ConfigOverride>
        })
    }

    /// Load the project config for `environment`.
    pub fn load_config(&self, environment: &str) -> Result<Targets<RcConfig>, ConfigError> {
        config::load(&self.paths, environment, self.config_script().as_ref())
    }

    /// Assembly context borrowing this run's paths.
    pub fn assembly<'a>(
        &'a self,
        environment: &'a str,
        script: &'a dyn ConfigScript,
    ) -> AssemblyContext<'a> {
        AssemblyContext::new(&self.paths, environment, script).with_override(self.config_override())
    }

    /// Run `work` on the blocking pool with a copy of this context.
    ///
    /// Config loading, assembly and mock loading may start the script
    /// runtime and wait for it.
    pub async fn run_blocking<T, F>(&self, work: F) -> std::result::Result<T, JoinError>
    where
        F: FnOnce(&AppContext) -> T + Send + 'static,
        T: Send + 'static,
    {
        let ctx = self.clone();
        tokio::task::spawn_blocking(move || work(&ctx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler_config::BundlerConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_override_file_is_picked_up() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), Extensions::new());
        assert!(ctx.config_override().is_none());

        fs::write(dir.path().join(OVERRIDE_FILE), "module.exports = c => c;").unwrap();
        assert!(ctx.config_override().is_some());
    }

    #[test]
    fn test_registered_override_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(OVERRIDE_FILE), "module.exports = c => c;").unwrap();
        let extensions = Extensions::new().with_config_override(
            |mut config: BundlerConfig, _env: &str| {
                config.bail = false;
                Ok::<_, ConfigError>(config)
            },
        );
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), extensions);
        let hook = ctx.config_override().unwrap();
        let out = hook
            .apply(
                BundlerConfig {
                    bail: true,
                    ..BundlerConfig::default()
                },
                "production",
            )
            .unwrap();
        assert!(!out.bail);
    }

    #[tokio::test]
    async fn test_run_blocking_sees_project() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".cmpack"), r#"{ "outputPath": "www" }"#).unwrap();
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), Extensions::new());

        let targets = ctx
            .run_blocking(|ctx| ctx.load_config("production"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(targets.first().map(RcConfig::output_path), Some("www"));
    }

    #[test]
    fn test_load_config_without_files_is_default() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), Extensions::new());
        let targets = ctx.load_config("production").unwrap();
        assert_eq!(targets, Targets::Single(RcConfig::default()));
    }
}
