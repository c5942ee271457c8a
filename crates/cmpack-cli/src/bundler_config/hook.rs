//! Override hook applied after assembly.

use crate::bundler_config::{AssemblyContext, BundlerConfig};
use crate::error::ConfigError;
use crate::paths::ProjectPaths;
use crate::ui;

/// Project file that may export a function rewriting the assembled config.
pub const OVERRIDE_FILE: &str = "webpack.config.js";

/// Hand the assembled config to the override hook, if any.
///
/// The hook's return value replaces the config wholesale.
pub fn apply_override(
    config: BundlerConfig,
    ctx: &AssemblyContext,
) -> Result<BundlerConfig, ConfigError> {
    match &ctx.config_override {
        Some(hook) => {
            tracing::debug!(environment = ctx.environment, "applying config override");
            hook.apply(config, ctx.environment)
        }
        None => Ok(config),
    }
}

/// Warn that an override file is in use; its output is not validated.
pub fn warn_if_exists(paths: &ProjectPaths) -> bool {
    let exists = paths.resolve_app(OVERRIDE_FILE).is_file();
    if exists {
        ui::warning(&format!(
            "{OVERRIDE_FILE} found. It can break on cmpack upgrades; keep it as small as possible."
        ));
    }
    exists
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler_config::tests::{fixture, NoScripts};
    use crate::bundler_config::Plugin;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn test_without_hook_config_is_untouched() {
        let (_dir, paths) = fixture();
        let ctx = AssemblyContext::new(&paths, "production", &NoScripts);
        let config = BundlerConfig::default();
        assert_eq!(apply_override(config.clone(), &ctx).unwrap(), config);
    }

    #[test]
    fn test_hook_output_replaces_config() {
        let (_dir, paths) = fixture();
        let hook = |mut config: BundlerConfig, env: &str| {
            config.plugins.push(Plugin::new("Seen", json!(env)));
            Ok::<_, ConfigError>(config)
        };
        let ctx = AssemblyContext::new(&paths, "development", &NoScripts)
            .with_override(Some(Arc::new(hook)));
        let out = apply_override(BundlerConfig::default(), &ctx).unwrap();
        assert_eq!(out.plugins[0].options, json!("development"));
    }

    #[test]
    fn test_hook_errors_propagate() {
        let (_dir, paths) = fixture();
        let hook = |_config: BundlerConfig, _env: &str| {
            Err::<BundlerConfig, _>(ConfigError::InvalidValue {
                field: "webpack.config.js".to_string(),
                value: "undefined".to_string(),
                hint: "return the config".to_string(),
            })
        };
        let ctx = AssemblyContext::new(&paths, "production", &NoScripts)
            .with_override(Some(Arc::new(hook)));
        assert!(apply_override(BundlerConfig::default(), &ctx).is_err());
    }

    #[test]
    fn test_warn_if_exists() {
        let (dir, paths) = fixture();
        assert!(!warn_if_exists(&paths));
        fs::write(dir.path().join(OVERRIDE_FILE), "module.exports = c => c;").unwrap();
        assert!(warn_if_exists(&paths));
    }
}
