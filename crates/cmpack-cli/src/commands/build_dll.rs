//! `cmpack buildDll`: pre-build the shared vendor bundle.
//!
//! The DLL bundle and its reference manifest land in
//! `node_modules/cmpack-dlls`; builds and the dev server reference them when
//! `dllPlugin` is enabled.

use crate::bundler_config::{apply_override, assemble_dll, warn_if_exists, BundlerConfig};
use crate::commands::utils;
use crate::context::AppContext;
use crate::error::{BuildError, Result};
use crate::size::{BuildReport, SizeSnapshot};
use crate::targets::Targets;
use crate::ui;

/// Execute the buildDll command.
///
/// Only the first target is considered: the DLL is shared by all of them.
///
/// # Errors
///
/// [`BuildError::DllNotConfigured`] without `dllPlugin`, config and assembly
/// errors, bundler failures and compile errors.
pub async fn execute(ctx: &AppContext) -> Result<BuildReport> {
    let dll_config = ctx.run_blocking(assemble).await??;

    let output_dir = &ctx.paths.dll_node_module;
    utils::remove_dir_if_exists(&ctx.paths.app_babel_cache)?;
    let previous = SizeSnapshot::take(output_dir)?;
    utils::clean_output_dir(output_dir)?;

    ui::waiting("Creating dll bundle...");
    ui::blank();

    let spinner = ui::Spinner::new("Compiling...");
    let result = ctx.bundler.run(&Targets::Single(dll_config)).await;
    spinner.stop();

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            utils::print_errors("Failed to compile.", &[e.to_string()]);
            return Err(e.into());
        }
    };
    if stats.has_errors() {
        let errors = stats.errors();
        utils::print_errors("Failed to compile.", &errors);
        return Err(BuildError::Compile { errors }.into());
    }

    warn_if_exists(&ctx.paths);
    utils::print_size_report(
        &stats,
        output_dir,
        &output_dir.display().to_string(),
        &previous,
    )
}

/// Load the config and assemble the DLL target.
fn assemble(ctx: &AppContext) -> Result<BundlerConfig> {
    let environment = ctx.settings.environment("production").to_string();
    let targets = match ctx.load_config(&environment) {
        Ok(targets) => targets,
        Err(e) => {
            ui::warning("Failed to parse .cmpack config.");
            return Err(e.into());
        }
    };

    let Some(config) = targets.first().filter(|c| c.dll_enabled()) else {
        ui::warning("dllPlugin config not found in .cmpack");
        return Err(BuildError::DllNotConfigured.into());
    };

    let script = ctx.config_script();
    let assembly = ctx.assembly(&environment, script.as_ref());
    let dll_config = apply_override(assemble_dll(config, &assembly)?, &assembly)?;
    Ok(dll_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Asset, BuildStats, Bundler, BundlerEvent, TargetStats};
    use crate::bundler_config::{BundlerConfig, DLL_NAME};
    use crate::config::EnvSettings;
    use crate::error::CliError;
    use crate::extension::Extensions;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingBundler {
        seen: Mutex<Vec<BundlerConfig>>,
    }

    #[async_trait]
    impl Bundler for RecordingBundler {
        async fn run(
            &self,
            configs: &Targets<BundlerConfig>,
        ) -> std::result::Result<BuildStats, BuildError> {
            let config = configs.first().cloned().unwrap();
            let out = config.output.path.clone();
            fs::create_dir_all(&out).unwrap();
            fs::write(out.join("cmpack.dll.js"), "var cmpack = {};").unwrap();
            self.seen.lock().push(config);
            Ok(BuildStats::single(TargetStats {
                assets: vec![Asset {
                    name: "cmpack.dll.js".to_string(),
                    size: 16,
                }],
                ..TargetStats::default()
            }))
        }

        async fn watch(
            &self,
            _configs: Targets<BundlerConfig>,
            _poll: Duration,
        ) -> std::result::Result<mpsc::Receiver<BundlerEvent>, BuildError> {
            Err(BuildError::Bundler("not supported".to_string()))
        }
    }

    fn project(rc: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".cmpack"), rc).unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{ "name": "app", "dependencies": { "react": "^16", "lodash": "^4" } }"#,
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_requires_dll_plugin() {
        let dir = project("{}");
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), Extensions::new());
        let err = execute(&ctx).await.unwrap_err();
        assert!(matches!(err, CliError::Build(BuildError::DllNotConfigured)));
    }

    #[tokio::test]
    async fn test_builds_dependencies_into_dll_dir() {
        let dir = project(r#"{ "dllPlugin": { "exclude": ["lodash"], "include": ["dayjs"] } }"#);
        let bundler = Arc::new(RecordingBundler::default());
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), Extensions::new())
            .with_bundler(bundler.clone());

        let cache = ctx.paths.app_babel_cache.clone();
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&ctx.paths.dll_node_module).unwrap();
        fs::write(ctx.paths.dll_node_module.join("stale.js"), "old").unwrap();

        let report = execute(&ctx).await.unwrap();

        assert!(!cache.exists());
        assert!(!ctx.paths.dll_node_module.join("stale.js").exists());
        assert_eq!(report.rows.len(), 1);

        let seen = bundler.seen.lock();
        assert_eq!(
            seen[0].entry[DLL_NAME],
            vec!["react".to_string(), "dayjs".to_string()]
        );
        assert_eq!(seen[0].output.path, ctx.paths.dll_node_module);
    }
}
