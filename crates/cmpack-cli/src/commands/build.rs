//! Build command implementation.
//!
//! This module implements `cmpack build`: measure the previous output, clear
//! it, run the bundler over every target and print gzip sizes with the change
//! since the previous build.

use crate::bundler::{BuildStats, BundlerEvent};
use crate::bundler_config::{
    apply_override, assemble_prod, warn_if_exists, BundlerConfig, ProdOptions,
};
use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::config::{RcConfig, DEFAULT_OUTPUT_PATH};
use crate::context::AppContext;
use crate::error::{BuildError, CliError, Result, ResultExt};
use crate::size::{BuildReport, SizeSnapshot};
use crate::targets::Targets;
use crate::ui;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Duration;

/// Debounce between a source change and the rebuild in `--watch` mode.
pub const WATCH_POLL: Duration = Duration::from_millis(200);

/// Everything decided before the bundler starts.
struct BuildPlan {
    configs: Targets<BundlerConfig>,
    output_dir: PathBuf,
    /// Output path as the user wrote it, used in report lines.
    display_dir: String,
    previous: SizeSnapshot,
    analyze: bool,
}

/// Execute the build command.
///
/// # Build Process
///
/// 1. Load `.cmpack` for `NODE_ENV` (default `production`)
/// 2. Assemble one production config per target and apply the override hook
/// 3. Measure the existing output, then empty the output directory
/// 4. Run the bundler once, or keep rebuilding with `--watch`
/// 5. Print errors, or the size report of the new output
///
/// # Errors
///
/// Config and assembly errors, bundler failures and (outside watch mode)
/// compile errors.
pub async fn execute(ctx: &AppContext, args: BuildArgs) -> Result<()> {
    if args.watch {
        let plan = prepare_blocking(ctx, &args).await?;
        watch(ctx, plan).await
    } else {
        build(ctx, &args).await.map(|_| ())
    }
}

/// One-shot build. Returns the size report of a single-target build.
///
/// # Errors
///
/// Returns [`BuildError::Compile`] when any target reports compile errors;
/// the messages have been printed by then.
pub async fn build(ctx: &AppContext, args: &BuildArgs) -> Result<Option<BuildReport>> {
    let plan = prepare_blocking(ctx, args).await?;

    let spinner = ui::Spinner::new("Compiling...");
    let result = ctx.bundler.run(&plan.configs).await;
    spinner.stop();

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            utils::print_errors("Failed to compile.", &[e.to_string()]);
            return Err(e.into());
        }
    };
    report(ctx, &stats, &plan)
}

/// Output path for this run: `--output-path`, else the first target's
/// `outputPath`, else `dist`.
pub fn output_path<'a>(args: &'a BuildArgs, targets: &'a Targets<RcConfig>) -> &'a str {
    args.output_path
        .as_deref()
        .or_else(|| targets.first().map(RcConfig::output_path))
        .unwrap_or(DEFAULT_OUTPUT_PATH)
}

/// [`prepare`] off the async workers; project scripts run as child processes.
async fn prepare_blocking(ctx: &AppContext, args: &BuildArgs) -> Result<BuildPlan> {
    let args = args.clone();
    ctx.run_blocking(move |ctx| prepare(ctx, &args)).await?
}

fn prepare(ctx: &AppContext, args: &BuildArgs) -> Result<BuildPlan> {
    let environment = ctx.settings.environment("production").to_string();
    let targets = match ctx.load_config(&environment) {
        Ok(targets) => targets,
        Err(e) => {
            ui::warning("Failed to parse .cmpack config.");
            return Err(e.into());
        }
    };

    let display_dir = output_path(args, &targets).to_string();
    let output_dir = ctx.paths.resolve_app(&display_dir);
    tracing::debug!(output = %output_dir.display(), targets = targets.len(), "building");

    let script = ctx.config_script();
    let assembly = ctx.assembly(&environment, script.as_ref());
    let options = ProdOptions {
        debug: args.debug,
        analyze: args.analyze,
    };
    let configs = targets.for_each_target(|config| {
        let assembled = assemble_prod(options, &output_dir, &config, &assembly)?;
        Ok::<_, CliError>(apply_override(assembled, &assembly)?)
    })?;

    // Measure before clearing; the sizes are the baseline for the report.
    let previous = SizeSnapshot::take(&output_dir).with_path(&output_dir)?;
    utils::clean_output_dir(&output_dir)?;

    if args.debug {
        ui::waiting("Creating an development build without compress...");
    } else {
        ui::waiting("Creating an optimized production build...");
    }
    ui::blank();

    Ok(BuildPlan {
        configs,
        output_dir,
        display_dir,
        previous,
        analyze: args.analyze,
    })
}

fn report(ctx: &AppContext, stats: &BuildStats, plan: &BuildPlan) -> Result<Option<BuildReport>> {
    if stats.has_errors() {
        let errors = stats.errors();
        utils::print_errors("Failed to compile.", &errors);
        return Err(BuildError::Compile { errors }.into());
    }

    warn_if_exists(&ctx.paths);
    let report = if stats.targets.is_multi() {
        ui::success("Compiled successfully.");
        None
    } else {
        Some(utils::print_size_report(
            stats,
            &plan.output_dir,
            &plan.display_dir,
            &plan.previous,
        )?)
    };

    if plan.analyze {
        let stats_file = format!("{}/stats.html", plan.display_dir);
        ui::pack(
            "Build",
            &format!("Analyze result is generated at {}.", stats_file.cyan()),
        );
    }

    Ok(report)
}

/// Rebuild on every change until Ctrl+C. Compile errors are printed and the
/// loop keeps waiting for the next save.
async fn watch(ctx: &AppContext, mut plan: BuildPlan) -> Result<()> {
    let mut events = ctx.bundler.watch(plan.configs.clone(), WATCH_POLL).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    on_watch_event(ctx, &mut plan, event);
                }
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                ui::blank();
                return Ok(());
            }
        }
    }
}

/// Report one watch event. A successful single-target report becomes the
/// baseline for the next rebuild.
fn on_watch_event(
    ctx: &AppContext,
    plan: &mut BuildPlan,
    event: BundlerEvent,
) -> Option<BuildReport> {
    match event {
        BundlerEvent::Invalidated => {
            tracing::debug!("sources changed, rebuilding");
            None
        }
        BundlerEvent::Done(Ok(stats)) => match report(ctx, &stats, plan) {
            Ok(Some(report)) => {
                plan.previous = report.to_snapshot();
                Some(report)
            }
            Ok(None) | Err(CliError::Build(BuildError::Compile { .. })) => None,
            Err(e) => {
                ui::error(&e.to_string());
                None
            }
        },
        BundlerEvent::Done(Err(e)) => {
            utils::print_errors("Failed to compile.", &[e.to_string()]);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Asset, Bundler, TargetStats};
    use crate::config::EnvSettings;
    use crate::error::ConfigError;
    use crate::extension::{ConfigScript, Extensions};
    use crate::size::SizeDelta;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Writes `main.js` with fixed contents into every target's output.
    struct WritingBundler {
        contents: Vec<u8>,
        errors: Vec<String>,
    }

    #[async_trait]
    impl Bundler for WritingBundler {
        async fn run(
            &self,
            configs: &Targets<BundlerConfig>,
        ) -> std::result::Result<BuildStats, BuildError> {
            let mut targets = Vec::new();
            for config in configs {
                fs::create_dir_all(&config.output.path).unwrap();
                fs::write(config.output.path.join("main.js"), &self.contents).unwrap();
                targets.push(TargetStats {
                    assets: vec![Asset {
                        name: "main.js".to_string(),
                        size: self.contents.len() as u64,
                    }],
                    errors: self.errors.clone(),
                    ..TargetStats::default()
                });
            }
            Ok(BuildStats {
                time_ms: 1200,
                targets: match configs {
                    Targets::Single(_) => Targets::Single(targets.remove(0)),
                    Targets::Multi(_) => Targets::Multi(targets),
                },
            })
        }

        async fn watch(
            &self,
            _configs: Targets<BundlerConfig>,
            _poll: Duration,
        ) -> std::result::Result<mpsc::Receiver<BundlerEvent>, BuildError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    /// Replays a fixed list of watch events, then stops watching.
    struct ReplayBundler {
        events: Mutex<Vec<BundlerEvent>>,
    }

    #[async_trait]
    impl Bundler for ReplayBundler {
        async fn run(
            &self,
            _configs: &Targets<BundlerConfig>,
        ) -> std::result::Result<BuildStats, BuildError> {
            Err(BuildError::Bundler("only watches".to_string()))
        }

        async fn watch(
            &self,
            _configs: Targets<BundlerConfig>,
            _poll: Duration,
        ) -> std::result::Result<mpsc::Receiver<BundlerEvent>, BuildError> {
            let events = std::mem::take(&mut *self.events.lock());
            let (tx, rx) = mpsc::channel(events.len().max(1));
            for event in events {
                tx.try_send(event).unwrap();
            }
            Ok(rx)
        }
    }

    fn main_js_stats(errors: Vec<String>) -> BuildStats {
        BuildStats::single(TargetStats {
            assets: vec![Asset {
                name: "main.js".to_string(),
                size: 0,
            }],
            errors,
            ..TargetStats::default()
        })
    }

    fn script(lines: usize) -> String {
        (0..lines).map(|i| format!("var v{i} = {i};\n")).collect()
    }

    fn project(rc: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/index.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join(".cmpack"), rc).unwrap();
        dir
    }

    fn context(dir: &TempDir, bundler: WritingBundler) -> AppContext {
        AppContext::new(dir.path(), EnvSettings::default(), Extensions::new())
            .with_bundler(Arc::new(bundler))
    }

    #[test]
    fn test_output_path_precedence() {
        let targets = Targets::Multi(vec![
            RcConfig {
                output_path: Some("first".to_string()),
                ..RcConfig::default()
            },
            RcConfig {
                output_path: Some("second".to_string()),
                ..RcConfig::default()
            },
        ]);
        assert_eq!(output_path(&BuildArgs::default(), &targets), "first");

        let args = BuildArgs {
            output_path: Some("cli".to_string()),
            ..BuildArgs::default()
        };
        assert_eq!(output_path(&args, &targets), "cli");
        assert_eq!(
            output_path(&BuildArgs::default(), &Targets::Multi(Vec::new())),
            DEFAULT_OUTPUT_PATH
        );
    }

    #[tokio::test]
    async fn test_build_clears_stale_output_and_reports() {
        let dir = project(r#"{ "outputPath": "out" }"#);
        fs::create_dir_all(dir.path().join("out/static")).unwrap();
        fs::write(dir.path().join("out/static/stale.js"), "old").unwrap();

        let ctx = context(
            &dir,
            WritingBundler {
                contents: b"console.log('hello')".to_vec(),
                errors: Vec::new(),
            },
        );
        let report = build(&ctx, &BuildArgs::default()).await.unwrap().unwrap();

        assert!(!dir.path().join("out/static/stale.js").exists());
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].name, "main.js");
        assert_eq!(report.rows[0].folder, "out");
    }

    #[tokio::test]
    async fn test_build_compile_errors_fail() {
        let dir = project("{}");
        let ctx = context(
            &dir,
            WritingBundler {
                contents: b"x".to_vec(),
                errors: vec!["Module not found: ./missing".to_string()],
            },
        );
        let err = build(&ctx, &BuildArgs::default()).await.unwrap_err();
        match err {
            CliError::Build(BuildError::Compile { errors }) => {
                assert_eq!(errors, vec!["Module not found: ./missing".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multi_target_build_has_no_report() {
        let dir = project(r#"[{ "outputPath": "dist" }, { "library": "Lib" }]"#);
        let ctx = context(
            &dir,
            WritingBundler {
                contents: b"x".to_vec(),
                errors: Vec::new(),
            },
        );
        let report = build(&ctx, &BuildArgs::default()).await.unwrap();
        assert!(report.is_none());
        assert!(dir.path().join("dist/main.js").is_file());
    }

    #[tokio::test]
    async fn test_malformed_config_is_a_config_error() {
        let dir = project("{ \"hash\": true,, }");
        let ctx = context(
            &dir,
            WritingBundler {
                contents: Vec::new(),
                errors: Vec::new(),
            },
        );
        let err = build(&ctx, &BuildArgs::default()).await.unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[tokio::test]
    async fn test_watch_event_refreshes_baseline_after_errors() {
        let dir = project(r#"{ "outputPath": "out" }"#);
        let ctx = context(
            &dir,
            WritingBundler {
                contents: Vec::new(),
                errors: Vec::new(),
            },
        );
        let args = BuildArgs {
            watch: true,
            ..BuildArgs::default()
        };
        let mut plan = prepare(&ctx, &args).unwrap();
        let main_js = dir.path().join("out/main.js");
        fs::write(&main_js, script(200)).unwrap();

        let failed = BundlerEvent::Done(Ok(main_js_stats(vec!["Unexpected token".to_string()])));
        assert!(on_watch_event(&ctx, &mut plan, failed).is_none());
        assert!(plan.previous.is_empty());

        let success = BundlerEvent::Done(Ok(main_js_stats(Vec::new())));
        let first = on_watch_event(&ctx, &mut plan, success).unwrap();
        assert_eq!(first.rows[0].delta, SizeDelta::Unchanged);
        assert_eq!(plan.previous.get("main.js"), Some(first.rows[0].size));

        fs::write(&main_js, script(400)).unwrap();
        let success = BundlerEvent::Done(Ok(main_js_stats(Vec::new())));
        let second = on_watch_event(&ctx, &mut plan, success).unwrap();
        assert!(second.rows[0].size > first.rows[0].size);
        assert_eq!(
            second.rows[0].delta,
            SizeDelta::Growth(second.rows[0].size - first.rows[0].size)
        );
        assert_eq!(plan.previous.get("main.js"), Some(second.rows[0].size));
    }

    #[tokio::test]
    async fn test_watch_survives_failed_compiles_until_stream_ends() {
        let dir = project(r#"{ "outputPath": "out" }"#);
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), Extensions::new())
            .with_bundler(Arc::new(ReplayBundler {
                events: Mutex::new(vec![
                    BundlerEvent::Invalidated,
                    BundlerEvent::Done(Err(BuildError::Bundler("crashed".to_string()))),
                    BundlerEvent::Done(Ok(main_js_stats(vec!["Unexpected token".to_string()]))),
                    BundlerEvent::Invalidated,
                    BundlerEvent::Done(Ok(main_js_stats(Vec::new()))),
                ]),
            }));
        let args = BuildArgs {
            watch: true,
            ..BuildArgs::default()
        };
        let plan = prepare(&ctx, &args).unwrap();
        fs::write(dir.path().join("out/main.js"), script(10)).unwrap();

        watch(&ctx, plan).await.unwrap();
    }

    struct ScriptedConfig;

    impl ConfigScript for ScriptedConfig {
        fn evaluate(
            &self,
            _path: &std::path::Path,
        ) -> std::result::Result<serde_json::Value, ConfigError> {
            Ok(serde_json::json!({ "outputPath": "scripted" }))
        }
    }

    #[tokio::test]
    async fn test_build_uses_registered_config_script() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/index.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join(".cmpack.js"), "module.exports = {}").unwrap();

        let extensions = Extensions::new().with_config_script(ScriptedConfig);
        let ctx = AppContext::new(dir.path(), EnvSettings::default(), extensions).with_bundler(
            Arc::new(WritingBundler {
                contents: b"x".to_vec(),
                errors: Vec::new(),
            }),
        );
        let report = build(&ctx, &BuildArgs::default()).await.unwrap().unwrap();

        assert!(dir.path().join("scripted/main.js").is_file());
        assert_eq!(report.rows[0].folder, "scripted");
    }
}
