//! Development server command implementation.
//!
//! Orchestrates one dev server lifecycle:
//! - Load `.cmpack` and assemble the development configs
//! - Bind a port and serve the middleware stack
//! - Recompile on source changes and tell the reload client
//! - Re-apply mocks when the mock files change
//! - Stop and ask for a restart when a config file changes

use crate::bundler::{BuildStats, BundlerEvent};
use crate::bundler_config::{
    apply_override, assemble_dev, warn_if_exists, BundlerConfig, OVERRIDE_FILE,
};
use crate::commands::utils;
use crate::config::{read_manifest_opt, RcConfig, ThemeSpec, CONFIG_FILE, CONFIG_SCRIPT};
use crate::context::AppContext;
use crate::dev::mock::{self, MockMiddleware, MockTable};
use crate::dev::server::{self as http, open_browser, write_reload_client};
use crate::dev::stack::{
    Middleware, MiddlewareStack, ASSETS, HISTORY_FALLBACK, MOCK, PROXY, PUBLIC, SPA_ASSETS,
};
use crate::dev::{
    choose_port, AssetCache, AssetMiddleware, DevEvent, DevServerState, Forwarder,
    HistoryFallback, ProxyMiddleware, PublicMiddleware, SharedState,
};
use crate::error::{BuildError, CliError, MockLoadError, Result, ResultExt};
use crate::paths::ProjectPaths;
use crate::targets::Targets;
use crate::ui;
use crate::watcher::{settle_batch, FileWatcher, WatchScope};
use axum_server::Handle;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Debounce between a source change and the recompile.
pub const WATCH_POLL: Duration = Duration::from_millis(200);

/// How one server run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOutcome {
    /// A config file changed; run again with a fresh config
    Restart,
    /// Every candidate port was busy
    NoPort,
    /// Ctrl+C
    Stopped,
}

/// Execute the server command.
///
/// Runs the server until it stops for a reason other than a config change.
///
/// # Errors
///
/// Config and assembly errors, a missing DLL manifest, and server failures.
pub async fn execute(ctx: &AppContext) -> Result<()> {
    loop {
        match run_once(ctx).await? {
            ServerOutcome::Restart => tracing::debug!("restarting dev server"),
            ServerOutcome::NoPort => {
                tracing::debug!(port = ctx.settings.port, "no free port");
                return Ok(());
            }
            ServerOutcome::Stopped => return Ok(()),
        }
    }
}

/// Fail when `dllPlugin` is on but `cmpack buildDll` has not produced the
/// manifest yet.
pub fn check_dll(targets: &Targets<RcConfig>, paths: &ProjectPaths) -> Result<()> {
    let enabled = targets.first().map_or(false, RcConfig::dll_enabled);
    if enabled && !paths.dll_manifest.is_file() {
        return Err(BuildError::DllManifestMissing(paths.dll_manifest.clone()).into());
    }
    Ok(())
}

/// Files whose change restarts the server: the project configs, the
/// override file and a file-based theme.
pub fn config_files(paths: &ProjectPaths, targets: &Targets<RcConfig>) -> Vec<PathBuf> {
    let mut files = vec![
        paths.resolve_app(CONFIG_FILE),
        paths.resolve_app(CONFIG_SCRIPT),
        paths.resolve_app(OVERRIDE_FILE),
    ];
    if let Some(RcConfig {
        theme: Some(ThemeSpec::File(theme)),
        ..
    }) = targets.first()
    {
        files.push(paths.resolve_app(theme));
    }
    files
}

/// `path` relative to the project, as `./rel`.
fn display_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => format!("./{}", rel.display()),
        Err(_) => path.display().to_string(),
    }
}

/// One server run.
///
/// # Errors
///
/// Config and assembly errors, a missing DLL manifest, bundler start
/// failures and server failures.
pub async fn run_once(ctx: &AppContext) -> Result<ServerOutcome> {
    let (targets, configs) = ctx.run_blocking(prepare).await??;

    let Some(listener) = choose_port(ctx.settings.bind_host(), ctx.settings.port) else {
        return Ok(ServerOutcome::NoPort);
    };
    let port = listener.local_addr()?.port();
    let url = format!(
        "{}://{}:{}/",
        ctx.settings.protocol(),
        ctx.settings.display_host(),
        port
    );
    tracing::debug!(%url, targets = configs.len(), "starting dev server");

    let first = targets.first().cloned().unwrap_or_default();
    let mut session = DevSession::new(ctx, &first, url.clone(), ui::is_interactive());
    let dependencies = session.apply_mocks().await;

    let mut events = ctx.bundler.watch(configs, WATCH_POLL).await?;

    let mut watched = config_files(&ctx.paths, &targets);
    let mut mock_files = mock::watched_files(&ctx.paths);
    add_new(&mut mock_files, dependencies);
    watched.extend(mock_files.iter().cloned());
    let (watcher, mut changes) = FileWatcher::new(
        ctx.paths.app_directory.clone(),
        WatchScope::Paths(watched),
        WATCH_POLL,
    )?;

    let handle = Handle::new();
    let mut server = tokio::spawn(http::serve(
        listener,
        http::router(session.state.clone()),
        ctx.settings.https,
        handle.clone(),
    ));

    if session.interactive {
        ui::clear_console(ctx.settings.clear_console_allowed());
    }
    ui::waiting("Starting the development server...");
    if session.interactive {
        session.state.output_mock_error();
        if ctx.settings.open_browser_allowed() {
            open_browser(&url);
        }
    }

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(BundlerEvent::Invalidated) => session.on_invalidated().await,
                Some(BundlerEvent::Done(result)) => session.on_done(result).await,
                None => {
                    tracing::debug!("bundler stopped watching");
                    break ServerOutcome::Stopped;
                }
            },
            Some(first) = changes.recv() => {
                let batch = settle_batch(first, &mut changes, WATCH_POLL).await;
                let config_change = batch
                    .iter()
                    .find(|change| !mock_files.iter().any(|m| change.path().starts_with(m)));
                if let Some(change) = config_change {
                    let message = format!(
                        "File {} changed, try to restart server",
                        display_path(change.path(), &ctx.paths.app_directory)
                    );
                    ui::waiting(&message.green().to_string());
                    break ServerOutcome::Restart;
                }
                if let Some(change) = batch.first() {
                    ui::waiting(&format!(
                        "CHANGED {}",
                        display_path(change.path(), &ctx.paths.app_directory)
                    ));
                    let dependencies = session.apply_mocks().await;
                    watcher.add_paths(add_new(&mut mock_files, dependencies));
                }
            },
            result = &mut server => {
                return match result {
                    Ok(served) => served.map(|()| ServerOutcome::Stopped),
                    Err(e) => Err(CliError::Server(e.to_string())),
                };
            },
            _ = tokio::signal::ctrl_c() => {
                ui::blank();
                break ServerOutcome::Stopped;
            }
        }
    };

    handle.shutdown();
    match server.await {
        Ok(served) => served?,
        Err(e) => tracing::debug!("server task ended: {e}"),
    }
    Ok(outcome)
}

/// Load the config, check the DLL and assemble the development targets.
fn prepare(ctx: &AppContext) -> Result<(Targets<RcConfig>, Targets<BundlerConfig>)> {
    let environment = ctx.settings.environment("development").to_string();
    let targets = match ctx.load_config(&environment) {
        Ok(targets) => targets,
        Err(e) => {
            ui::warning("Failed to parse .cmpack config.");
            return Err(e.into());
        }
    };
    check_dll(&targets, &ctx.paths)?;

    let script = ctx.config_script();
    let assembly = ctx.assembly(&environment, script.as_ref());
    let configs = targets.as_ref().for_each_target(|config| {
        let assembled = assemble_dev(config, &assembly)?;
        Ok::<_, CliError>(apply_override(assembled, &assembly)?)
    })?;
    write_reload_client(&ctx.paths.dev_client).with_path(&ctx.paths.dev_client)?;

    Ok((targets, configs))
}

/// Append the entries of `found` missing from `paths`; returns the added ones.
fn add_new(paths: &mut Vec<PathBuf>, found: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut added = Vec::new();
    for path in found {
        if !paths.contains(&path) {
            paths.push(path.clone());
            added.push(path);
        }
    }
    added
}

/// State of one server run that compile and mock events act on.
struct DevSession<'a> {
    ctx: &'a AppContext,
    state: SharedState,
    forwarder: Forwarder,
    url: String,
    public_path: String,
    interactive: bool,
    first_compile: bool,
}

impl<'a> DevSession<'a> {
    fn new(ctx: &'a AppContext, config: &RcConfig, url: String, interactive: bool) -> Self {
        let forwarder = Forwarder::new();
        let state = Arc::new(DevServerState::new(MiddlewareStack::new()));
        state.set_stack(base_stack(ctx, config, &state, &forwarder));
        Self {
            ctx,
            state,
            forwarder,
            url,
            public_path: config.public_path().to_string(),
            interactive,
            first_compile: true,
        }
    }

    fn clear(&self) {
        if self.interactive {
            ui::clear_console(self.ctx.settings.clear_console_allowed());
        }
    }

    async fn on_invalidated(&mut self) {
        self.clear();
        ui::waiting("Compiling...");
        self.state.broadcast(&DevEvent::Compiling).await;
    }

    async fn on_done(&mut self, result: std::result::Result<BuildStats, BuildError>) {
        self.clear();

        let stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                let errors = vec![e.to_string()];
                utils::print_errors("Failed to compile.", &errors);
                self.state.broadcast(&DevEvent::Errors { errors }).await;
                return;
            }
        };

        let errors = stats.errors();
        let warnings = stats.warnings();
        let successful = errors.is_empty() && warnings.is_empty();
        let show_instructions = successful && (self.interactive || self.first_compile);

        warn_if_exists(&self.ctx.paths);

        if successful {
            if stats.targets.is_multi() {
                ui::success("Compiled successfully");
            } else {
                ui::success(&format!(
                    "Compiled successfully in {}!",
                    ui::format_seconds(stats.time_ms)
                ));
            }
        }

        if show_instructions {
            ui::info("The app is running at:");
            ui::info(&format!("  {}", self.url.cyan()));
            ui::info("Note that the development build is not optimized.");
            ui::info(&format!(
                "To create a production build, use {}.",
                "npm run build".cyan()
            ));
            self.first_compile = false;
        }

        if !errors.is_empty() {
            utils::print_errors("Failed to compile.", &errors);
        } else if !warnings.is_empty() {
            utils::print_errors("Compiled with warnings.", &warnings);
        }

        if self.interactive {
            self.state.output_mock_error();
        }

        if !errors.is_empty() {
            self.state.broadcast(&DevEvent::Errors { errors }).await;
            return;
        }
        match AssetCache::load(&self.ctx.paths.dev_output, &self.public_path) {
            Ok(cache) => {
                tracing::debug!(files = cache.len(), "asset cache refreshed");
                self.state.update_cache(cache);
            }
            Err(e) => ui::error(&format!("Failed to read compiled assets: {e}")),
        }
        self.state.broadcast(&DevEvent::Reload).await;
    }

    /// Load the mock routes and put them in front of the history fallback.
    /// Returns the files the mock script loaded.
    ///
    /// A broken mock file removes the previous routes and is reported now
    /// and again after compiles.
    async fn apply_mocks(&mut self) -> Vec<PathBuf> {
        let loaded = self
            .ctx
            .run_blocking(|ctx| {
                mock::load_entries(&ctx.paths, &ctx.runner, ctx.extensions.mock_routes())
            })
            .await
            .unwrap_or_else(|e| Err(MockLoadError::Load(e.to_string())))
            .and_then(|loaded| {
                MockTable::from_entries(loaded.entries).map(|table| (table, loaded.dependencies))
            });

        match loaded {
            Ok((table, dependencies)) => {
                tracing::debug!(routes = table.len(), "mocks applied");
                let layer: Arc<dyn Middleware> =
                    Arc::new(MockMiddleware::new(table, self.forwarder.clone()));
                self.state.replace_group(MOCK, HISTORY_FALLBACK, vec![layer]);
                self.state.set_mock_error(None);
                dependencies
            }
            Err(e) => {
                self.state.replace_group(MOCK, HISTORY_FALLBACK, Vec::new());
                self.state.set_mock_error(Some(e));
                self.state.output_mock_error();
                Vec::new()
            }
        }
    }
}

/// Every group except the mocks, which [`DevSession::apply_mocks`] adds.
fn base_stack(
    ctx: &AppContext,
    config: &RcConfig,
    state: &DevServerState,
    forwarder: &Forwarder,
) -> MiddlewareStack {
    let has_proxy = read_manifest_opt(&ctx.paths)
        .map_or(false, |manifest| manifest.get("proxy").is_some());

    MiddlewareStack::new()
        .with_group(ASSETS, vec![Arc::new(AssetMiddleware::new(state.cache()))])
        .with_group(
            PROXY,
            vec![Arc::new(ProxyMiddleware::new(&config.proxy, forwarder.clone()))],
        )
        .with_group(HISTORY_FALLBACK, vec![Arc::new(HistoryFallback::new(has_proxy))])
        .with_group(SPA_ASSETS, vec![Arc::new(AssetMiddleware::new(state.cache()))])
        .with_group(
            PUBLIC,
            vec![Arc::new(PublicMiddleware::new(ctx.paths.app_public.clone()))],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Asset, TargetStats};
    use crate::config::EnvSettings;
    use crate::extension::Extensions;
    use std::fs;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> AppContext {
        AppContext::new(dir.path(), EnvSettings::default(), Extensions::new())
    }

    fn dll_config() -> RcConfig {
        serde_json::from_str(r#"{"dllPlugin": true}"#).unwrap()
    }

    #[test]
    fn test_check_dll_requires_manifest() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        assert!(check_dll(&Targets::Single(RcConfig::default()), &paths).is_ok());

        let err = check_dll(&Targets::Single(dll_config()), &paths).unwrap_err();
        assert!(matches!(
            err,
            CliError::Build(BuildError::DllManifestMissing(_))
        ));
        assert!(err.to_string().contains("cmpack buildDll"));

        fs::create_dir_all(paths.dll_manifest.parent().unwrap()).unwrap();
        fs::write(&paths.dll_manifest, "{}").unwrap();
        assert!(check_dll(&Targets::Single(dll_config()), &paths).is_ok());
    }

    #[test]
    fn test_config_files_include_file_theme() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let plain = config_files(&paths, &Targets::Single(RcConfig::default()));
        assert_eq!(plain.len(), 3);
        assert!(plain.contains(&dir.path().join(".cmpack")));
        assert!(plain.contains(&dir.path().join("webpack.config.js")));

        let themed = RcConfig {
            theme: Some(ThemeSpec::File("theme.json".to_string())),
            ..RcConfig::default()
        };
        let files = config_files(&paths, &Targets::Single(themed));
        assert_eq!(files.last().unwrap(), &dir.path().join("theme.json"));
    }

    #[test]
    fn test_display_path() {
        let root = Path::new("/project");
        assert_eq!(display_path(Path::new("/project/.cmpack"), root), "./.cmpack");
        assert_eq!(display_path(Path::new("/elsewhere/x"), root), "/elsewhere/x");
    }

    #[test]
    fn test_add_new_reports_only_unseen_paths() {
        let mut paths = vec![PathBuf::from("/app/.cmpack.mock.js")];
        let added = add_new(
            &mut paths,
            vec![
                PathBuf::from("/app/.cmpack.mock.js"),
                PathBuf::from("/app/fixtures/users.js"),
            ],
        );
        assert_eq!(added, vec![PathBuf::from("/app/fixtures/users.js")]);
        assert_eq!(paths.len(), 2);
        assert!(add_new(&mut paths, vec![PathBuf::from("/app/fixtures/users.js")]).is_empty());
    }

    #[tokio::test]
    async fn test_stack_order() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut session = DevSession::new(
            &ctx,
            &RcConfig::default(),
            "http://localhost:8000/".to_string(),
            false,
        );
        session.apply_mocks().await;

        assert_eq!(
            session.state.stack().names(),
            vec![ASSETS, PROXY, MOCK, HISTORY_FALLBACK, SPA_ASSETS, PUBLIC]
        );
        assert!(session.state.mock_error().is_none());
    }

    #[tokio::test]
    async fn test_broken_mock_clears_routes_and_records_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(mock::MOCK_JSON),
            r#"{"GET /api/ok": {"ok": true}}"#,
        )
        .unwrap();
        let ctx = context(&dir);
        let mut session = DevSession::new(
            &ctx,
            &RcConfig::default(),
            "http://localhost:8000/".to_string(),
            false,
        );
        session.apply_mocks().await;
        assert_eq!(session.state.stack().group_len(MOCK), 1);

        fs::write(dir.path().join(mock::MOCK_JSON), r#"{"GET /api/ok": 1}"#).unwrap();
        session.apply_mocks().await;
        assert_eq!(session.state.stack().group_len(MOCK), 0);
        assert!(session.state.mock_error().is_some());

        fs::write(dir.path().join(mock::MOCK_JSON), r#"{"GET /api/ok": {"ok": false}}"#).unwrap();
        session.apply_mocks().await;
        assert_eq!(session.state.stack().group_len(MOCK), 1);
        assert!(session.state.mock_error().is_none());
    }

    #[tokio::test]
    async fn test_done_refreshes_cache_and_notifies_clients() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        fs::create_dir_all(&ctx.paths.dev_output).unwrap();
        fs::write(ctx.paths.dev_output.join("index.js"), "console.log(1)").unwrap();

        let mut session = DevSession::new(
            &ctx,
            &RcConfig::default(),
            "http://localhost:8000/".to_string(),
            false,
        );
        let (_id, mut rx) = session.state.register_client();

        session
            .on_done(Ok(BuildStats::single(TargetStats {
                assets: vec![Asset {
                    name: "index.js".to_string(),
                    size: 14,
                }],
                ..TargetStats::default()
            })))
            .await;

        assert!(!session.first_compile);
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"reload"}"#);
        let (content, _) = session.state.cached_file("/index.js").unwrap();
        assert_eq!(content, b"console.log(1)");
    }

    #[tokio::test]
    async fn test_done_with_errors_keeps_instructions_pending() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut session = DevSession::new(
            &ctx,
            &RcConfig::default(),
            "http://localhost:8000/".to_string(),
            false,
        );
        let (_id, mut rx) = session.state.register_client();

        session.on_invalidated().await;
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"compiling"}"#);

        session
            .on_done(Ok(BuildStats::single(TargetStats {
                errors: vec!["Module not found".to_string()],
                ..TargetStats::default()
            })))
            .await;

        assert!(session.first_compile);
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"type":"errors","errors":["Module not found"]}"#
        );
    }
}
