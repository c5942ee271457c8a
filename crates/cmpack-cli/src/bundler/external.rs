//! Bundler driven as a child process.

use crate::bundler::{BuildStats, Bundler, BundlerEvent};
use crate::bundler_config::BundlerConfig;
use crate::error::BuildError;
use crate::paths::ProjectPaths;
use crate::targets::Targets;
use crate::watcher::{next_batch, FileWatcher, WatchScope};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

/// Assembled configuration, as written for the bundler.
pub const CONFIG_JSON: &str = "bundler-config.json";

/// Loader module passed as `--config`; revives regexes and plugins.
pub const CONFIG_LOADER: &str = "load-config.js";

const LOADER_SOURCE: &str = include_str!("../../assets/load-config.js");

/// Runs `<command> --config <loader> --json` in the project directory and
/// reads the stats report from stdout.
#[derive(Debug, Clone)]
pub struct ExternalBundler {
    program: PathBuf,
    args: Vec<String>,
    root: PathBuf,
    work_dir: PathBuf,
}

impl ExternalBundler {
    /// `command_line` is split on whitespace; a relative program path with a
    /// directory part is taken relative to the project root.
    pub fn new(command_line: &str, paths: &ProjectPaths) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "webpack".to_string());
        let program = if program.contains('/') || program.contains('\\') {
            paths.resolve_app(&program)
        } else {
            PathBuf::from(program)
        };

        Self {
            program,
            args: parts.collect(),
            root: paths.app_directory.clone(),
            work_dir: paths.app_node_modules.join(".cache").join("cmpack"),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Directory holding the written configuration.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    async fn write_config(&self, configs: &Targets<BundlerConfig>) -> Result<PathBuf, BuildError> {
        let write_failed = |e: std::io::Error| {
            BuildError::AssetWriteFailed(format!("{}: {e}", self.work_dir.display()))
        };

        let json = serde_json::to_vec_pretty(configs)
            .map_err(|e| BuildError::Bundler(format!("cannot serialize config: {e}")))?;
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(write_failed)?;
        tokio::fs::write(self.work_dir.join(CONFIG_JSON), json)
            .await
            .map_err(write_failed)?;

        let loader = self.work_dir.join(CONFIG_LOADER);
        tokio::fs::write(&loader, LOADER_SOURCE)
            .await
            .map_err(write_failed)?;
        Ok(loader)
    }
}

#[async_trait]
impl Bundler for ExternalBundler {
    async fn run(&self, configs: &Targets<BundlerConfig>) -> Result<BuildStats, BuildError> {
        let loader = self.write_config(configs).await?;
        tracing::debug!(program = %self.program.display(), config = %loader.display(), "running bundler");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--config")
            .arg(&loader)
            .arg("--json")
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BuildError::Bundler(format!("failed to start {}: {e}", self.program.display()))
            })?;

        parse_stats(
            &output.stdout,
            &output.stderr,
            output.status.success(),
            configs.is_multi(),
        )
    }

    async fn watch(
        &self,
        configs: Targets<BundlerConfig>,
        poll: Duration,
    ) -> Result<mpsc::Receiver<BundlerEvent>, BuildError> {
        let ignore = configs.iter().map(|c| c.output.path.clone()).collect();
        let (watcher, mut changes) =
            FileWatcher::new(self.root.clone(), WatchScope::Tree { ignore }, poll)
                .map_err(|e| BuildError::Bundler(e.to_string()))?;

        let (tx, rx) = mpsc::channel(16);
        let bundler = self.clone();
        tokio::spawn(async move {
            let _watcher = watcher;

            let first = bundler.run(&configs).await;
            if tx.send(BundlerEvent::Done(first)).await.is_err() {
                return;
            }

            while let Some(batch) = next_batch(&mut changes, poll).await {
                tracing::debug!(changes = batch.len(), "sources changed");
                if tx.send(BundlerEvent::Invalidated).await.is_err() {
                    return;
                }
                let result = bundler.run(&configs).await;
                if tx.send(BundlerEvent::Done(result)).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}

/// Stats from the bundler's stdout, which may carry log lines before the
/// JSON document.
fn parse_stats(
    stdout: &[u8],
    stderr: &[u8],
    success: bool,
    multi: bool,
) -> Result<BuildStats, BuildError> {
    let text = String::from_utf8_lossy(stdout);
    let parsed = text
        .find('{')
        .and_then(|start| serde_json::from_str(&text[start..]).ok());

    match parsed {
        Some(value) => BuildStats::from_json(value, multi),
        None if !success => {
            let stderr = String::from_utf8_lossy(stderr);
            let stderr = stderr.trim();
            Err(BuildError::Bundler(if stderr.is_empty() {
                "bundler exited with an error and no stats".to_string()
            } else {
                stderr.to_string()
            }))
        }
        None => Err(BuildError::Bundler(
            "bundler did not print a stats report".to_string(),
        )),
    }
}
