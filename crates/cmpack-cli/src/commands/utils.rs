//! Shared utilities for command implementations.

use crate::bundler::BuildStats;
use crate::error::{CliError, Result, ResultExt};
use crate::size::{BuildReport, SizeSnapshot};
use crate::ui;
use owo_colors::OwoColorize;
use std::fs;
use std::path::Path;

/// Remove all contents of `out_dir` but keep the directory itself, so a shell
/// positioned inside it stays valid. Creates the directory if missing.
///
/// # Errors
///
/// Returns I/O errors if directory operations fail.
pub fn clean_output_dir(out_dir: &Path) -> Result<()> {
    if out_dir.exists() {
        if !out_dir.is_dir() {
            return Err(CliError::InvalidArgument(format!(
                "Output path exists but is not a directory: {}",
                out_dir.display()
            )));
        }

        for entry in fs::read_dir(out_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    } else {
        fs::create_dir_all(out_dir)?;
    }

    Ok(())
}

/// Delete a directory tree if it exists.
pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Print a summary line followed by each message, blank-line separated.
pub fn print_errors(summary: &str, messages: &[String]) {
    ui::warning(summary);
    ui::blank();
    for message in messages {
        ui::emit(message);
        ui::blank();
    }
}

/// Print the success line and the size report of a single-target build.
///
/// Returns the measured report so watch mode can use it as the next baseline.
pub fn print_size_report(
    stats: &BuildStats,
    output_dir: &Path,
    display_dir: &str,
    previous: &SizeSnapshot,
) -> Result<BuildReport> {
    let assets = stats
        .targets
        .first()
        .map(|t| t.assets.as_slice())
        .unwrap_or_default();
    let report =
        BuildReport::collect(output_dir, display_dir, assets, previous).with_path(output_dir)?;

    ui::success(&format!(
        "Compiled successfully in {}.",
        ui::format_seconds(stats.time_ms).blue()
    ));
    ui::pack("Build", "File sizes after gzip:");
    ui::blank();
    report.print();
    ui::blank();

    Ok(report)
}
