//! Status message functions for terminal output.
//!
//! All messages go to stderr so that stdout stays free for machine-readable
//! output of the external bundler.

use crate::ui::emit;
use owo_colors::OwoColorize;

/// Print a success message.
///
/// ```no_run
/// use cmpack_cli::ui::success;
///
/// success("Compiled successfully.");
/// ```
pub fn success(message: &str) {
    emit(&format!("{} {}", "✓".green().bold(), message));
}

/// Print an info message.
pub fn info(message: &str) {
    emit(&format!("{} {}", "ℹ".blue().bold(), message));
}

/// Print a warning message.
pub fn warning(message: &str) {
    emit(&format!("{} {}", "⚠".yellow().bold(), message.yellow()));
}

/// Print an error message.
pub fn error(message: &str) {
    emit(&format!("{} {}", "✗".red().bold(), message.red()));
}

/// Print a "work in progress" message (compiling, starting, changed files).
pub fn waiting(message: &str) {
    emit(&format!("{} {}", "…".cyan().bold(), message));
}

/// Print a labelled line, used for the size report and the version banner.
///
/// ```no_run
/// use cmpack_cli::ui::pack;
///
/// pack("version", "0.2.0");
/// ```
pub fn pack(label: &str, message: &str) {
    emit(&format!("  {}  {}", label.bold(), message));
}

/// Print an empty line.
pub fn blank() {
    eprintln!();
}

/// Print a debug message (only if RUST_LOG is set).
pub fn debug(message: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        emit(&format!("{} {}", "◆".dimmed(), message.dimmed()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        success("Success message");
        info("Info message");
        warning("Warning message");
        error("Error message");
        waiting("Compiling...");
        pack("Build", "File sizes after gzip:");
        blank();
        debug("Debug message");
    }
}
