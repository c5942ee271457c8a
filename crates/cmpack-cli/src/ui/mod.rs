//! Terminal UI utilities for status lines and formatted output.
//!
//! This module provides the user-facing output of the CLI: colored status
//! messages, the aligned size report helpers, a spinner for one-shot builds and
//! screen clearing for the dev server. It handles environment detection (CI,
//! TTY, `NO_COLOR`) and degrades gracefully when terminal features aren't
//! available.
//!
//! # Examples
//!
//! ```no_run
//! use cmpack_cli::ui;
//!
//! ui::init_colors();
//! ui::waiting("Creating an optimized production build...");
//! ui::success("Compiled successfully.");
//! ui::pack("Build", "File sizes after gzip:");
//! ```

mod format;
mod messages;
mod spinner;

pub use format::{format_seconds, format_size, format_size_delta, pad_visible};
pub use messages::{blank, debug, error, info, pack, success, waiting, warning};
pub use spinner::Spinner;

use console::Term;
use std::sync::atomic::{AtomicBool, Ordering};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Check if running in a CI environment.
///
/// Detects common CI environment variables from GitHub Actions, GitLab CI,
/// CircleCI, and Travis CI.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
}

/// Check if stdout is attached to a user (not piped, not CI).
pub fn is_interactive() -> bool {
    console::user_attended() && !is_ci()
}

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR environment variables, falls back to
/// terminal capability detection.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}

/// Initialize color support based on environment.
pub fn init_colors() {
    set_colors(should_use_color());
}

/// Disable colors regardless of the environment (`--no-color`).
pub fn disable_colors() {
    set_colors(false);
}

fn set_colors(enabled: bool) {
    COLORS.store(enabled, Ordering::Relaxed);
    owo_colors::set_override(enabled);
}

/// Write one status line to stderr, without escape codes when colors are off.
pub(crate) fn emit(line: &str) {
    if COLORS.load(Ordering::Relaxed) {
        eprintln!("{line}");
    } else {
        eprintln!("{}", console::strip_ansi_codes(line));
    }
}

/// Clear the terminal unless `CLEAR_CONSOLE=none` was requested.
pub fn clear_console(clear_allowed: bool) {
    if clear_allowed {
        let _ = Term::stdout().clear_screen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_is_ci_with_ci_var() {
        std::env::set_var("CI", "true");
        assert!(is_ci());
        assert!(!is_interactive());
        std::env::remove_var("CI");
    }

    #[test]
    #[serial]
    fn test_should_use_color_no_color() {
        std::env::set_var("NO_COLOR", "1");
        std::env::remove_var("FORCE_COLOR");
        assert!(!should_use_color());
        std::env::remove_var("NO_COLOR");
    }

    #[test]
    #[serial]
    fn test_should_use_color_no_color_overrides_force() {
        std::env::set_var("NO_COLOR", "1");
        std::env::set_var("FORCE_COLOR", "1");
        assert!(!should_use_color());
        std::env::remove_var("NO_COLOR");
        std::env::remove_var("FORCE_COLOR");
    }

    #[test]
    #[serial]
    fn test_disable_colors_overrides_stream_detection() {
        use owo_colors::{OwoColorize, Stream};

        disable_colors();
        assert!(!COLORS.load(Ordering::Relaxed));
        let painted = "x".if_supports_color(Stream::Stderr, |t| t.red()).to_string();
        assert_eq!(painted, "x");

        set_colors(true);
        let painted = "x".if_supports_color(Stream::Stderr, |t| t.red()).to_string();
        assert!(painted.contains('\x1b'));

        COLORS.store(true, Ordering::Relaxed);
        owo_colors::unset_override();
    }

    #[test]
    fn test_clear_console_disabled_is_noop() {
        clear_console(false);
    }
}
