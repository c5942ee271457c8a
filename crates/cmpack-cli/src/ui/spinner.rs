//! Simple spinner for tasks without known duration.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Simple spinner shown while the bundler runs a one-shot build.
///
/// When the terminal is not attended (CI, piped output) the spinner is hidden.
/// Callers print their own status line after [`Spinner::stop`].
///
/// # Examples
///
/// ```no_run
/// use cmpack_cli::ui::Spinner;
///
/// let spinner = Spinner::new("Creating an optimized production build...");
/// // Do work...
/// spinner.stop();
/// ```
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    /// Create and start a new spinner.
    pub fn new(message: &str) -> Self {
        let pb = if super::is_interactive() {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒"]);
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// Remove the spinner line without leaving a message behind.
    pub fn stop(&self) {
        self.pb.finish_and_clear();
    }
}
