//! Formatting utilities for sizes, durations, and report alignment.


const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

/// Format file size in human-readable format.
///
/// Converts bytes to the most appropriate binary unit (B, KB, MB, GB) with at
/// most two decimals; trailing zeros are dropped so sizes read like
/// `1.5 KB` rather than `1.50 KB`.
///
/// # Examples
///
/// ```
/// use cmpack_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1 KB");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(1_048_576), "1 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        let rounded = format!("{:.2}", size);
        let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
        format!("{} {}", trimmed, UNITS[unit_idx])
    }
}

/// Format a signed size difference, always carrying an explicit sign.
///
/// ```
/// use cmpack_cli::ui::format_size_delta;
///
/// assert_eq!(format_size_delta(2048), "+2 KB");
/// assert_eq!(format_size_delta(-300), "-300 B");
/// ```
pub fn format_size_delta(delta: i64) -> String {
    let sign = if delta < 0 { '-' } else { '+' };
    format!("{}{}", sign, format_size(delta.unsigned_abs()))
}

/// Format a millisecond count as seconds with one decimal (`1.2s`).
pub fn format_seconds(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

/// Right-pad `text` to `width` visible columns.
///
/// ANSI escape sequences are ignored when measuring, so colored labels line
/// up with plain ones.
pub fn pad_visible(text: &str, width: usize) -> String {
    let visible = console::measure_text_width(text);
    if visible >= width {
        return text.to_string();
    }
    format!("{}{}", text, " ".repeat(width - visible))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_zero() {
        assert_eq!(format_size(0), "0 B");
    }

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(1), "1 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_kilobytes() {
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(2000), "1.95 KB");
        assert_eq!(format_size(51_200), "50 KB");
    }

    #[test]
    fn test_format_size_megabytes() {
        assert_eq!(format_size(1_048_576), "1 MB");
        assert_eq!(format_size(1_572_864), "1.5 MB");
    }

    #[test]
    fn test_format_size_gigabytes() {
        assert_eq!(format_size(2_147_483_648), "2 GB");
    }

    #[test]
    fn test_format_size_delta_signs() {
        assert_eq!(format_size_delta(0), "+0 B");
        assert_eq!(format_size_delta(10), "+10 B");
        assert_eq!(format_size_delta(-1536), "-1.5 KB");
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1234), "1.2s");
        assert_eq!(format_seconds(0), "0.0s");
    }

    #[test]
    fn test_pad_visible_ignores_ansi() {
        let colored = "\u{1b}[32mabc\u{1b}[0m";
        let padded = pad_visible(colored, 5);
        assert_eq!(console::measure_text_width(&padded), 5);
        assert!(padded.ends_with("  "));
        assert_eq!(pad_visible("abcdef", 3), "abcdef");
    }
}
