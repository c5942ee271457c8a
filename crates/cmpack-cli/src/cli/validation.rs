/// Parse and validate `--output-path`.
///
/// The build empties this directory, so the project root and the filesystem
/// root are refused.
///
/// # Errors
///
/// Returns an error message if the path is empty or would clear a root.
pub fn parse_output_path(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Output path cannot be empty".to_string());
    }

    if matches!(trimmed, "." | "./" | "/" | "\\") {
        return Err(format!(
            "Refusing to use '{}' as output path: its contents are deleted before every build",
            s
        ));
    }

    Ok(trimmed.to_string())
}
