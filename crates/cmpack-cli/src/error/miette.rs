//! Miette diagnostic conversion for CLI errors.
//!
//! Config parse errors are rendered with the offending line of the config file
//! underlined; everything else becomes a plain report.

use crate::error::{BuildError, CliError, ConfigError};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

/// Labelled diagnostic for a malformed project config file.
#[derive(Debug, Error, Diagnostic)]
#[error("Failed to parse {name}: {message}")]
#[diagnostic(
    code(cmpack::config::parse),
    help("Comments are allowed, trailing commas and unquoted keys are not")
)]
struct ConfigParseDiagnostic {
    name: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("invalid JSON here")]
    span: SourceSpan,
    message: String,
}

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(ConfigError::Parse {
            path,
            line,
            column,
            message,
            source_text,
        }) => {
            let offset = offset_of(&source_text, line, column);
            let name = path.display().to_string();
            Report::new(ConfigParseDiagnostic {
                name: name.clone(),
                src: NamedSource::new(name, source_text),
                span: SourceSpan::from((offset, 1)),
                message,
            })
        }
        CliError::Config(e) => ::miette::miette!("Configuration error: {}", e),
        CliError::Build(e) => build_error_to_miette(e),
        _ => ::miette::miette!("{}", err),
    }
}

/// Convert BuildError to miette Report
pub fn build_error_to_miette(err: BuildError) -> Report {
    match err {
        // The individual compiler messages have already been printed.
        BuildError::Compile { errors } => {
            ::miette::miette!("Failed to compile ({} error(s) reported above)", errors.len())
        }
        _ => ::miette::miette!("{}", err),
    }
}

/// Byte offset for a 1-based line/column pair, clamped to the text length.
fn offset_of(text: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (idx, l) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let col = column.saturating_sub(1).min(l.len());
            return (offset + col).min(text.len().saturating_sub(1));
        }
        offset += l.len();
    }
    text.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_offset_of_points_into_line() {
        let text = "{\n  \"a\": 1\n  \"b\": 2\n}";
        // line 3, column 3 is the opening quote of "b"
        let offset = offset_of(text, 3, 3);
        assert_eq!(&text[offset..offset + 1], "\"");
    }

    #[test]
    fn test_offset_of_out_of_range_is_clamped() {
        let text = "{}";
        assert_eq!(offset_of(text, 10, 10), 1);
        assert_eq!(offset_of("", 1, 1), 0);
    }

    #[test]
    fn test_parse_error_becomes_labelled_report() {
        let err = CliError::Config(ConfigError::Parse {
            path: PathBuf::from(".cmpack"),
            line: 1,
            column: 2,
            message: "key must be a string".to_string(),
            source_text: "{a:1}".to_string(),
        });
        let report = cli_error_to_miette(err);
        assert_eq!(
            report.to_string(),
            "Failed to parse .cmpack: key must be a string"
        );
    }
}
