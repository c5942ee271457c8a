use crate::config::merge::merge_env;
use crate::config::variables::{has_npm_variables, replace_npm_variables};
use crate::config::{validate_config, RcConfig};
use crate::error::ConfigError;
use crate::extension::ConfigScript;
use crate::paths::ProjectPaths;
use crate::targets::Targets;
use crate::ui;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// JSON-with-comments project config.
pub const CONFIG_FILE: &str = ".cmpack";

/// Executable project config, used only when [`CONFIG_FILE`] is absent.
pub const CONFIG_SCRIPT: &str = ".cmpack.js";

/// Load and deserialize the project config for `environment`.
///
/// Safe to call repeatedly; only reads files.
pub fn load(
    paths: &ProjectPaths,
    environment: &str,
    script: &dyn ConfigScript,
) -> Result<Targets<RcConfig>, ConfigError> {
    let (source, raw) = load_raw(paths, environment, script)?;
    raw.for_each_target(|object| {
        let config: RcConfig =
            serde_json::from_value(Value::Object(object)).map_err(|e| {
                ConfigError::InvalidShape {
                    path: source.clone(),
                    message: e.to_string(),
                }
            })?;
        validate_config(&config)?;
        Ok(config)
    })
}

/// Load the raw config documents with env overrides and variables applied.
///
/// Returns the file the config came from (the `.cmpack` path when neither
/// file exists) together with one JSON object per target.
pub fn load_raw(
    paths: &ProjectPaths,
    environment: &str,
    script: &dyn ConfigScript,
) -> Result<(PathBuf, Targets<Map<String, Value>>), ConfigError> {
    let (source, document) = read_document(paths, environment, script)?;
    let targets = into_targets(&source, document)?;

    let mut manifest: Option<Value> = None;
    let targets = targets.for_each_target(|mut object| {
        merge_env(&mut object, environment);
        if has_npm_variables(&object) {
            if manifest.is_none() {
                manifest = Some(read_manifest(&paths.app_package_json)?);
            }
            if let Some(manifest) = &manifest {
                replace_npm_variables(&mut object, manifest);
            }
        }
        Ok::<_, ConfigError>(object)
    })?;

    tracing::debug!(
        source = %source.display(),
        targets = targets.len(),
        environment,
        "loaded project config"
    );
    Ok((source, targets))
}

fn read_document(
    paths: &ProjectPaths,
    environment: &str,
    script: &dyn ConfigScript,
) -> Result<(PathBuf, Value), ConfigError> {
    let rc_path = paths.resolve_app(CONFIG_FILE);
    let js_path = paths.resolve_app(CONFIG_SCRIPT);

    if rc_path.is_file() {
        if environment == "development" && js_path.is_file() {
            ui::warning(&format!(
                "Config error: You must delete {} if you want to use {}",
                rc_path.display(),
                js_path.display()
            ));
        }
        let text = std::fs::read_to_string(&rc_path)?;
        let value = parse_json_with_comments(&rc_path, &text)?;
        Ok((rc_path, value))
    } else if js_path.is_file() {
        let value = script.evaluate(&js_path)?;
        Ok((js_path, value))
    } else {
        Ok((rc_path, Value::Object(Map::new())))
    }
}

fn into_targets(source: &Path, document: Value) -> Result<Targets<Map<String, Value>>, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidShape {
        path: source.to_path_buf(),
        message,
    };

    match document {
        Value::Object(object) => Ok(Targets::Single(object)),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(object) => Ok(object),
                other => Err(invalid(format!(
                    "target {} is {}, expected an object",
                    idx,
                    kind_of(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Targets::Multi),
        other => Err(invalid(format!("found {}", kind_of(&other)))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a JSON document that may contain `//` and `/* */` comments.
///
/// Errors carry the 1-based line and column in the original text.
pub(crate) fn parse_json_with_comments(path: &Path, text: &str) -> Result<Value, ConfigError> {
    let stripped = strip_json_comments(text);
    serde_json::from_str(&stripped).map_err(|e| {
        let full = e.to_string();
        let message = full
            .rsplit_once(" at line ")
            .map(|(head, _)| head.to_string())
            .unwrap_or(full);
        ConfigError::Parse {
            path: path.to_path_buf(),
            line: e.line(),
            column: e.column(),
            message,
            source_text: text.to_string(),
        }
    })
}

/// Blank out comments, keeping every other byte (and all newlines) in place
/// so parser positions still match the original text.
pub fn strip_json_comments(text: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        String,
        Escape,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '"' => {
                    state = State::String;
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::String => {
                match c {
                    '\\' => state = State::Escape,
                    '"' => state = State::Code,
                    _ => {}
                }
                out.push(c);
            }
            State::Escape => {
                state = State::String;
                out.push(c);
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push(c);
                } else {
                    blank(&mut out, c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }

    out
}

fn blank(out: &mut String, c: char) {
    match c {
        '\n' | '\r' => out.push(c),
        // one space per byte keeps byte offsets stable
        _ => out.extend(std::iter::repeat(' ').take(c.len_utf8())),
    }
}

fn read_manifest(path: &Path) -> Result<Value, ConfigError> {
    let text =
        std::fs::read_to_string(path).map_err(|_| ConfigError::MissingManifest(path.to_path_buf()))?;
    serde_json::from_str(&text).map_err(|_| ConfigError::MissingManifest(path.to_path_buf()))
}

/// Read the project manifest, if present and valid.
pub(crate) fn read_manifest_opt(paths: &ProjectPaths) -> Option<Value> {
    read_manifest(&paths.app_package_json).ok()
}
