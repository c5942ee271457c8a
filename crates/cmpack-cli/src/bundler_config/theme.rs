//! Theme (less variable) overrides.

use crate::config::{parse_json_with_comments, RcConfig, ThemeSpec};
use crate::error::BuildError;
use crate::extension::ConfigScript;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;

/// Load the theme variables for a target.
///
/// `theme` may be an inline object or a path (relative to `cwd`) to a `.json`
/// file or a script exporting an object. No theme yields an empty map.
pub fn get_theme(
    cwd: &Path,
    config: &RcConfig,
    script: &dyn ConfigScript,
) -> Result<IndexMap<String, Value>, BuildError> {
    let file = match &config.theme {
        None => return Ok(IndexMap::new()),
        Some(ThemeSpec::Inline(vars)) => return Ok(vars.clone()),
        Some(ThemeSpec::File(file)) => cwd.join(file),
    };

    let theme_error = |reason: String| BuildError::ThemeLoad {
        path: file.clone(),
        reason,
    };

    if !file.is_file() {
        return Err(theme_error("file does not exist".to_string()));
    }

    let value = if file.extension().is_some_and(|ext| ext == "json") {
        let text = std::fs::read_to_string(&file).map_err(|e| theme_error(e.to_string()))?;
        parse_json_with_comments(&file, &text).map_err(|e| theme_error(e.to_string()))?
    } else {
        script.evaluate(&file).map_err(|e| theme_error(e.to_string()))?
    };

    match value {
        Value::Object(vars) => Ok(vars.into_iter().collect()),
        _ => Err(theme_error("theme must export an object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct FixedScript(Value);

    impl ConfigScript for FixedScript {
        fn evaluate(&self, _path: &Path) -> Result<Value, ConfigError> {
            Ok(self.0.clone())
        }
    }

    fn with_theme(theme: ThemeSpec) -> RcConfig {
        RcConfig {
            theme: Some(theme),
            ..RcConfig::default()
        }
    }

    #[test]
    fn test_inline_theme() {
        let mut vars = IndexMap::new();
        vars.insert("@primary-color".to_string(), json!("#1DA57A"));
        let config = with_theme(ThemeSpec::Inline(vars.clone()));
        let theme = get_theme(Path::new("/"), &config, &FixedScript(Value::Null)).unwrap();
        assert_eq!(theme, vars);
    }

    #[test]
    fn test_json_theme_file_with_comments() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("theme.json"),
            "{ // brand\n \"@primary-color\": \"red\" }",
        )
        .unwrap();
        let config = with_theme(ThemeSpec::File("theme.json".to_string()));
        let theme = get_theme(dir.path(), &config, &FixedScript(Value::Null)).unwrap();
        assert_eq!(theme["@primary-color"], json!("red"));
    }

    #[test]
    fn test_script_theme_must_be_object() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("theme.js"), "module.exports = 1").unwrap();
        let config = with_theme(ThemeSpec::File("theme.js".to_string()));

        let err = get_theme(dir.path(), &config, &FixedScript(json!(1))).unwrap_err();
        assert!(matches!(err, BuildError::ThemeLoad { .. }));

        let ok = get_theme(dir.path(), &config, &FixedScript(json!({ "@a": "1px" }))).unwrap();
        assert_eq!(ok["@a"], json!("1px"));
    }

    #[test]
    fn test_missing_theme_file() {
        let config = with_theme(ThemeSpec::File("nope.json".to_string()));
        let err = get_theme(Path::new("/nonexistent"), &config, &FixedScript(Value::Null))
            .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
