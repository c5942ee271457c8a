//! Plugin lists.

use crate::bundler_config::Plugin;
use crate::config::RcConfig;
use crate::paths::ProjectPaths;
use serde_json::{json, Map, Value};
use std::path::Path;

pub const EXTRACT_PLUGIN: &str = "MiniCssExtractPlugin";
pub const VISUALIZER_PLUGIN: &str = "Visualizer";
pub const DLL_PLUGIN: &str = "DllPlugin";
pub const DLL_REFERENCE_PLUGIN: &str = "DllReferencePlugin";

/// Report file written by the bundle visualizer, relative to the output dir.
pub const ANALYZE_REPORT: &str = "stats.html";

/// Compile-time constants: `process.env.NODE_ENV` plus the `define` map,
/// each value JSON-encoded the way `DefinePlugin` expects.
fn define_options(config: &RcConfig, node_env: &str) -> Value {
    let mut defs = Map::new();
    defs.insert(
        "process.env.NODE_ENV".to_string(),
        Value::String(Value::String(node_env.to_string()).to_string()),
    );
    for (key, value) in &config.define {
        defs.insert(key.clone(), Value::String(value.to_string()));
    }
    Value::Object(defs)
}

/// Plugins every production and development target gets.
pub fn get_common_plugins(
    config: &RcConfig,
    paths: &ProjectPaths,
    output_dir: &Path,
    node_env: &str,
) -> Vec<Plugin> {
    let mut plugins = vec![
        Plugin::new("DefinePlugin", define_options(config, node_env)),
        Plugin::new("CaseSensitivePathsPlugin", Value::Null),
        Plugin::new(
            "IgnorePlugin",
            json!({ "resourceRegExp": { "regex": r"^\./locale$" }, "contextRegExp": { "regex": "moment$" } }),
        ),
    ];

    if paths.app_public.is_dir() {
        plugins.push(Plugin::new(
            "CopyPlugin",
            json!({ "patterns": [{ "from": paths.app_public, "to": output_dir }] }),
        ));
    }

    let template = paths.app_public.join("index.html");
    if template.is_file() {
        plugins.push(Plugin::new(
            "HtmlWebpackPlugin",
            json!({ "template": template, "inject": true }),
        ));
    }

    if config.dll_enabled() {
        plugins.push(Plugin::new(
            DLL_REFERENCE_PLUGIN,
            json!({ "context": paths.app_directory, "manifest": paths.dll_manifest }),
        ));
    }

    plugins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DllPluginOption;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_define_encodes_values() {
        let mut config = RcConfig::default();
        config.define.insert("API".to_string(), json!("https://api"));
        config.define.insert("DEBUG".to_string(), json!(false));
        let defs = define_options(&config, "production");
        assert_eq!(defs["process.env.NODE_ENV"], json!("\"production\""));
        assert_eq!(defs["API"], json!("\"https://api\""));
        assert_eq!(defs["DEBUG"], json!("false"));
    }

    #[test]
    fn test_public_dir_enables_copy_and_html() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/index.html"), "<html></html>").unwrap();
        let paths = ProjectPaths::new(dir.path());

        let names: Vec<String> =
            get_common_plugins(&RcConfig::default(), &paths, &dir.path().join("dist"), "production")
                .into_iter()
                .map(|p| p.name)
                .collect();
        assert!(names.contains(&"CopyPlugin".to_string()));
        assert!(names.contains(&"HtmlWebpackPlugin".to_string()));
        assert!(!names.contains(&DLL_REFERENCE_PLUGIN.to_string()));
    }

    #[test]
    fn test_dll_reference_when_enabled() {
        let paths = ProjectPaths::new("/app");
        let config = RcConfig {
            dll_plugin: Some(DllPluginOption::Enabled(true)),
            ..RcConfig::default()
        };
        let plugins = get_common_plugins(&config, &paths, Path::new("/app/dist"), "development");
        let dll = plugins.iter().find(|p| p.name == DLL_REFERENCE_PLUGIN).unwrap();
        assert_eq!(
            dll.options["manifest"],
            json!("/app/node_modules/cmpack-dlls/cmpack.json")
        );
    }
}
