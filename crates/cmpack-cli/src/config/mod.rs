//! Project configuration for cmpack.
//!
//! The project config lives in `.cmpack` (JSON with comments) or `.cmpack.js`
//! (an executable script evaluated through [`crate::extension::ConfigScript`]).
//! Loading goes through three steps on the raw JSON document:
//!
//! 1. `env.<NODE_ENV>` is merged over the base object and `env` is dropped
//! 2. `$npm_package_name` / `$npm_package_version` are substituted in
//!    top-level string fields
//! 3. the result is deserialized into one [`RcConfig`] per target
//!
//! Process environment settings (`PORT`, `HTTPS`, ...) are read separately
//! into [`EnvSettings`].

mod defaults;
mod loading;
mod merge;
mod settings;
mod types;
mod validation;
mod variables;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use defaults::*;
pub use loading::{load, load_raw, strip_json_comments, CONFIG_FILE, CONFIG_SCRIPT};
pub(crate) use loading::{parse_json_with_comments, read_manifest_opt};
pub use merge::{merge, merge_env};
pub use settings::EnvSettings;
pub use types::*;
pub use validation::*;
pub use variables::replace_npm_variables;

/// One target of the project configuration (`.cmpack`).
///
/// Every field is optional; accessors supply the defaults. Keys cmpack does
/// not know are kept in `extra` so override hooks can still read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RcConfig {
    /// Entry module(s); defaults to `src/index.{js,jsx,ts,tsx}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntrySpec>,

    /// Output directory, relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,

    /// Global name for library builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_target: Option<String>,

    /// Source map mode, or `false`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<Value>")]
    pub devtool: Option<Devtool>,

    /// Embed content hashes in output file names
    #[serde(default)]
    pub hash: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sass: Option<SassOption>,

    #[serde(rename = "disableCSSModules", default)]
    pub disable_css_modules: bool,

    /// Paths (or extensions) compiled as global CSS even with CSS modules on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css_modules_exclude: Vec<String>,

    /// Extra directories run through babel (e.g. linked local packages)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_babel_includes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_resolve_extensions: Vec<String>,

    /// Passed through to the bundler untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externals: Option<Value>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub alias: IndexMap<String, String>,

    /// Compile-time constants (`DefinePlugin`)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub define: IndexMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dll_plugin: Option<DllPluginOption>,

    /// Dev server reverse proxy: path prefix → target
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub proxy: IndexMap<String, ProxyRule>,

    /// Directories whose SVGs go to the sprite loader
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub svg_sprite_loader_dirs: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub browsers: Vec<String>,

    /// Unknown keys, kept verbatim
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl RcConfig {
    pub fn output_path(&self) -> &str {
        self.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    pub fn public_path(&self) -> &str {
        self.public_path.as_deref().unwrap_or(DEFAULT_PUBLIC_PATH)
    }

    pub fn library_target(&self) -> &str {
        self.library_target
            .as_deref()
            .unwrap_or(DEFAULT_LIBRARY_TARGET)
    }

    pub fn browsers(&self) -> Vec<String> {
        if self.browsers.is_empty() {
            default_browsers()
        } else {
            self.browsers.clone()
        }
    }

    /// Whether the project uses a pre-built DLL bundle.
    pub fn dll_enabled(&self) -> bool {
        match &self.dll_plugin {
            None | Some(DllPluginOption::Enabled(false)) => false,
            Some(_) => true,
        }
    }

    /// DLL include/exclude lists (empty for `dllPlugin: true`).
    pub fn dll_options(&self) -> DllOptions {
        match &self.dll_plugin {
            Some(DllPluginOption::Options(options)) => options.clone(),
            _ => DllOptions::default(),
        }
    }

    pub fn sass_enabled(&self) -> bool {
        self.sass.as_ref().is_some_and(SassOption::is_enabled)
    }

    /// Generate JSON Schema for `.cmpack`.
    pub fn json_schema() -> Value {
        let schema = schemars::schema_for!(RcConfig);
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }
}
