use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entry declaration: one path, a list of paths, or named entries.
///
/// Paths may be glob patterns relative to the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum EntrySpec {
    Single(String),
    List(Vec<String>),
    Named(IndexMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum DevtoolRepr {
    Flag(bool),
    Name(String),
}

/// Source map mode. `false` in JSON disables source maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DevtoolRepr", into = "DevtoolRepr")]
pub enum Devtool {
    #[default]
    Disabled,
    Named(String),
}

impl From<DevtoolRepr> for Devtool {
    fn from(repr: DevtoolRepr) -> Self {
        match repr {
            DevtoolRepr::Flag(true) => Devtool::Named(crate::config::DEFAULT_DEVTOOL.to_string()),
            DevtoolRepr::Flag(false) => Devtool::Disabled,
            DevtoolRepr::Name(name) => Devtool::Named(name),
        }
    }
}

impl From<Devtool> for DevtoolRepr {
    fn from(devtool: Devtool) -> Self {
        match devtool {
            Devtool::Disabled => DevtoolRepr::Flag(false),
            Devtool::Named(name) => DevtoolRepr::Name(name),
        }
    }
}

/// Theme overrides: inline variables or a `.json`/`.js` file exporting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ThemeSpec {
    File(String),
    Inline(IndexMap<String, Value>),
}

/// `sass: true` or sass-loader options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SassOption {
    Enabled(bool),
    Options(serde_json::Map<String, Value>),
}

impl SassOption {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SassOption::Enabled(false))
    }

    /// Loader options, empty for the boolean form.
    pub fn loader_options(&self) -> serde_json::Map<String, Value> {
        match self {
            SassOption::Options(options) => options.clone(),
            SassOption::Enabled(_) => serde_json::Map::new(),
        }
    }
}

/// Dependencies to leave out of or add to the DLL bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DllOptions {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
}

/// `dllPlugin: true` or `{ exclude, include }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DllPluginOption {
    Enabled(bool),
    Options(DllOptions),
}

/// Detailed reverse-proxy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOptions {
    pub target: String,
    #[serde(default)]
    pub change_origin: bool,
    /// Regex source → replacement, applied to the request path in order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub path_rewrite: IndexMap<String, String>,
}

/// Proxy rule for one path prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ProxyRule {
    Target(String),
    Detailed(ProxyOptions),
}

impl ProxyRule {
    pub fn target(&self) -> &str {
        match self {
            ProxyRule::Target(target) => target,
            ProxyRule::Detailed(options) => &options.target,
        }
    }

    pub fn change_origin(&self) -> bool {
        match self {
            ProxyRule::Target(_) => false,
            ProxyRule::Detailed(options) => options.change_origin,
        }
    }

    pub fn path_rewrite(&self) -> Option<&IndexMap<String, String>> {
        match self {
            ProxyRule::Target(_) => None,
            ProxyRule::Detailed(options) => Some(&options.path_rewrite),
        }
    }
}
