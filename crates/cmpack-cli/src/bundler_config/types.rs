use crate::config::Devtool;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Bundler mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Development => "development",
        }
    }
}

/// A fully assembled, independently buildable target configuration.
///
/// This is the JSON document handed to the external bundler and to override
/// hooks. Regular expressions are carried as their source text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    pub mode: Mode,
    #[serde(default)]
    pub bail: bool,
    #[serde(default)]
    pub devtool: Devtool,
    /// Chunk name → modules, in load order
    #[serde(default)]
    pub entry: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub resolve: Resolve,
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub optimization: Optimization,
    #[serde(default)]
    pub plugins: Vec<Plugin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externals: Option<Value>,
    /// Keys added by override hooks that cmpack does not model
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub path: PathBuf,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_filename: Option<String>,
    pub public_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolve {
    #[serde(default)]
    pub modules: Vec<PathBuf>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub alias: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub rules: Vec<RuleSetRule>,
}

/// Path condition: a directory prefix or a regex over the module path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Regex { regex: String },
    Path(PathBuf),
}

impl Condition {
    pub fn regex(source: impl Into<String>) -> Self {
        Condition::Regex {
            regex: source.into(),
        }
    }

    /// Whether `module` satisfies the condition. An invalid regex matches
    /// nothing.
    pub fn matches(&self, module: &Path) -> bool {
        match self {
            Condition::Path(prefix) => module.starts_with(prefix),
            Condition::Regex { regex } => Regex::new(regex)
                .map(|re| re.is_match(&module.to_string_lossy()))
                .unwrap_or(false),
        }
    }
}

/// A loader with optional options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseEntry {
    pub loader: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl UseEntry {
    pub fn new(loader: &str) -> Self {
        Self {
            loader: loader.to_string(),
            options: None,
        }
    }

    pub fn with_options(loader: &str, options: Value) -> Self {
        Self {
            loader: loader.to_string(),
            options: Some(options),
        }
    }
}

/// One module rule. Within a `oneOf` list the first matching rule wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<Condition>,
    #[serde(default, rename = "use", skip_serializing_if = "Vec::is_empty")]
    pub use_entries: Vec<UseEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<RuleSetRule>,
}

impl RuleSetRule {
    /// Rule testing module paths against the regex `source`.
    pub fn test(source: &str) -> Self {
        Self {
            test: Some(Condition::regex(source)),
            ..Self::default()
        }
    }

    pub fn include(mut self, condition: Condition) -> Self {
        self.include.push(condition);
        self
    }

    pub fn exclude(mut self, condition: Condition) -> Self {
        self.exclude.push(condition);
        self
    }

    pub fn loader(mut self, entry: UseEntry) -> Self {
        self.use_entries.push(entry);
        self
    }

    pub fn loaders(mut self, entries: impl IntoIterator<Item = UseEntry>) -> Self {
        self.use_entries.extend(entries);
        self
    }

    /// Whether this rule's own conditions accept `module`.
    pub fn matches(&self, module: &Path) -> bool {
        self.test.as_ref().map_or(true, |c| c.matches(module))
            && (self.include.is_empty() || self.include.iter().any(|c| c.matches(module)))
            && !self.exclude.iter().any(|c| c.matches(module))
    }

    /// Resolve the loaders applied to `module`, descending into `oneOf`.
    pub fn resolve<'a>(&'a self, module: &Path) -> Option<&'a RuleSetRule> {
        if !self.matches(module) {
            return None;
        }
        if self.one_of.is_empty() {
            Some(self)
        } else {
            first_match(&self.one_of, module)
        }
    }
}

/// The first rule in `rules` that accepts `module`.
pub fn first_match<'a>(rules: &'a [RuleSetRule], module: &Path) -> Option<&'a RuleSetRule> {
    rules.iter().find_map(|rule| rule.resolve(module))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    #[serde(default)]
    pub split_chunks: SplitChunks,
    #[serde(default)]
    pub minimize: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitChunks {
    #[serde(default)]
    pub cache_groups: IndexMap<String, CacheGroup>,
}

/// Chunk selection for a cache group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chunks {
    All,
    Initial,
    Async,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Condition>,
    pub chunks: Chunks,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_chunks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(default)]
    pub enforce: bool,
}

/// A bundler plugin by name, with JSON options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl Plugin {
    pub fn new(name: &str, options: Value) -> Self {
        Self {
            name: name.to_string(),
            options,
        }
    }
}

impl BundlerConfig {
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name == name)
    }
}
