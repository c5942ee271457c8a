//! Compilation statistics reported by the bundler.

use crate::error::BuildError;
use crate::targets::Targets;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One emitted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// Result of compiling one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default, deserialize_with = "messages")]
    pub errors: Vec<String>,
    #[serde(default, deserialize_with = "messages")]
    pub warnings: Vec<String>,
    #[serde(default, rename = "time")]
    pub time_ms: u64,
}

/// Result of one compile of all targets.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    pub time_ms: u64,
    pub targets: Targets<TargetStats>,
}

impl BuildStats {
    pub fn single(stats: TargetStats) -> Self {
        Self {
            time_ms: stats.time_ms,
            targets: Targets::Single(stats),
        }
    }

    /// Parse bundler `--json` output.
    ///
    /// Multi-target runs report one entry per target under `children`.
    pub fn from_json(value: Value, multi: bool) -> Result<Self, BuildError> {
        let invalid = |e: serde_json::Error| BuildError::Bundler(format!("unreadable stats: {e}"));

        if multi {
            let children = value
                .get("children")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            let targets: Vec<TargetStats> = serde_json::from_value(children).map_err(invalid)?;
            let time_ms = value
                .get("time")
                .and_then(Value::as_u64)
                .unwrap_or_else(|| targets.iter().map(|t| t.time_ms).max().unwrap_or(0));
            Ok(Self {
                time_ms,
                targets: Targets::Multi(targets),
            })
        } else {
            let stats: TargetStats = serde_json::from_value(value).map_err(invalid)?;
            Ok(Self::single(stats))
        }
    }

    pub fn has_errors(&self) -> bool {
        self.targets.iter().any(|t| !t.errors.is_empty())
    }

    pub fn has_warnings(&self) -> bool {
        self.targets.iter().any(|t| !t.warnings.is_empty())
    }

    /// Error messages of every target, in target order.
    pub fn errors(&self) -> Vec<String> {
        self.targets.iter().flat_map(|t| t.errors.clone()).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.targets.iter().flat_map(|t| t.warnings.clone()).collect()
    }

    /// Convert a failed compile into [`BuildError::Compile`].
    pub fn into_result(self) -> Result<Self, BuildError> {
        if self.has_errors() {
            Err(BuildError::Compile {
                errors: self.errors(),
            })
        } else {
            Ok(self)
        }
    }
}

/// Messages come as plain strings or as objects carrying `message`.
fn messages<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|item| match item {
            Value::String(s) => s,
            Value::Object(ref obj) => match obj.get("message").and_then(Value::as_str) {
                Some(message) => match obj.get("moduleName").and_then(Value::as_str) {
                    Some(module) => format!("{module}\n{message}"),
                    None => message.to_string(),
                },
                None => item.to_string(),
            },
            other => other.to_string(),
        })
        .collect())
}
