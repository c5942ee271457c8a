//! Process environment settings.

use crate::error::ConfigError;
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Port the dev server tries first.
pub const DEFAULT_PORT: u16 = 8000;

/// Settings read from environment variables once per run.
///
/// `figment` lowercases environment keys, so fields use the lowercase names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSettings {
    /// `NODE_ENV`; commands pick their own default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_env: Option<String>,

    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// `HTTPS=true` serves the dev server over TLS
    #[serde(deserialize_with = "lenient_flag")]
    pub https: bool,

    /// `CLEAR_CONSOLE=none` keeps the terminal from being cleared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_console: Option<String>,

    /// `BROWSER=none` keeps the dev server from opening a browser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// Command line of the external bundler
    #[serde(rename = "cmpack_bundler")]
    pub bundler: String,

    /// Runtime used for `.js` config, override and mock files
    #[serde(rename = "cmpack_node")]
    pub node: String,
}

const KEYS: &[&str] = &[
    "NODE_ENV",
    "PORT",
    "HOST",
    "HTTPS",
    "CLEAR_CONSOLE",
    "BROWSER",
    "CMPACK_BUNDLER",
    "CMPACK_NODE",
];

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            node_env: None,
            port: DEFAULT_PORT,
            host: None,
            https: false,
            clear_console: None,
            browser: None,
            bundler: "node_modules/.bin/webpack".to_string(),
            node: "node".to_string(),
        }
    }
}

impl EnvSettings {
    /// Read settings from the process environment, layered over defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Env::raw().only(KEYS))
            .extract()
            .map_err(|e| ConfigError::InvalidValue {
                field: "environment".to_string(),
                value: e.to_string(),
                hint: "PORT must be a number between 0 and 65535".to_string(),
            })
    }

    /// Environment name, falling back to `default` when `NODE_ENV` is unset.
    pub fn environment<'a>(&'a self, default: &'a str) -> &'a str {
        self.node_env
            .as_deref()
            .filter(|env| !env.is_empty())
            .unwrap_or(default)
    }

    pub fn protocol(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// Host shown in URLs.
    pub fn display_host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// Interface the dev server binds to.
    pub fn bind_host(&self) -> &str {
        self.host.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn clear_console_allowed(&self) -> bool {
        self.clear_console.as_deref() != Some("none")
    }

    pub fn open_browser_allowed(&self) -> bool {
        self.browser.as_deref() != Some("none")
    }
}

/// Only the exact value `true` enables a flag; figment may hand us a parsed
/// boolean or the raw string.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s == "true",
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_env_defaults() {
        figment::Jail::expect_with(|_jail| {
            let settings = EnvSettings::from_env().expect("defaults extract");
            assert_eq!(settings.port, DEFAULT_PORT);
            assert!(!settings.https);
            assert_eq!(settings.environment("development"), "development");
            assert_eq!(settings.protocol(), "http");
            assert!(settings.clear_console_allowed());
            Ok(())
        });
    }

    #[test]
    fn test_settings_from_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORT", "9001");
            jail.set_env("HTTPS", "true");
            jail.set_env("NODE_ENV", "production");
            jail.set_env("CLEAR_CONSOLE", "none");
            jail.set_env("BROWSER", "none");
            jail.set_env("CMPACK_BUNDLER", "bin/fake-bundler --quiet");
            let settings = EnvSettings::from_env().expect("env extract");
            assert_eq!(settings.port, 9001);
            assert!(settings.https);
            assert_eq!(settings.protocol(), "https");
            assert_eq!(settings.environment("development"), "production");
            assert!(!settings.clear_console_allowed());
            assert!(!settings.open_browser_allowed());
            assert_eq!(settings.bundler, "bin/fake-bundler --quiet");
            Ok(())
        });
    }

    #[test]
    fn test_https_only_true_enables_tls() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("HTTPS", "1");
            assert!(!EnvSettings::from_env().expect("extract").https);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORT", "not-a-port");
            assert!(EnvSettings::from_env().is_err());
            Ok(())
        });
    }
}
