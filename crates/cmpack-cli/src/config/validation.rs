use crate::config::{RcConfig, LIBRARY_TARGETS};
use crate::error::ConfigError;

/// Validate a library name follows JavaScript identifier rules.
pub fn validate_library_name(name: &str) -> Result<(), ConfigError> {
    let Some(first) = name.chars().next() else {
        return Err(ConfigError::InvalidValue {
            field: "library".to_string(),
            value: "".to_string(),
            hint: "Library name cannot be empty".to_string(),
        });
    };

    if !first.is_alphabetic() && first != '_' && first != '$' {
        return Err(ConfigError::InvalidValue {
            field: "library".to_string(),
            value: name.to_string(),
            hint: format!(
                "Must start with letter, underscore, or dollar sign (got '{}')",
                first
            ),
        });
    }

    // dotted names (`MyLib.widgets`) assign into a namespace
    for c in name.chars() {
        if !c.is_alphanumeric() && c != '_' && c != '$' && c != '.' {
            return Err(ConfigError::InvalidValue {
                field: "library".to_string(),
                value: name.to_string(),
                hint: format!("Invalid character '{}' in identifier", c),
            });
        }
    }

    Ok(())
}

/// Validate one target of the project config.
pub fn validate_config(config: &RcConfig) -> Result<(), ConfigError> {
    if let Some(library) = &config.library {
        validate_library_name(library)?;
    }

    if let Some(target) = &config.library_target {
        if !LIBRARY_TARGETS.contains(&target.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "libraryTarget".to_string(),
                value: target.clone(),
                hint: format!("Expected one of: {}", LIBRARY_TARGETS.join(", ")),
            });
        }
    }

    for (prefix, rule) in &config.proxy {
        let target = rule.target();
        if !target.starts_with("http://") && !target.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: format!("proxy[\"{}\"]", prefix),
                value: target.to_string(),
                hint: "Proxy targets must be absolute http:// or https:// URLs".to_string(),
            });
        }
    }

    Ok(())
}
