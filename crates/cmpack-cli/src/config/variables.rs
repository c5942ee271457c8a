//! `$npm_package_*` placeholder substitution.

use serde_json::{Map, Value};

pub const NAME_PLACEHOLDER: &str = "$npm_package_name";
pub const VERSION_PLACEHOLDER: &str = "$npm_package_version";

/// Whether any top-level string field carries a placeholder.
pub fn has_npm_variables(config: &Map<String, Value>) -> bool {
    config.values().any(|value| match value {
        Value::String(s) => s.contains(NAME_PLACEHOLDER) || s.contains(VERSION_PLACEHOLDER),
        _ => false,
    })
}

/// Replace the placeholders in top-level string fields with the manifest's
/// `name` and `version`.
///
/// Nested values are left alone. Each placeholder is replaced once per field;
/// a missing manifest field substitutes the literal `undefined`.
pub fn replace_npm_variables(config: &mut Map<String, Value>, manifest: &Value) {
    let name = manifest_field(manifest, "name");
    let version = manifest_field(manifest, "version");

    for value in config.values_mut() {
        if let Value::String(s) = value {
            *s = s
                .replacen(NAME_PLACEHOLDER, &name, 1)
                .replacen(VERSION_PLACEHOLDER, &version, 1);
        }
    }
}

fn manifest_field(manifest: &Value, field: &str) -> String {
    match manifest.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    }
}
