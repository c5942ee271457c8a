//! Environment-override merging on raw config documents.

use serde_json::{Map, Value};

/// Merge `new` over `old` key by key.
///
/// Arrays on both sides concatenate, objects on both sides merge one level
/// deep (keys of `new` replace keys of `old`), anything else is overwritten.
pub fn merge(old: &mut Map<String, Value>, new: Map<String, Value>) {
    for (key, new_value) in new {
        match (old.get_mut(&key), new_value) {
            (Some(Value::Array(old_items)), Value::Array(new_items)) => {
                old_items.extend(new_items);
            }
            (Some(Value::Object(old_map)), Value::Object(new_map)) => {
                for (k, v) in new_map {
                    old_map.insert(k, v);
                }
            }
            (_, new_value) => {
                old.insert(key, new_value);
            }
        }
    }
}

/// Apply the `env.<environment>` block of `config` and drop `env`.
///
/// A missing block (or a non-object one) leaves the config untouched apart
/// from removing `env`.
pub fn merge_env(config: &mut Map<String, Value>, environment: &str) {
    let Some(env) = config.remove("env") else {
        return;
    };
    if let Value::Object(mut envs) = env {
        if let Some(Value::Object(overrides)) = envs.remove(environment) {
            merge(config, overrides);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_merge_concatenates_arrays() {
        let mut old = object(json!({ "extraBabelIncludes": ["a"] }));
        merge(&mut old, object(json!({ "extraBabelIncludes": ["b", "c"] })));
        assert_eq!(old["extraBabelIncludes"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_merge_objects_key_wise_one_level() {
        let mut old = object(json!({
            "define": { "A": 1, "B": { "deep": true } }
        }));
        merge(
            &mut old,
            object(json!({ "define": { "B": { "other": 2 }, "C": 3 } })),
        );
        // B is replaced, not deep-merged
        assert_eq!(
            old["define"],
            json!({ "A": 1, "B": { "other": 2 }, "C": 3 })
        );
    }

    #[test]
    fn test_merge_overwrites_scalars_and_mismatched_kinds() {
        let mut old = object(json!({
            "hash": false,
            "outputPath": "dist",
            "alias": { "a": "b" },
            "browsers": ["ie 11"]
        }));
        merge(
            &mut old,
            object(json!({
                "hash": true,
                "alias": "not-an-object",
                "browsers": "last 2 versions",
                "publicPath": "/static/"
            })),
        );
        assert_eq!(
            Value::Object(old),
            json!({
                "hash": true,
                "outputPath": "dist",
                "alias": "not-an-object",
                "browsers": "last 2 versions",
                "publicPath": "/static/"
            })
        );
    }

    #[test]
    fn test_merge_env_applies_block_and_removes_env() {
        let mut config = object(json!({
            "outputPath": "dist",
            "extraBabelIncludes": ["lib"],
            "env": {
                "development": { "devtool": "eval", "extraBabelIncludes": ["dev"] },
                "production": { "hash": true }
            }
        }));
        merge_env(&mut config, "development");
        assert_eq!(
            Value::Object(config),
            json!({
                "outputPath": "dist",
                "extraBabelIncludes": ["lib", "dev"],
                "devtool": "eval"
            })
        );
    }

    #[test]
    fn test_merge_env_unknown_environment_only_drops_env() {
        let mut config = object(json!({ "hash": false, "env": { "production": { "hash": true } } }));
        merge_env(&mut config, "test");
        assert_eq!(Value::Object(config), json!({ "hash": false }));
    }
}
