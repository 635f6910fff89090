//! Configuration merge logic
//!
//! Layers merge with:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge two JSON values; `overlay` takes precedence.
///
/// Null in the overlay overrides any value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays: no concatenation
        (Value::Array(_), overlay @ Value::Array(_)) => overlay,

        (_, overlay) => overlay,
    }
}

/// Merge config layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(
            json!({"connect_timeout_seconds": 30}),
            json!({"connect_timeout_seconds": 10}),
        );
        assert_eq!(result["connect_timeout_seconds"], 10);
    }

    #[test]
    fn test_object_deep_merge() {
        let base = json!({"parameters": {"srid": 3005, "format": "csv"}});
        let overlay = json!({"parameters": {"srid": 4326}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["parameters"]["srid"], 4326);
        assert_eq!(result["parameters"]["format"], "csv");
    }

    #[test]
    fn test_array_replace() {
        let result = deep_merge(
            json!({"apps": ["MapTileByTileId", "Geocoder"]}),
            json!({"apps": ["Geocoder"]}),
        );
        assert_eq!(result["apps"], json!(["Geocoder"]));
    }

    #[test]
    fn test_null_override() {
        let result = deep_merge(json!({"username": "cpftest"}), json!({"username": null}));
        assert!(result["username"].is_null());
    }

    #[test]
    fn test_merge_layers_precedence() {
        let builtin = json!({"url": "http://localhost:8080/cpf", "max_wait_seconds": 86400});
        let file = json!({"url": "https://cpf.example.org/pub/cpf", "username": "file-user"});
        let env = json!({"username": "env-user"});
        let cli = json!({"max_wait_seconds": 60});

        let result = merge_layers(vec![builtin, file, env, cli]);

        assert_eq!(result["url"], "https://cpf.example.org/pub/cpf");
        assert_eq!(result["username"], "env-user");
        assert_eq!(result["max_wait_seconds"], 60);
    }
}
