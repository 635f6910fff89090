//! Built-in client defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Server base URL (default: "http://localhost:8080/cpf")
    pub url: String,

    /// Digest auth user (default: empty)
    pub username: String,

    /// Digest auth password (default: empty)
    pub password: String,

    /// Upper bound on completion waits (default: 86400 = 24 hours)
    pub max_wait_seconds: u64,

    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_seconds: u64,

    /// Result content type (default: "text/csv")
    pub result_content_type: String,

    /// Input data content type (default: "text/csv")
    pub input_data_content_type: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/cpf".to_string(),
            username: String::new(),
            password: String::new(),
            max_wait_seconds: 86400,
            connect_timeout_seconds: 30,
            result_content_type: cpf_protocol::DEFAULT_CONTENT_TYPE.to_string(),
            input_data_content_type: cpf_protocol::DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url,
            "username": self.username,
            "password": self.password,
            "max_wait_seconds": self.max_wait_seconds,
            "connect_timeout_seconds": self.connect_timeout_seconds,
            "result_content_type": self.result_content_type,
            "input_data_content_type": self.input_data_content_type
        })
    }
}

/// User config file location (~/.config/cpf/client.toml)
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/cpf/client.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.max_wait_seconds, 86400);
        assert_eq!(defaults.connect_timeout_seconds, 30);
        assert_eq!(defaults.result_content_type, "text/csv");
        assert_eq!(defaults.input_data_content_type, "text/csv");
        assert!(defaults.password.is_empty());
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["max_wait_seconds"], 86400);
        assert_eq!(value["url"], "http://localhost:8080/cpf");
        assert_eq!(value["result_content_type"], "text/csv");
    }

    #[test]
    fn test_default_config_path_under_home() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(".config/cpf/client.toml"));
        }
    }
}
