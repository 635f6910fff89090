//! Effective configuration with full provenance
//!
//! The effective config captures the merged configuration plus
//! information about where each value came from. The merged values keep
//! their secrets for building the client; display goes through the
//! redacted copy.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "cpf-client/effective_config@1";

/// Longest allowed completion wait (7 days)
pub const MAX_WAIT_LIMIT_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Environment variables and the keys they set
const ENV_KEYS: &[(&str, &str)] = &[
    ("CPF_URL", "url"),
    ("CPF_USERNAME", "username"),
    ("CPF_PASSWORD", "password"),
];

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "credential"];

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Env,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/env/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/env/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Typed client settings
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub max_wait_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub result_content_type: String,
    pub input_data_content_type: String,
}

impl ClientConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("max_wait_seconds", &self.max_wait_seconds)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("result_content_type", &self.result_content_type)
            .field("input_data_content_type", &self.input_data_content_type)
            .finish()
    }
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,

    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// Merged configuration, secrets included
    #[serde(skip)]
    config: Value,

    /// Merged configuration with secrets replaced
    #[serde(rename = "config")]
    redacted: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,
}

impl EffectiveConfig {
    /// Build effective config from layers.
    ///
    /// A config file that does not exist contributes nothing.
    pub fn build(
        config_path: Option<&Path>,
        env_overrides: Option<Value>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layer 2: User config file
        if let Some(path) = config_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        // Layer 3: Environment
        if let Some(env) = env_overrides {
            layers.push(env);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Env,
                path: None,
                digest: None,
            });
        }

        // Layer 4: CLI overrides
        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let config = merge_layers(layers);
        Self::validate_config(&config)?;

        let mut redacted = config.clone();
        let redactions = Self::redact_secrets(&mut redacted);

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config,
            redacted,
            sources,
            redactions,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => Value::Array(arr.into_iter().map(Self::toml_to_json).collect()),
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Redact secrets in the config, returning list of redacted paths
    fn redact_secrets(value: &mut Value) -> Vec<String> {
        let mut redactions = Vec::new();
        Self::redact_recursive(value, String::new(), &mut redactions);
        redactions
    }

    fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let current_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };

                    let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));
                    if is_secret && !val.is_object() && !val.is_array() {
                        *val = Value::String("[REDACTED]".to_string());
                        redactions.push(current_path);
                    } else {
                        Self::redact_recursive(val, current_path, redactions);
                    }
                }
            }
            Value::Array(arr) => {
                for (i, val) in arr.iter_mut().enumerate() {
                    Self::redact_recursive(val, format!("{}[{}]", path, i), redactions);
                }
            }
            _ => {}
        }
    }

    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        let url = config.get("url").and_then(Value::as_str).unwrap_or("");
        if url.trim().is_empty() {
            return Err(ConfigError::ValidationError("url must not be empty".to_string()));
        }

        // max_wait_seconds must be in (0, 604800]
        if let Some(max_wait) = config.get("max_wait_seconds").and_then(Value::as_u64) {
            if max_wait == 0 || max_wait > MAX_WAIT_LIMIT_SECONDS {
                return Err(ConfigError::ValidationError(format!(
                    "max_wait_seconds must be in (0, {}]",
                    MAX_WAIT_LIMIT_SECONDS
                )));
            }
        }

        // connect_timeout_seconds must be in (0, 300]
        if let Some(connect) = config.get("connect_timeout_seconds").and_then(Value::as_u64) {
            if connect == 0 || connect > 300 {
                return Err(ConfigError::ValidationError(
                    "connect_timeout_seconds must be in (0, 300]".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Typed settings for building a client
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid client settings: {}", e)))
    }

    /// Merged configuration with secrets replaced
    pub fn redacted(&self) -> &Value {
        &self.redacted
    }

    /// Serialize (redacted) to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Overrides from `CPF_URL`, `CPF_USERNAME` and `CPF_PASSWORD`.
///
/// `lookup` reads one variable; empty values are ignored.
pub fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> Option<Value> {
    let map: serde_json::Map<String, Value> = ENV_KEYS
        .iter()
        .filter_map(|(var, key)| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .map(|value| (key.to_string(), Value::String(value)))
        })
        .collect();

    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
