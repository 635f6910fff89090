//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in client defaults
//! 2. User config file (~/.config/cpf/client.toml, or --config)
//! 3. Environment (CPF_URL, CPF_USERNAME, CPF_PASSWORD)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{default_config_path, BuiltinDefaults};
pub use effective::{env_overrides, ClientConfig, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
