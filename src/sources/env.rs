//! Environment variable configuration layer.

use super::ConfigSource;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use config::Environment;
use std::collections::HashMap;

/// Environment variable configuration layer.
///
/// Loads variables with a prefix; the separator splits the rest of the name
/// into nested keys. Environment variables cannot report changes, so this
/// layer is re-read whenever another layer triggers a reload.
///
/// # Examples
///
/// ```rust
/// use multitenant_config::sources::EnvSource;
///
/// // APP_DBCONFIG__SERVER=db1 -> DbConfig:Server = db1
/// let source = EnvSource::new("APP", "__");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvSource {
    /// Create a new environment variable layer.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "APP")
    /// * `separator` - Separator for nested keys (e.g., "__" for APP_DBCONFIG__SERVER)
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300, // Env vars have highest priority by default
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    async fn load(&self) -> Result<HashMap<String, config::Value>> {
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true);

        let collected = config::Config::builder()
            .add_source(env_source)
            .build()
            .map_err(|e| {
                ConfigError::ParseError(format!("Failed to read environment variables: {}", e))
            })?;

        collected
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| {
                ConfigError::ParseError(format!("Failed to parse environment variables: {}", e))
            })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
#[allow(unsafe_code)] // For env var manipulation in tests
mod tests {
    use super::*;
    use crate::core::{Generation, Table};
    use crate::core::generation::merge_path;
    use std::env;

    #[test]
    fn test_env_source_creation() {
        let source = EnvSource::new("APP", "__");
        assert_eq!(source.priority(), 300);
        assert_eq!(source.name(), "env:APP*");
        assert_eq!(source.with_priority(400).priority(), 400);
    }

    #[tokio::test]
    async fn test_load_nested_variables() {
        unsafe {
            env::set_var("MTCFG_ENVTEST_DBCONFIG__SERVER", "env-server");
            env::set_var("MTCFG_ENVTEST_DBCONFIG__DATABASE", "env-db");
        }

        let values = EnvSource::new("MTCFG_ENVTEST", "__").load().await.unwrap();

        let mut root = Table::new();
        for (key, value) in values {
            merge_path(&mut root, &key, value);
        }
        let generation = Generation::new(1, root, true);
        assert_eq!(
            generation.get_string("DbConfig:Server").as_deref(),
            Some("env-server")
        );
        assert_eq!(
            generation.get_string("DbConfig:Database").as_deref(),
            Some("env-db")
        );

        unsafe {
            env::remove_var("MTCFG_ENVTEST_DBCONFIG__SERVER");
            env::remove_var("MTCFG_ENVTEST_DBCONFIG__DATABASE");
        }
    }

    #[tokio::test]
    async fn test_load_without_matches_is_empty() {
        let values = EnvSource::new("MTCFG_NOTHING_MATCHES", "__").load().await.unwrap();
        assert!(values.is_empty());
    }
}
