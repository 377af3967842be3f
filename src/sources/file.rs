//! File-based configuration layer.

use super::ConfigSource;
#[cfg(feature = "file-watch")]
use super::LayerChanges;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use config::File;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default quiet period before a burst of file events becomes one change.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// File-based configuration layer.
///
/// Loads YAML, TOML, or JSON files with format detection based on the file
/// extension. With the `file-watch` feature the layer reports changes to the
/// file.
///
/// # Examples
///
/// ```rust,no_run
/// use multitenant_config::sources::FileSource;
///
/// let source = FileSource::new("appsettings.json");
/// let custom = FileSource::new("appsettings.custom.json").optional();
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
    optional: bool,
    debounce: Duration,
}

impl FileSource {
    /// Create a new, required file layer.
    ///
    /// The format is detected from the file extension:
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
            optional: false,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Set the priority for this layer.
    ///
    /// Higher priority layers override lower priority ones.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Treat a missing file as an empty layer.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set the quiet period used to coalesce file events.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Validate that the file extension is supported.
    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn load(&self) -> Result<HashMap<String, config::Value>> {
        self.validate_extension()?;

        if !self.path.is_file() {
            return Err(ConfigError::unavailable(self.name(), "file not found"));
        }

        let parsed = config::Config::builder()
            .add_source(File::from(self.path.clone()).required(true))
            .build()
            .map_err(|e| {
                ConfigError::ParseError(format!("{}: {}", self.path.display(), e))
            })?;

        parsed
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", self.path.display(), e)))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    #[cfg(feature = "file-watch")]
    async fn changes(&self) -> Result<Option<LayerChanges>> {
        match crate::reload::FileWatcher::watch(&self.path, self.debounce) {
            Ok(changes) => Ok(Some(changes)),
            Err(e) if self.optional => {
                tracing::debug!(layer = %self.name(), error = %e, "Optional file cannot be watched");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
