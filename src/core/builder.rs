//! Builder for constructing TenantConfig instances.

use super::{LayerSet, Resolver, TenantConfig};
use crate::error::{Result, ValidationError};
use crate::model::{ConfigModel, ModelDescriptor, ModelRegistry};
use crate::reload::ReloadCoordinator;
use crate::sources::{ConfigSource, DEFAULT_DEBOUNCE, EnvSource, FileSource};
use crate::tenant::{TaskLocalTenantProvider, TenantIdProvider};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Priority of the first file; each later file adds 10.
const FILE_BASE_PRIORITY: i32 = 100;
const FILE_PRIORITY_STEP: i32 = 10;

struct FileEntry {
    path: PathBuf,
    optional: bool,
}

#[cfg(feature = "remote")]
struct ConsulLayers {
    address: String,
    app_key: String,
}

/// Builder for constructing a [`TenantConfig`].
///
/// Collects layers and model registrations, then performs the initial merge.
///
/// # Examples
///
/// ```rust,no_run
/// use multitenant_config::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let config = TenantConfig::builder()
///     .with_file("appsettings.json")
///     .with_optional_file("appsettings.Production.json")
///     .with_env_overrides("APP", "__")
///     .register::<DbConfig>()
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TenantConfigBuilder {
    files: Vec<FileEntry>,
    env: Option<(String, String)>,
    custom_sources: Vec<Arc<dyn ConfigSource>>,
    #[cfg(feature = "remote")]
    consul: Option<ConsulLayers>,
    #[cfg(feature = "remote")]
    consul_token: Option<String>,
    models: ModelRegistry,
    tenant_customization: bool,
    provider: Arc<dyn TenantIdProvider>,
    watch_debounce: Duration,
}

impl TenantConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            env: None,
            custom_sources: Vec::new(),
            #[cfg(feature = "remote")]
            consul: None,
            #[cfg(feature = "remote")]
            consul_token: None,
            models: ModelRegistry::new(),
            tenant_customization: true,
            provider: Arc::new(TaskLocalTenantProvider),
            watch_debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Add a required file layer with automatic format detection.
    ///
    /// Supported formats: YAML (.yaml, .yml), TOML (.toml), JSON (.json)
    ///
    /// Files are merged in the order they are added; later files override
    /// earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(FileEntry {
            path: path.into(),
            optional: false,
        });
        self
    }

    /// Add a file layer that is skipped while the file does not exist.
    pub fn with_optional_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(FileEntry {
            path: path.into(),
            optional: true,
        });
        self
    }

    /// Add the environment variable layer.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "APP")
    /// * `separator` - Separator for nested keys (e.g., "__" for APP_DBCONFIG__SERVER)
    ///
    /// Environment variables have the highest priority by default (300).
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env = Some((prefix.to_string(), separator.to_string()));
        self
    }

    /// Add a custom layer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use multitenant_config::prelude::*;
    /// use multitenant_config::sources::MemorySource;
    ///
    /// let overrides = MemorySource::new("overrides").with_priority(200);
    /// let builder = TenantConfig::builder().with_source(overrides);
    /// ```
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Arc::new(source));
        self
    }

    /// Add several custom layers.
    pub fn with_sources<S, I>(mut self, sources: I) -> Self
    where
        S: ConfigSource + 'static,
        I: IntoIterator<Item = S>,
    {
        self.custom_sources.extend(
            sources
                .into_iter()
                .map(|source| Arc::new(source) as Arc<dyn ConfigSource>),
        );
        self
    }

    /// Add the standard Consul layers: `shared`, `app_key` and the optional
    /// `CustomizedTenants` key.
    #[cfg(feature = "remote")]
    pub fn with_consul_layers(mut self, address: &str, app_key: &str) -> Self {
        self.consul = Some(ConsulLayers {
            address: address.to_string(),
            app_key: app_key.to_string(),
        });
        self
    }

    /// ACL token for the Consul layers.
    #[cfg(feature = "remote")]
    pub fn with_consul_token(mut self, token: &str) -> Self {
        self.consul_token = Some(token.to_string());
        self
    }

    /// Register a model through its [`ConfigModel`] implementation.
    pub fn register<T: ConfigModel>(mut self) -> Self {
        self.models.register::<T>();
        self
    }

    /// Register a model from an explicit descriptor.
    pub fn register_descriptor<T>(mut self, descriptor: ModelDescriptor<T>) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.models.register_descriptor(descriptor);
        self
    }

    /// Register a model from a section name and two hooks.
    pub fn register_with<T, A, V>(mut self, section: &str, apply_tenant: A, validate: V) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
        A: Fn(&mut T, &str) + Send + Sync + 'static,
        V: Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.models.register_with::<T, A, V>(section, apply_tenant, validate);
        self
    }

    /// Honor `CustomizedTenants` overrides (default `true`).
    pub fn with_tenant_customization(mut self, enabled: bool) -> Self {
        self.tenant_customization = enabled;
        self
    }

    /// Set where [`TenantConfig::resolve_current`] gets the tenant from.
    pub fn with_tenant_provider<P: TenantIdProvider + 'static>(mut self, provider: P) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    /// Quiet period for file change events (default 250ms).
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    fn into_layers(self) -> Result<(Vec<Arc<dyn ConfigSource>>, Self)> {
        let mut builder = self;
        let mut layers: Vec<Arc<dyn ConfigSource>> = Vec::new();

        for (index, file) in builder.files.drain(..).enumerate() {
            let priority = FILE_BASE_PRIORITY + index as i32 * FILE_PRIORITY_STEP; // 100, 110, 120, etc.
            let mut source = FileSource::new(file.path)
                .with_priority(priority)
                .with_debounce(builder.watch_debounce);
            if file.optional {
                source = source.optional();
            }
            layers.push(Arc::new(source));
        }

        layers.append(&mut builder.custom_sources);

        #[cfg(feature = "remote")]
        if let Some(consul) = builder.consul.take() {
            let consul_layers = crate::sources::ConsulSource::standard_layers(
                &consul.address,
                &consul.app_key,
                builder.consul_token.as_deref(),
            )?;
            layers.extend(
                consul_layers
                    .into_iter()
                    .map(|source| Arc::new(source) as Arc<dyn ConfigSource>),
            );
        }

        if let Some((prefix, separator)) = builder.env.take() {
            layers.push(Arc::new(EnvSource::new(prefix, separator)));
        }

        Ok((layers, builder))
    }

    /// Build the configuration handle.
    ///
    /// Performs the initial merge, which becomes generation 1.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A model was registered with a blank section name
    /// - No layers were added
    /// - A required layer is unavailable
    /// - Any layer fails to parse
    pub async fn build(self) -> Result<TenantConfig> {
        self.models.verify()?;
        let (layers, builder) = self.into_layers()?;

        let layers = Arc::new(LayerSet::new(layers, builder.tenant_customization));
        let initial = layers.merge(1).await?;
        tracing::info!(
            layers = ?layers.names(),
            models = ?builder.models.sections(),
            tenants = initial.tenants().len(),
            "Configuration loaded"
        );

        let current = Arc::new(ArcSwap::from_pointee(initial));
        let coordinator = Arc::new(ReloadCoordinator::new(layers, Arc::clone(&current)));
        let resolver = Resolver::new(current, Arc::new(builder.models));

        Ok(TenantConfig::new(resolver, coordinator, builder.provider))
    }
}

impl Default for TenantConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
