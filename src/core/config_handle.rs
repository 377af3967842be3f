//! The handle services hold to resolve tenant configuration.

use super::{Generation, ResolvedConfig, Resolver, TenantConfigBuilder};
use crate::error::Result;
use crate::reload::{ReloadCoordinator, ReloadHandle, ReloadStats};
use crate::tenant::{TenantId, TenantIdProvider};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;

/// Tenant-aware configuration for a running service.
///
/// Cheap to clone; clones share the published generation, the model
/// registry and the reload coordinator.
///
/// # Examples
///
/// ```rust,no_run
/// use multitenant_config::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let config = TenantConfig::builder()
///     .with_file("appsettings.json")
///     .with_env_overrides("APP", "__")
///     .register::<DbConfig>()
///     .build()
///     .await?;
///
/// let db: DbConfig = config.resolve("t1")?;
/// println!("t1 uses {:?}", db.server);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TenantConfig {
    resolver: Resolver,
    coordinator: Arc<ReloadCoordinator>,
    provider: Arc<dyn TenantIdProvider>,
}

impl TenantConfig {
    pub(crate) fn new(
        resolver: Resolver,
        coordinator: Arc<ReloadCoordinator>,
        provider: Arc<dyn TenantIdProvider>,
    ) -> Self {
        Self {
            resolver,
            coordinator,
            provider,
        }
    }

    /// Create a new builder for constructing a configuration handle.
    pub fn builder() -> TenantConfigBuilder {
        TenantConfigBuilder::new()
    }

    /// The generation currently published.
    pub fn generation(&self) -> Arc<Generation> {
        self.resolver.generation()
    }

    /// The resolver, for callers that only need resolution.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve `T` for `tenant` against the current generation.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub fn resolve<T: DeserializeOwned + 'static>(&self, tenant: impl AsRef<str>) -> Result<T> {
        self.resolver.resolve(tenant)
    }

    /// Resolve `T` for `tenant` with generation and section details.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub fn resolve_detailed<T: DeserializeOwned + 'static>(
        &self,
        tenant: impl AsRef<str>,
    ) -> Result<ResolvedConfig<T>> {
        self.resolver.resolve_detailed(tenant)
    }

    /// Resolve `T` for the tenant of the current unit of work.
    ///
    /// With the default provider that is the tenant set by
    /// [`TenantContext::scope`](crate::tenant::TenantContext::scope), or the
    /// empty tenant outside any scope.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub fn resolve_current<T: DeserializeOwned + 'static>(&self) -> Result<T> {
        self.resolver.resolve(self.tenant_id())
    }

    /// The tenant the configured provider reports right now.
    pub fn tenant_id(&self) -> TenantId {
        self.provider.tenant_id()
    }

    /// Merge every layer now and publish the result.
    ///
    /// # Errors
    ///
    /// Returns the merge error; the current generation keeps serving.
    pub async fn reload(&self) -> Result<Arc<Generation>> {
        self.coordinator.reload().await
    }

    /// Reload whenever a layer reports a change, until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyWatching`](crate::error::ConfigError::AlreadyWatching)
    /// if watching has already started.
    pub async fn start_watching(&self, shutdown: watch::Receiver<bool>) -> Result<ReloadHandle> {
        self.coordinator.start(shutdown).await
    }

    /// Whether a watch loop is running.
    pub fn is_watching(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Reload counters.
    pub fn reload_stats(&self) -> ReloadStats {
        self.coordinator.stats()
    }

    /// Layer names in merge order.
    pub fn layer_names(&self) -> Vec<String> {
        self.coordinator.layers().names()
    }
}

impl std::fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConfig")
            .field("resolver", &self.resolver)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
