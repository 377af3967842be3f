//! Per-tenant resolution of configuration models.

use super::Generation;
use crate::error::{ConfigError, Result};
use crate::model::ModelRegistry;
use crate::tenant::{TenantId, TenantRegistry};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::ops::Deref;
use std::sync::Arc;

/// Which section a model instance was bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSource {
    /// The default, tenant-independent section.
    Default,
    /// The tenant's `CustomizedTenants:<tenant>:<Section>` override.
    Tenant,
}

/// A resolved model together with where it came from.
///
/// Dereferences to the model.
#[derive(Debug, Clone)]
pub struct ResolvedConfig<T> {
    value: T,
    generation: u64,
    tenant: TenantId,
    source: SectionSource,
}

impl<T> ResolvedConfig<T> {
    /// Sequence number of the generation this was resolved against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The tenant it was resolved for.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Whether the default or the tenant's override section was bound.
    pub fn source(&self) -> SectionSource {
        self.source
    }

    /// Take the model out.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for ResolvedConfig<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Resolves registered models for a tenant against the published generation.
///
/// Every call reads whatever generation is current at that moment and binds a
/// fresh instance; nothing is cached, so a reload is visible to the next call.
#[derive(Clone)]
pub struct Resolver {
    current: Arc<ArcSwap<Generation>>,
    models: Arc<ModelRegistry>,
}

impl Resolver {
    pub(crate) fn new(current: Arc<ArcSwap<Generation>>, models: Arc<ModelRegistry>) -> Self {
        Self { current, models }
    }

    /// Resolve `T` for `tenant` (empty for none).
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownModel`] if `T` was never registered
    /// - [`ConfigError::BindError`] if a value does not fit its field
    /// - [`ConfigError::Validation`] if the model rejects the instance
    pub fn resolve<T: DeserializeOwned + 'static>(&self, tenant: impl AsRef<str>) -> Result<T> {
        self.resolve_detailed(tenant).map(ResolvedConfig::into_inner)
    }

    /// Resolve `T` and report which generation and section produced it.
    ///
    /// # Errors
    ///
    /// Same as [`Resolver::resolve`].
    pub fn resolve_detailed<T: DeserializeOwned + 'static>(
        &self,
        tenant: impl AsRef<str>,
    ) -> Result<ResolvedConfig<T>> {
        let generation = self.current.load_full();
        self.resolve_in(&generation, tenant.as_ref())
    }

    fn resolve_in<T: DeserializeOwned + 'static>(
        &self,
        generation: &Generation,
        tenant: &str,
    ) -> Result<ResolvedConfig<T>> {
        let descriptor = self.models.descriptor::<T>()?;
        let section = descriptor.section_name();

        let override_path = TenantRegistry::override_path(tenant, section);
        let (path, source) = if generation.tenants().contains(tenant)
            && generation.has_section(&override_path)
        {
            (override_path.as_str(), SectionSource::Tenant)
        } else {
            (section, SectionSource::Default)
        };

        let mut value: T = ModelRegistry::bind(generation, path)?;
        descriptor.apply_tenant(&mut value, tenant);
        descriptor
            .validate(&value)
            .map_err(|source| ConfigError::Validation {
                model: section.to_string(),
                tenant: tenant.to_string(),
                source,
            })?;

        Ok(ResolvedConfig {
            value,
            generation: generation.sequence(),
            tenant: TenantId::from(tenant),
            source,
        })
    }

    /// The generation currently published.
    pub fn generation(&self) -> Arc<Generation> {
        self.current.load_full()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("generation", &self.current.load().sequence())
            .field("models", &self.models.sections())
            .finish()
    }
}
