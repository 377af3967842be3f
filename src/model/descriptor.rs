use super::ConfigModel;
use crate::error::ValidationError;
use std::fmt;
use std::sync::Arc;

/// Hook adjusting a bound instance for a tenant.
type ApplyTenantHook<T> = Arc<dyn Fn(&mut T, &str) + Send + Sync>;

/// Hook validating a tenant-adjusted instance.
type ValidateHook<T> = Arc<dyn Fn(&T) -> Result<(), ValidationError> + Send + Sync>;

/// Static registration record for one model type.
///
/// Holds the section name and the two hooks; never a resolved value.
pub struct ModelDescriptor<T> {
    section: String,
    apply_tenant: ApplyTenantHook<T>,
    validate: ValidateHook<T>,
}

impl<T: 'static> ModelDescriptor<T> {
    /// Create a descriptor for `section` with no-op hooks.
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into().trim().to_string(),
            apply_tenant: Arc::new(|_: &mut T, _: &str| {}),
            validate: Arc::new(|_: &T| Ok(())),
        }
    }

    /// Set the tenant hook, e.g. placeholder substitution.
    pub fn with_apply_tenant<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T, &str) + Send + Sync + 'static,
    {
        self.apply_tenant = Arc::new(hook);
        self
    }

    /// Set the validation hook.
    pub fn with_validation<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validate = Arc::new(hook);
        self
    }

    /// Section this model binds from.
    pub fn section_name(&self) -> &str {
        &self.section
    }

    pub(crate) fn apply_tenant(&self, instance: &mut T, tenant_id: &str) {
        (self.apply_tenant)(instance, tenant_id)
    }

    pub(crate) fn validate(&self, instance: &T) -> Result<(), ValidationError> {
        (self.validate)(instance)
    }
}

impl<T: ConfigModel> ModelDescriptor<T> {
    /// Descriptor built from a model's [`ConfigModel`] implementation.
    pub fn for_model() -> Self {
        Self::new(T::SECTION)
            .with_apply_tenant(|instance: &mut T, tenant_id: &str| instance.apply_tenant(tenant_id))
            .with_validation(|instance: &T| instance.validate())
    }
}

impl<T> Clone for ModelDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            section: self.section.clone(),
            apply_tenant: Arc::clone(&self.apply_tenant),
            validate: Arc::clone(&self.validate),
        }
    }
}

impl<T> fmt::Debug for ModelDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("section", &self.section)
            .finish_non_exhaustive()
    }
}
