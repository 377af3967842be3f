//! Type-keyed table of model descriptors.

use super::binding::FieldMatcher;
use super::{ConfigModel, ModelDescriptor};
use crate::core::Generation;
use crate::core::generation::empty_table;
use crate::error::{ConfigError, Result, ValidationError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

struct Registration {
    type_name: &'static str,
    section: String,
    descriptor: Arc<dyn Any + Send + Sync>,
}

/// Maps each model type to its descriptor.
///
/// Built once at startup through explicit registration calls; read-only
/// afterwards.
///
/// # Examples
///
/// ```rust
/// use multitenant_config::model::{DbConfig, ModelRegistry};
///
/// let mut models = ModelRegistry::new();
/// models.register::<DbConfig>();
/// assert_eq!(models.descriptor::<DbConfig>().unwrap().section_name(), "DbConfig");
/// ```
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<TypeId, Registration>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model through its [`ConfigModel`] implementation.
    pub fn register<T: ConfigModel>(&mut self) -> &mut Self {
        self.register_descriptor(ModelDescriptor::<T>::for_model())
    }

    /// Register a model from a section name and two hooks.
    pub fn register_with<T, A, V>(&mut self, section: &str, apply_tenant: A, validate: V) -> &mut Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
        A: Fn(&mut T, &str) + Send + Sync + 'static,
        V: Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.register_descriptor(
            ModelDescriptor::new(section)
                .with_apply_tenant(apply_tenant)
                .with_validation(validate),
        )
    }

    /// Register a prepared descriptor. A second registration of the same type
    /// replaces the first.
    pub fn register_descriptor<T>(&mut self, descriptor: ModelDescriptor<T>) -> &mut Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let registration = Registration {
            type_name,
            section: descriptor.section_name().to_string(),
            descriptor: Arc::new(descriptor),
        };
        if let Some(previous) = self.models.insert(TypeId::of::<T>(), registration) {
            tracing::warn!(
                model = type_name,
                previous_section = %previous.section,
                "Configuration model registered twice; keeping the latest descriptor"
            );
        }
        self
    }

    /// Descriptor registered for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownModel`] if `T` was never registered.
    pub fn descriptor<T: 'static>(&self) -> Result<&ModelDescriptor<T>> {
        self.models
            .get(&TypeId::of::<T>())
            .and_then(|registration| registration.descriptor.downcast_ref::<ModelDescriptor<T>>())
            .ok_or(ConfigError::UnknownModel(std::any::type_name::<T>()))
    }

    /// Whether `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.models.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered section names, sorted.
    pub fn sections(&self) -> Vec<&str> {
        let mut sections: Vec<&str> = self.models.values().map(|r| r.section.as_str()).collect();
        sections.sort_unstable();
        sections
    }

    /// Check every registration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidModel`] for a blank section name.
    pub fn verify(&self) -> Result<()> {
        for registration in self.models.values() {
            if registration.section.is_empty() {
                return Err(ConfigError::InvalidModel {
                    model: registration.type_name,
                    reason: "section name must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Convert the subtree at `section_path` into a `T`.
    ///
    /// Keys match field names ignoring ASCII case. A missing or empty section
    /// binds as an empty table, so fields keep their defaults. Hooks are not
    /// invoked here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BindError`] if a value cannot be converted to the
    /// type of its field.
    pub fn bind<T: DeserializeOwned>(generation: &Generation, section_path: &str) -> Result<T> {
        let value = match generation.section(section_path) {
            Some(value) if generation.has_section(section_path) => value.clone(),
            _ => empty_table(),
        };
        T::deserialize(FieldMatcher(value)).map_err(|e| ConfigError::BindError {
                section: section_path.to_string(),
                reason: e.to_string(),
            })
    }
}
