//! Configuration models and the registry that binds them to sections.

mod binding;
mod db;
mod descriptor;
mod registry;

pub use db::DbConfig;
pub use descriptor::ModelDescriptor;
pub use registry::ModelRegistry;

use crate::error::ValidationError;
use serde::de::DeserializeOwned;

/// A strongly-typed configuration model bound from one named section.
///
/// Models derive `Deserialize` and usually `#[serde(default)]`, so keys absent
/// from the section leave the field's default value. Field names are matched
/// against configuration keys ignoring ASCII case, so `rename_all =
/// "PascalCase"` or a lowercase field both bind a `CustomProp` key.
///
/// # Examples
///
/// ```rust
/// use multitenant_config::model::ConfigModel;
/// use multitenant_config::tenant::placeholder;
/// use serde::Deserialize;
///
/// #[derive(Debug, Default, Deserialize)]
/// #[serde(default, rename_all = "PascalCase")]
/// struct CustomConfig {
///     custom_prop: Option<String>,
/// }
///
/// impl ConfigModel for CustomConfig {
///     const SECTION: &'static str = "CustomConfig";
///
///     fn apply_tenant(&mut self, tenant_id: &str) {
///         placeholder::apply_opt(&mut self.custom_prop, tenant_id);
///     }
/// }
/// ```
pub trait ConfigModel: DeserializeOwned + Send + Sync + 'static {
    /// Name of the section this model is bound from, e.g. `DbConfig`.
    const SECTION: &'static str;

    /// Adjust the bound instance for the active tenant (empty for none).
    fn apply_tenant(&mut self, _tenant_id: &str) {}

    /// Check the instance after tenant adjustment.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` describing what is missing or wrong.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
