//! Core configuration management types.

mod builder;
mod config_handle;
pub mod generation;
mod layers;
mod resolver;
mod validation;

pub use builder::TenantConfigBuilder;
pub use config_handle::TenantConfig;
pub use generation::{Generation, KEY_DELIMITER, Table};
pub use layers::LayerSet;
pub use resolver::{ResolvedConfig, Resolver, SectionSource};
pub use validation::Requirements;
