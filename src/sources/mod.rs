//! Configuration layer implementations.

mod config_source;
mod env;
mod file;
mod memory;

#[cfg(feature = "remote")]
mod consul;

pub(crate) use config_source::AbortOnDrop;
pub use config_source::{ConfigSource, LayerChanges};
pub use env::EnvSource;
pub use file::{DEFAULT_DEBOUNCE, FileSource};
pub use memory::MemorySource;

#[cfg(feature = "remote")]
pub use consul::{ConsulSource, ConsulSourceBuilder, DEFAULT_CONSUL_ADDRESS};
