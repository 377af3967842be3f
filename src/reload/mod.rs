//! Live reload: layer change feeds and the coordinator that republishes the
//! merged configuration.

mod coordinator;

#[cfg(feature = "file-watch")]
mod watcher;

pub use coordinator::{ReloadCoordinator, ReloadHandle, ReloadStats};

#[cfg(feature = "file-watch")]
pub use watcher::FileWatcher;
