//! Configuration layer trait and change feeds.

use crate::error::Result;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Pending notifications a change feed buffers before further ones are dropped.
const CHANGE_BUFFER: usize = 16;

/// A named, prioritized configuration layer.
///
/// Implement this trait to add custom layers (databases, other key/value
/// stores). Keys in the returned map may be hierarchical, using `:` between
/// segments; values may be nested tables. Keys are case-insensitive.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Load the current contents of the layer.
    ///
    /// # Errors
    ///
    /// Return [`ConfigError::SourceUnavailable`](crate::error::ConfigError::SourceUnavailable)
    /// when the layer cannot be reached, so optional layers can be skipped.
    /// Any other error fails the merge even for optional layers.
    async fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// Get a human-readable name for this layer (for logging/debugging).
    fn name(&self) -> String;

    /// Get the priority of this layer (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Consul layers: 250-270
    /// - Files: 100, 110, 120, ... in the order added
    fn priority(&self) -> i32 {
        100
    }

    /// Whether an unreachable layer contributes nothing instead of failing.
    fn is_optional(&self) -> bool {
        false
    }

    /// Subscribe to change notifications.
    ///
    /// Returns `None` for layers that cannot report changes. Dropping the
    /// returned feed unsubscribes.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be set up.
    async fn changes(&self) -> Result<Option<LayerChanges>> {
        Ok(None)
    }
}

/// Stream of change notifications from one layer.
pub struct LayerChanges {
    rx: mpsc::Receiver<()>,
    _guard: Option<Box<dyn Any + Send>>,
}

impl LayerChanges {
    /// Create a feed and the sender used to signal it.
    pub fn channel() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);
        (tx, Self { rx, _guard: None })
    }

    /// Keep `guard` alive for as long as the feed exists.
    ///
    /// Used for watcher handles and background pollers that must stop once
    /// the subscriber goes away.
    pub fn with_guard(mut self, guard: impl Any + Send) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    /// Wait for the next change. `None` once the layer stops reporting.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Aborts a background task when dropped.
pub(crate) struct AbortOnDrop(pub(crate) JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
