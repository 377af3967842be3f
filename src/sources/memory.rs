//! In-process configuration layer.

use super::{ConfigSource, LayerChanges};
use crate::core::Table;
use crate::core::generation::{merge_path, remove_path};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

struct MemoryState {
    values: Table,
    available: bool,
    subscribers: Vec<mpsc::Sender<()>>,
}

impl MemoryState {
    fn notify(&mut self) {
        self.subscribers.retain(|tx| !tx.is_closed());
        for tx in &self.subscribers {
            // A full buffer already guarantees a pending reload.
            let _ = tx.try_send(());
        }
    }
}

/// Configuration layer held in memory and changed programmatically.
///
/// Clones share the same contents, so a handle kept by the application can
/// update a layer that was handed to the builder. Every mutation notifies
/// subscribers.
///
/// # Examples
///
/// ```rust
/// use multitenant_config::sources::MemorySource;
///
/// let overrides = MemorySource::new("overrides")
///     .with_priority(200)
///     .with_value("DbConfig:Server", "s2");
///
/// let handle = overrides.clone();
/// handle.set("DbConfig:Database", "db-%tenantid%");
/// ```
#[derive(Clone)]
pub struct MemorySource {
    name: String,
    priority: i32,
    optional: bool,
    state: Arc<RwLock<MemoryState>>,
}

impl MemorySource {
    /// Create an empty, required layer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 100,
            optional: false,
            state: Arc::new(RwLock::new(MemoryState {
                values: Table::new(),
                available: true,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Treat the layer as empty while it is unavailable.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Seed a value without notifying subscribers.
    pub fn with_value(self, key: &str, value: impl Into<config::Value>) -> Self {
        merge_path(&mut self.state.write().values, key, value.into());
        self
    }

    /// Set a value and notify subscribers.
    pub fn set(&self, key: &str, value: impl Into<config::Value>) {
        let mut state = self.state.write();
        merge_path(&mut state.values, key, value.into());
        state.notify();
    }

    /// Remove a key (and its subtree) and notify subscribers.
    pub fn remove(&self, key: &str) {
        let mut state = self.state.write();
        remove_path(&mut state.values, key);
        state.notify();
    }

    /// Replace the whole contents and notify subscribers.
    pub fn replace(&self, values: HashMap<String, config::Value>) {
        let mut state = self.state.write();
        state.values = Table::new();
        for (key, value) in values {
            merge_path(&mut state.values, &key, value);
        }
        state.notify();
    }

    /// Mark the layer reachable or unreachable and notify subscribers.
    pub fn set_available(&self, available: bool) {
        let mut state = self.state.write();
        state.available = available;
        state.notify();
    }

    /// Number of live change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.write();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn load(&self) -> Result<HashMap<String, config::Value>> {
        let state = self.state.read();
        if !state.available {
            return Err(ConfigError::unavailable(self.name(), "layer is unreachable"));
        }
        Ok(state.values.clone())
    }

    fn name(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    async fn changes(&self) -> Result<Option<LayerChanges>> {
        let (tx, changes) = LayerChanges::channel();
        self.state.write().subscribers.push(tx);
        Ok(Some(changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_values_are_shared_between_clones() {
        let source = MemorySource::new("test").with_value("DbConfig:Server", "s1");
        let handle = source.clone();
        handle.set("DbConfig:Database", "db");

        let values = source.load().await.unwrap();
        let generation = crate::core::Generation::new(1, values, true);
        assert_eq!(generation.get_string("dbconfig:server").as_deref(), Some("s1"));
        assert_eq!(generation.get_string("dbconfig:database").as_deref(), Some("db"));
    }

    #[tokio::test]
    async fn test_set_notifies_subscribers() {
        let source = MemorySource::new("test");
        let mut changes = source.changes().await.unwrap().unwrap();

        source.set("a", "1");
        let received = timeout(Duration::from_secs(1), changes.next()).await;
        assert_eq!(received.unwrap(), Some(()));
    }

    #[tokio::test]
    async fn test_dropping_feed_unsubscribes() {
        let source = MemorySource::new("test");
        let changes = source.changes().await.unwrap();
        assert_eq!(source.subscriber_count(), 1);

        drop(changes);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_layer() {
        let source = MemorySource::new("test").optional();
        source.set_available(false);
        assert!(source.load().await.unwrap_err().is_source_unavailable());
        assert!(source.is_optional());

        source.set_available(true);
        assert!(source.load().await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_and_replace() {
        let source = MemorySource::new("test")
            .with_value("DbConfig:Server", "s1")
            .with_value("DbConfig:Database", "db");
        source.remove("dbconfig:server");

        let generation = crate::core::Generation::new(1, source.load().await.unwrap(), true);
        assert!(generation.section("DbConfig:Server").is_none());
        assert!(generation.section("DbConfig:Database").is_some());

        let mut values = HashMap::new();
        values.insert("Other:Key".to_string(), config::Value::from("v"));
        source.replace(values);
        let generation = crate::core::Generation::new(2, source.load().await.unwrap(), true);
        assert!(generation.section("DbConfig").is_none());
        assert_eq!(generation.get_string("other:key").as_deref(), Some("v"));
    }
}
