//! Ordered set of configuration layers and the merge that folds them.

use super::generation::{merge_path, split_path};
use super::{Generation, Table};
use crate::error::{ConfigError, Result};
use crate::sources::ConfigSource;
use std::sync::Arc;

/// The configuration layers of a service, ordered by priority.
///
/// Layers are merged lowest priority first, so higher priority layers
/// override values from lower priority ones. Layers with equal priority keep
/// the order in which they were added.
pub struct LayerSet {
    layers: Vec<Arc<dyn ConfigSource>>,
    tenant_customization: bool,
}

impl LayerSet {
    /// Create a layer set. The order is fixed here, once.
    pub fn new(mut layers: Vec<Arc<dyn ConfigSource>>, tenant_customization: bool) -> Self {
        layers.sort_by_key(|layer| layer.priority());
        Self {
            layers,
            tenant_customization,
        }
    }

    /// The layers in merge order.
    pub fn layers(&self) -> &[Arc<dyn ConfigSource>] {
        &self.layers
    }

    /// Layer names in merge order.
    pub fn names(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    /// Whether per-tenant overrides are honored.
    pub fn tenant_customization(&self) -> bool {
        self.tenant_customization
    }

    /// Read every layer and merge them into a generation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The set is empty
    /// - A required layer is unavailable
    /// - Any layer, optional or not, fails for another reason
    pub async fn merge(&self, sequence: u64) -> Result<Generation> {
        if self.layers.is_empty() {
            return Err(ConfigError::LoadError(
                "No configuration layers specified".to_string(),
            ));
        }

        let mut root = Table::new();
        for layer in &self.layers {
            let values = match layer.load().await {
                Ok(values) => values,
                Err(e) if layer.is_optional() && e.is_source_unavailable() => {
                    tracing::debug!(layer = %layer.name(), error = %e, "Skipping unavailable optional layer");
                    continue;
                }
                Err(e) => return Err(e),
            };

            // Shallow keys first, so `a:b` lands on top of an `a` table from the same layer.
            let mut entries: Vec<_> = values.into_iter().collect();
            entries.sort_by(|(left, _), (right, _)| {
                split_path(left)
                    .len()
                    .cmp(&split_path(right).len())
                    .then_with(|| left.cmp(right))
            });
            for (key, value) in entries {
                merge_path(&mut root, &key, value);
            }
        }

        Ok(Generation::new(sequence, root, self.tenant_customization))
    }
}

impl std::fmt::Debug for LayerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerSet")
            .field("layers", &self.names())
            .field("tenant_customization", &self.tenant_customization)
            .finish()
    }
}
