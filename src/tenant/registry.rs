//! Registry of tenants that carry their own configuration sections.

use crate::core::Table;
use config::ValueKind;
use std::collections::BTreeSet;

/// Section under which customized tenants keep their override subsections.
pub const CUSTOMIZED_TENANTS_SECTION: &str = "CustomizedTenants";

/// The set of customized tenant ids of one generation.
///
/// Every immediate child of the `CustomizedTenants` section is a customized
/// tenant, even when its subtree is empty. Ids are stored folded to lowercase
/// and matched case-insensitively, like every other configuration key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantRegistry {
    tenants: BTreeSet<String>,
}

impl TenantRegistry {
    /// Read the customized tenants from a merged configuration tree.
    pub fn extract(root: &Table) -> Self {
        let key = CUSTOMIZED_TENANTS_SECTION.to_lowercase();
        let tenants = match root.get(&key).map(|value| &value.kind) {
            Some(ValueKind::Table(children)) => children.keys().cloned().collect(),
            _ => BTreeSet::new(),
        };
        Self { tenants }
    }

    /// A registry with no customized tenants.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `tenant_id` has a customization layer.
    pub fn contains(&self, tenant_id: &str) -> bool {
        !tenant_id.is_empty() && self.tenants.contains(&tenant_id.to_lowercase())
    }

    /// Number of customized tenants.
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether no tenant is customized.
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Iterate over the (folded) customized tenant ids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tenants.iter().map(String::as_str)
    }

    /// Path of a tenant's override subsection for `section`.
    pub fn override_path(tenant_id: &str, section: &str) -> String {
        format!("{}:{}:{}", CUSTOMIZED_TENANTS_SECTION, tenant_id, section)
    }
}
