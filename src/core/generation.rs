//! Immutable snapshots of the merged configuration tree.

use crate::tenant::TenantRegistry;
use config::{Value, ValueKind};
use std::collections::HashMap;

/// A configuration table: folded keys mapped to values or nested tables.
pub type Table = HashMap<String, Value>;

/// Delimiter between the segments of a hierarchical key.
pub const KEY_DELIMITER: char = ':';

/// One fully merged snapshot of every layer.
///
/// Generations are created by the reload coordinator and never mutated. The
/// set of customized tenants is derived once, when the generation is built.
/// Readers hold an `Arc<Generation>`, so a superseded generation lives exactly
/// as long as the resolutions still using it.
#[derive(Debug, Clone)]
pub struct Generation {
    sequence: u64,
    root: Table,
    tenants: TenantRegistry,
}

impl Generation {
    /// Build a generation from a merged tree.
    ///
    /// When `tenant_customization` is false no tenant is treated as
    /// customized, whatever the `CustomizedTenants` section contains.
    pub fn new(sequence: u64, root: Table, tenant_customization: bool) -> Self {
        let tenants = if tenant_customization {
            TenantRegistry::extract(&root)
        } else {
            TenantRegistry::empty()
        };
        Self {
            sequence,
            root,
            tenants,
        }
    }

    /// An empty generation with sequence number 0.
    pub fn empty() -> Self {
        Self::new(0, Table::new(), true)
    }

    /// Monotonically increasing sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Tenants with a customization section in this generation.
    pub fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    /// The merged tree.
    pub fn root(&self) -> &Table {
        &self.root
    }

    /// Look up a value by `:`-delimited path, case-insensitively.
    pub fn section(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path);
        let (last, parents) = segments.split_last()?;
        let mut table = &self.root;
        for segment in parents {
            match table.get(segment).map(|value| &value.kind) {
                Some(ValueKind::Table(child)) => table = child,
                _ => return None,
            }
        }
        table.get(last)
    }

    /// Whether a section exists and carries any content.
    ///
    /// Nil values, empty tables and empty strings count as absent.
    pub fn has_section(&self, path: &str) -> bool {
        self.section(path).is_some_and(has_content)
    }

    /// Look up a scalar value as a string.
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.section(path)
            .filter(|value| !matches!(value.kind, ValueKind::Table(_) | ValueKind::Nil))
            .and_then(|value| value.clone().into_string().ok())
    }
}

fn has_content(value: &Value) -> bool {
    match &value.kind {
        ValueKind::Nil => false,
        ValueKind::Table(table) => !table.is_empty(),
        ValueKind::String(text) => !text.is_empty(),
        _ => true,
    }
}

/// Split a hierarchical key into folded, non-empty segments.
pub(crate) fn split_path(path: &str) -> Vec<String> {
    path.split(KEY_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub(crate) fn empty_table() -> Value {
    Value::new(None, ValueKind::Table(Table::new()))
}

/// Merge `value` into `root` at the hierarchical `path`.
///
/// Tables are merged key by key; any other value replaces what was there.
pub(crate) fn merge_path(root: &mut Table, path: &str, value: Value) {
    let segments = split_path(path);
    if let Some((last, parents)) = segments.split_last() {
        let mut table = root;
        for segment in parents {
            let slot = table.entry(segment.clone()).or_insert_with(empty_table);
            if !matches!(slot.kind, ValueKind::Table(_)) {
                *slot = empty_table();
            }
            table = match &mut slot.kind {
                ValueKind::Table(child) => child,
                _ => return,
            };
        }
        merge_value(table, last.clone(), value);
    }
}

/// Remove the value at `path`, returning it if present.
pub(crate) fn remove_path(root: &mut Table, path: &str) -> Option<Value> {
    let segments = split_path(path);
    let (last, parents) = segments.split_last()?;
    let mut table = root;
    for segment in parents {
        table = match table.get_mut(segment).map(|value| &mut value.kind) {
            Some(ValueKind::Table(child)) => child,
            _ => return None,
        };
    }
    table.remove(last)
}

fn merge_value(table: &mut Table, key: String, incoming: Value) {
    match incoming.kind {
        ValueKind::Table(entries) => {
            let slot = table.entry(key).or_insert_with(empty_table);
            if !matches!(slot.kind, ValueKind::Table(_)) {
                *slot = empty_table();
            }
            if let ValueKind::Table(current) = &mut slot.kind {
                for (child_key, child) in entries {
                    // Keys inside a table may themselves be hierarchical.
                    merge_path(current, &child_key, child);
                }
            }
        }
        kind => {
            table.insert(key, fold_keys(Value::new(None, kind)));
        }
    }
}

/// Fold table keys nested inside arrays.
fn fold_keys(value: Value) -> Value {
    match value.kind {
        ValueKind::Array(items) => Value::new(
            None,
            ValueKind::Array(items.into_iter().map(fold_keys).collect()),
        ),
        ValueKind::Table(entries) => {
            let mut folded = Table::new();
            for (key, child) in entries {
                merge_path(&mut folded, &key, child);
            }
            Value::new(None, ValueKind::Table(folded))
        }
        kind => Value::new(None, kind),
    }
}
