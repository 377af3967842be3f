//! Tenant placeholder substitution.
//!
//! Models call these helpers from their `apply_tenant` hook. Substitution is
//! a plain, case-sensitive text replace of [`TENANT_PLACEHOLDER`].
//!
//! ```rust
//! use multitenant_config::tenant::placeholder;
//!
//! let mut database = "db-%tenantid%".to_string();
//! placeholder::apply(&mut database, "t7");
//! assert_eq!(database, "db-t7");
//! ```

/// Marker replaced by the active tenant id.
pub const TENANT_PLACEHOLDER: &str = "%tenantid%";

/// Return `value` with every placeholder replaced by `tenant_id`.
pub fn substitute(value: &str, tenant_id: &str) -> String {
    value.replace(TENANT_PLACEHOLDER, tenant_id)
}

/// Replace placeholders in a string field in place.
pub fn apply(field: &mut String, tenant_id: &str) {
    if field.contains(TENANT_PLACEHOLDER) {
        *field = substitute(field, tenant_id);
    }
}

/// Replace placeholders in an optional string field in place.
pub fn apply_opt(field: &mut Option<String>, tenant_id: &str) {
    if let Some(value) = field {
        apply(value, tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_all_occurrences() {
        assert_eq!(
            substitute("%tenantid%.db.%tenantid%.local", "t1"),
            "t1.db.t1.local"
        );
    }

    #[test]
    fn test_empty_tenant_removes_marker() {
        assert_eq!(substitute("db-%tenantid%", ""), "db-");
    }

    #[test]
    fn test_marker_is_case_sensitive() {
        assert_eq!(substitute("db-%TENANTID%", "t1"), "db-%TENANTID%");
    }

    #[test]
    fn test_apply_opt_leaves_none() {
        let mut field: Option<String> = None;
        apply_opt(&mut field, "t1");
        assert!(field.is_none());

        let mut field = Some("user-%tenantid%".to_string());
        apply_opt(&mut field, "t1");
        assert_eq!(field.as_deref(), Some("user-t1"));
    }
}
