//! Helpers for writing model validation hooks.

use crate::error::ValidationError;

/// Collects field checks and reports them together.
///
/// # Examples
///
/// ```rust
/// use multitenant_config::core::Requirements;
///
/// let server = Some("db.local".to_string());
/// let password: Option<String> = None;
///
/// let result = Requirements::new()
///     .require("server", &server)
///     .require("password", &password)
///     .finish();
///
/// assert_eq!(result.unwrap_err().missing_fields(), vec!["password"]);
/// ```
#[derive(Debug, Default)]
pub struct Requirements {
    errors: Vec<ValidationError>,
}

impl Requirements {
    /// Start an empty set of checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an optional field to be set.
    pub fn require<V>(mut self, field: &str, value: &Option<V>) -> Self {
        if value.is_none() {
            self.errors.push(ValidationError::missing_field(field));
        }
        self
    }

    /// Require a string field to be non-empty.
    pub fn require_non_empty(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.errors.push(ValidationError::missing_field(field));
        }
        self
    }

    /// Record `reason` against `field` unless `condition` holds.
    pub fn check(mut self, condition: bool, field: &str, reason: &str) -> Self {
        if !condition {
            self.errors.push(ValidationError::invalid_field(field, reason));
        }
        self
    }

    /// Finish: a single failure is returned as-is, several as `Multiple`.
    ///
    /// # Errors
    ///
    /// Returns the collected validation failures, if any.
    pub fn finish(mut self) -> Result<(), ValidationError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ValidationError::Multiple(self.errors)),
        }
    }
}
