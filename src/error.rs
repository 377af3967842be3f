//! Error types for multitenant-config.

use std::fmt;

/// Result type alias for multitenant-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading, reloading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A layer could not be reached (missing file, unreachable store).
    ///
    /// Fatal at startup for non-optional layers. During a live reload the
    /// previous generation stays in force.
    #[error("Configuration layer '{layer}' is unavailable: {reason}")]
    SourceUnavailable {
        /// Name of the layer
        layer: String,
        /// Why it could not be reached
        reason: String,
    },

    /// A reachable layer returned content that could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A section exists but could not be converted into the model type.
    #[error("Failed to bind section '{section}': {reason}")]
    BindError {
        /// Section path that was bound
        section: String,
        /// Conversion failure
        reason: String,
    },

    /// A resolved model failed its validation hook.
    #[error("Configuration '{model}' is invalid for tenant '{tenant}': {source}")]
    Validation {
        /// Section name of the model
        model: String,
        /// Tenant the model was resolved for (empty for the default tenant)
        tenant: String,
        /// The validation failure
        #[source]
        source: ValidationError,
    },

    /// Resolution was requested for a type that was never registered.
    #[error("No configuration model registered for type {0}")]
    UnknownModel(&'static str),

    /// A model was registered with an unusable descriptor.
    #[error("Invalid configuration model {model}: {reason}")]
    InvalidModel {
        /// Type name of the model
        model: &'static str,
        /// What is wrong with the registration
        reason: String,
    },

    /// `TenantContext::set_current` was called outside a tenant scope.
    #[error("No tenant scope is active for the current task")]
    NoTenantScope,

    /// The reload coordinator is already watching layers.
    #[error("Reload coordinator is already running")]
    AlreadyWatching,

    /// A layer change feed could not be set up.
    #[error("Watch error: {0}")]
    WatchError(String),

    /// Failed to assemble configuration from the layer set.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// A tenant header name is not a valid HTTP header name.
    #[error("Invalid tenant header name '{header}': {reason}")]
    InvalidHeader {
        /// The rejected header name
        header: String,
        /// Why it was rejected
        reason: String,
    },

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Create a `SourceUnavailable` error for the named layer.
    pub fn unavailable(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means a layer could not be reached.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

/// Validation error returned by a model's validation hook.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A required field has no value.
    MissingField(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Names of the fields this error reports as missing.
    pub fn missing_fields(&self) -> Vec<&str> {
        match self {
            Self::MissingField(field) => vec![field.as_str()],
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.missing_fields()).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::MissingField(field) => write!(f, "Field '{}' is required", field),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}
