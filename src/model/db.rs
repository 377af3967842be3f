use super::ConfigModel;
use crate::core::Requirements;
use crate::error::ValidationError;
use crate::tenant::placeholder;
use serde::{Deserialize, Serialize};

/// Database connection settings, bound from the `DbConfig` section.
///
/// Every field may carry the tenant placeholder (`db-%tenantid%`); all four
/// are required once the tenant has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Database server host.
    pub server: Option<String>,
    /// Database name.
    pub database: Option<String>,
    /// Login user.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
}

impl ConfigModel for DbConfig {
    const SECTION: &'static str = "DbConfig";

    fn apply_tenant(&mut self, tenant_id: &str) {
        placeholder::apply_opt(&mut self.server, tenant_id);
        placeholder::apply_opt(&mut self.database, tenant_id);
        placeholder::apply_opt(&mut self.username, tenant_id);
        placeholder::apply_opt(&mut self.password, tenant_id);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Requirements::new()
            .require("server", &self.server)
            .require("database", &self.database)
            .require("username", &self.username)
            .require("password", &self.password)
            .finish()
    }
}
