//! Tenant identity, the customized-tenant registry and ambient tenant context.

pub mod context;
pub mod header;
mod id;
pub mod placeholder;
mod registry;

pub use context::{FixedTenantProvider, TaskLocalTenantProvider, TenantContext, TenantIdProvider};
pub use header::{DEFAULT_TENANT_HEADER, HeaderTenantExtractor};
pub use id::TenantId;
pub use placeholder::TENANT_PLACEHOLDER;
pub use registry::{CUSTOMIZED_TENANTS_SECTION, TenantRegistry};
