//! # multitenant-config
//!
//! Tenant-aware layered configuration with live reload.
//!
//! ## Overview
//!
//! `multitenant-config` resolves strongly-typed configuration models for a
//! multi-tenant service:
//! - Layers (files, environment variables, Consul, in-memory) merged by
//!   priority into immutable generations
//! - Per-tenant override sections under `CustomizedTenants:<tenant>:<Section>`
//! - `%tenantid%` placeholder substitution, then validation, on every resolve
//! - Lock-free publication of new generations using `arc-swap`
//! - Task-local tenant context for request-scoped resolution
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multitenant_config::prelude::*;
//!
//! # async fn example() -> multitenant_config::error::Result<()> {
//! let config = TenantConfig::builder()
//!     .with_file("appsettings.json")
//!     .with_env_overrides("APP", "__")
//!     .register::<DbConfig>()
//!     .build()
//!     .await?;
//!
//! // Explicit tenant
//! let db: DbConfig = config.resolve("t1")?;
//!
//! // Tenant of the current request
//! let db: DbConfig = TenantContext::scope("t2", async { config.resolve_current() }).await?;
//! println!("{:?}", db.server);
//! # Ok(())
//! # }
//! ```
//!
//! ## Live reload
//!
//! ```rust,no_run
//! # use multitenant_config::prelude::*;
//! # async fn example(config: TenantConfig) -> multitenant_config::error::Result<()> {
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let handle = config.start_watching(shutdown_rx).await?;
//!
//! // ... serve requests ...
//!
//! shutdown_tx.send_replace(true);
//! handle.join().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): reload when configuration files change
//! - `remote`: Consul KV layers

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod model;
pub mod reload;
pub mod sources;
pub mod tenant;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ResolvedConfig, SectionSource, TenantConfig, TenantConfigBuilder};
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::model::{ConfigModel, DbConfig, ModelDescriptor};
    pub use crate::tenant::{HeaderTenantExtractor, TenantContext, TenantId};
}
