//! Ambient tenant id scoped to one logical unit of work.
//!
//! The tenant lives in a tokio task-local slot: it is visible to every
//! `.await` continuation of the future it was scoped to and invisible to
//! sibling tasks, so concurrent requests for different tenants never observe
//! each other's id.
//!
//! ```rust
//! use multitenant_config::tenant::TenantContext;
//!
//! # async fn example() {
//! let seen = TenantContext::scope("t1", async {
//!     tokio::task::yield_now().await;
//!     TenantContext::current()
//! })
//! .await;
//! assert_eq!(seen.as_str(), "t1");
//! assert!(TenantContext::current().is_none());
//! # }
//! ```

use super::TenantId;
use crate::error::{ConfigError, Result};
use std::cell::RefCell;
use std::future::Future;

tokio::task_local! {
    static CURRENT_TENANT: RefCell<TenantId>;
}

/// Access to the ambient tenant id of the current task.
pub struct TenantContext;

impl TenantContext {
    /// Run `future` with `tenant` as its ambient tenant id.
    pub fn scope<F>(tenant: impl Into<TenantId>, future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        CURRENT_TENANT.scope(RefCell::new(tenant.into()), future)
    }

    /// Run a synchronous closure with `tenant` as its ambient tenant id.
    pub fn sync_scope<R>(tenant: impl Into<TenantId>, f: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(RefCell::new(tenant.into()), f)
    }

    /// The ambient tenant id, or the empty id outside any scope.
    pub fn current() -> TenantId {
        CURRENT_TENANT
            .try_with(|tenant| tenant.borrow().clone())
            .unwrap_or_default()
    }

    /// Whether the current task runs inside a tenant scope.
    pub fn is_scoped() -> bool {
        CURRENT_TENANT.try_with(|_| ()).is_ok()
    }

    /// Replace the ambient tenant id for the rest of the enclosing scope.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoTenantScope`] when called outside
    /// [`TenantContext::scope`] or [`TenantContext::sync_scope`].
    pub fn set_current(tenant: impl Into<TenantId>) -> Result<()> {
        let tenant = tenant.into();
        CURRENT_TENANT
            .try_with(|current| *current.borrow_mut() = tenant)
            .map_err(|_| ConfigError::NoTenantScope)
    }

    /// Carry the current tenant id into a future that will run elsewhere,
    /// typically one passed to `tokio::spawn`.
    pub fn inherit<F>(future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        Self::scope(Self::current(), future)
    }
}

/// Supplies the tenant id for the current unit of work.
pub trait TenantIdProvider: Send + Sync {
    /// Tenant id of the current context; empty when there is none.
    fn tenant_id(&self) -> TenantId;
}

/// Reads the tenant from [`TenantContext`]. This is the default provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalTenantProvider;

impl TenantIdProvider for TaskLocalTenantProvider {
    fn tenant_id(&self) -> TenantId {
        TenantContext::current()
    }
}

/// Always returns the same tenant, e.g. for a worker dedicated to one tenant.
#[derive(Debug, Clone)]
pub struct FixedTenantProvider(TenantId);

impl FixedTenantProvider {
    /// Create a provider for `tenant`.
    pub fn new(tenant: impl Into<TenantId>) -> Self {
        Self(tenant.into())
    }
}

impl TenantIdProvider for FixedTenantProvider {
    fn tenant_id(&self) -> TenantId {
        self.0.clone()
    }
}
