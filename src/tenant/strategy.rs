//! Individual tenant resolution steps.
//!
//! Each strategy answers with a tenant or with nothing. Store failures are
//! logged and read as nothing so later strategies still get a chance.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::tenant::store::TenantStore;
use crate::types::{DatabaseName, TenantId};

/// Inputs available to every strategy.
#[derive(Debug, Clone, Copy)]
pub struct TenantQuery<'a> {
    pub email: &'a str,
    pub claimed: Option<TenantId>,
}

/// One step of the tenant resolution chain.
#[async_trait]
pub trait TenantStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn resolve(&self, query: &TenantQuery<'_>) -> Option<TenantId>;
}

fn tolerate<T>(strategy: &str, result: anyhow::Result<Option<T>>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("Tenant strategy {} skipped after store error: {}", strategy, e);
            None
        }
    }
}

/// Tenant mapped to the database this deployment is configured against.
pub struct ConfiguredDatabase {
    database: DatabaseName,
    store: Arc<dyn TenantStore>,
}

impl ConfiguredDatabase {
    pub fn new(database: DatabaseName, store: Arc<dyn TenantStore>) -> Self {
        Self { database, store }
    }
}

#[async_trait]
impl TenantStrategy for ConfiguredDatabase {
    fn name(&self) -> &'static str {
        "configured_database"
    }

    async fn resolve(&self, _query: &TenantQuery<'_>) -> Option<TenantId> {
        tolerate(
            self.name(),
            self.store.tenant_for_database(&self.database).await,
        )
    }
}

/// The tenant of the only active database mapping, if there is exactly one.
pub struct SingleActiveDatabase {
    store: Arc<dyn TenantStore>,
}

impl SingleActiveDatabase {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TenantStrategy for SingleActiveDatabase {
    fn name(&self) -> &'static str {
        "single_active_database"
    }

    async fn resolve(&self, _query: &TenantQuery<'_>) -> Option<TenantId> {
        // Two rows are enough to tell "exactly one" from "more than one".
        let mappings = tolerate(self.name(), self.store.active_mappings(2).await.map(Some))?;
        match mappings.as_slice() {
            [only] => Some(only.tenant_id),
            _ => None,
        }
    }
}

/// Tenant named by the caller's claims.
pub struct ClaimedTenant;

#[async_trait]
impl TenantStrategy for ClaimedTenant {
    fn name(&self) -> &'static str {
        "claimed_tenant"
    }

    async fn resolve(&self, query: &TenantQuery<'_>) -> Option<TenantId> {
        query.claimed
    }
}

/// Tenant previously associated with the caller's email.
pub struct UserMapping {
    store: Arc<dyn TenantStore>,
}

impl UserMapping {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TenantStrategy for UserMapping {
    fn name(&self) -> &'static str {
        "user_mapping"
    }

    async fn resolve(&self, query: &TenantQuery<'_>) -> Option<TenantId> {
        tolerate(self.name(), self.store.tenant_for_user(query.email).await)
    }
}
