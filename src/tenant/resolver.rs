//! Priority-ordered tenant resolution.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::tenant::store::TenantStore;
use crate::tenant::strategy::{
    ClaimedTenant, ConfiguredDatabase, SingleActiveDatabase, TenantQuery, TenantStrategy,
    UserMapping,
};
use crate::types::{DatabaseName, TenantId};

/// Tenant details reported to onboarding flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantSession {
    pub email: String,
    pub tenant_id: Option<TenantId>,
    pub database_name: Option<DatabaseName>,
}

/// Runs tenant strategies in order and returns the first answer.
pub struct TenantResolver {
    strategies: Vec<Box<dyn TenantStrategy>>,
    store: Arc<dyn TenantStore>,
}

impl TenantResolver {
    /// Resolver over an explicit strategy list.
    pub fn new(store: Arc<dyn TenantStore>, strategies: Vec<Box<dyn TenantStrategy>>) -> Self {
        Self { strategies, store }
    }

    /// The standard chain: deployment database, claim, user mapping.
    ///
    /// The deployment database is the configured one when known; otherwise the
    /// single active mapping stands in for it.
    pub fn standard(store: Arc<dyn TenantStore>, configured: Option<DatabaseName>) -> Self {
        let infrastructure: Box<dyn TenantStrategy> = match configured {
            Some(database) => Box::new(ConfiguredDatabase::new(database, store.clone())),
            None => Box::new(SingleActiveDatabase::new(store.clone())),
        };

        let strategies: Vec<Box<dyn TenantStrategy>> = vec![
            infrastructure,
            Box::new(ClaimedTenant),
            Box::new(UserMapping::new(store.clone())),
        ];

        Self::new(store, strategies)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Determine the tenant for a caller. `None` means unknown, not an error.
    pub async fn resolve_tenant_id(&self, email: &str, claimed: Option<TenantId>) -> Option<TenantId> {
        let query = TenantQuery { email, claimed };

        for strategy in &self.strategies {
            if let Some(tenant_id) = strategy.resolve(&query).await {
                debug!("Tenant {} resolved by {}", tenant_id, strategy.name());
                return Some(tenant_id);
            }
        }

        None
    }

    /// Resolve the tenant and look up the database it is mapped to.
    pub async fn session_info(&self, email: &str, claimed: Option<TenantId>) -> TenantSession {
        let tenant_id = self.resolve_tenant_id(email, claimed).await;

        let database_name = match tenant_id {
            Some(id) => match self.store.database_for_tenant(id).await {
                Ok(name) => name,
                Err(e) => {
                    warn!("Database lookup for tenant {} failed: {}", id, e);
                    None
                }
            },
            None => None,
        };

        info!(
            email = %email,
            tenant_id = ?tenant_id.map(TenantId::get),
            db_name = ?database_name.as_ref().map(DatabaseName::as_str),
            "session:tenant_info"
        );

        TenantSession {
            email: email.to_string(),
            tenant_id,
            database_name,
        }
    }
}
