// Core modules
pub mod config;
pub mod db;
pub mod types;

// Identity and tenancy
pub mod api;
pub mod auth;
pub mod tenant;

#[cfg(test)]
mod test_support;

// Re-export key types and functions
pub use api::{AppContext, AppState, create_router};
pub use auth::{AuthError, Claims, IdentityResolver, RequestIdentity};
pub use config::IdentityConfig;
pub use db::{DatabaseConfig, create_connection, ensure_schema};
pub use tenant::{SurrealTenantStore, TenantResolver};

use std::sync::Arc;
use anyhow::Result;

/// Convenience function to build the shared request context.
///
/// Connects to the tenant store, makes sure its schema exists, and wires the
/// identity resolver and the standard tenant strategy chain from `identity`.
pub async fn build_app_context(
    identity: &IdentityConfig,
    database: DatabaseConfig,
) -> Result<AppState> {
    let resolver = IdentityResolver::from_config(identity)?;

    let db = create_connection(database).await?;
    ensure_schema(&db).await?;
    let store = Arc::new(SurrealTenantStore::new(db));

    let tenants = TenantResolver::standard(store, identity.inferred_database());

    Ok(Arc::new(AppContext {
        identity: resolver,
        tenants,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_app_context_bypass() {
        let identity = IdentityConfig {
            dev_auth_bypass: true,
            tenant_database_dsn: Some("postgresql://u:p@db:5432/acme_prod".to_string()),
            ..Default::default()
        };
        let database = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };

        let state = build_app_context(&identity, database).await.unwrap();
        assert_eq!(
            state.tenants.strategy_names(),
            vec!["configured_database", "claimed_tenant", "user_mapping"]
        );
    }

    #[tokio::test]
    async fn test_build_app_context_requires_issuer() {
        let database = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        assert!(
            build_app_context(&IdentityConfig::default(), database)
                .await
                .is_err()
        );
    }
}
