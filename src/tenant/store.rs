//! Tenant mapping storage.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::Db;
use crate::types::{DatabaseName, TenantId};

/// Active link between a tenant and its external database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMapping {
    pub tenant_id: TenantId,
    pub db_name: DatabaseName,
    pub active: bool,
}

/// Read access to tenant mappings.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Tenant whose active mapping points at `db_name`.
    async fn tenant_for_database(&self, db_name: &DatabaseName) -> Result<Option<TenantId>>;

    /// Up to `limit` active database mappings.
    async fn active_mappings(&self, limit: usize) -> Result<Vec<DatabaseMapping>>;

    /// Tenant previously associated with a user.
    async fn tenant_for_user(&self, user_id: &str) -> Result<Option<TenantId>>;

    /// Database mapped to a tenant, active or not.
    async fn database_for_tenant(&self, tenant_id: TenantId) -> Result<Option<DatabaseName>>;
}

/// SurrealDB-backed tenant store.
pub struct SurrealTenantStore {
    db: Db,
}

impl SurrealTenantStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Point a tenant at a database, replacing any previous mapping for it.
    pub async fn map_database(&self, tenant_id: TenantId, db_name: &DatabaseName) -> Result<()> {
        let query = r#"
            DELETE tenant_database WHERE tenant_id = $tenant_id;
            CREATE tenant_database CONTENT {
                tenant_id: $tenant_id,
                db_name: $db_name,
                active: true
            };
        "#;

        self.db
            .query(query)
            .bind(("tenant_id", tenant_id.get()))
            .bind(("db_name", db_name.to_string()))
            .await?
            .check()?;

        Ok(())
    }

    /// Mark every mapping for `db_name` inactive.
    pub async fn deactivate_database(&self, db_name: &DatabaseName) -> Result<()> {
        let query = "UPDATE tenant_database SET active = false WHERE db_name = $db_name";

        self.db
            .query(query)
            .bind(("db_name", db_name.to_string()))
            .await?
            .check()?;

        Ok(())
    }

    /// Associate a user with a tenant, replacing an earlier association.
    pub async fn link_user(&self, user_id: &str, tenant_id: TenantId) -> Result<()> {
        let query = r#"
            DELETE tenant_user WHERE user_id = $user_id;
            CREATE tenant_user CONTENT {
                tenant_id: $tenant_id,
                user_id: $user_id
            };
        "#;

        self.db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .bind(("tenant_id", tenant_id.get()))
            .await?
            .check()?;

        Ok(())
    }
}

#[async_trait]
impl TenantStore for SurrealTenantStore {
    async fn tenant_for_database(&self, db_name: &DatabaseName) -> Result<Option<TenantId>> {
        let query = r#"
            SELECT VALUE tenant_id FROM tenant_database
            WHERE db_name = $db_name AND active = true
            LIMIT 1
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("db_name", db_name.to_string()))
            .await?;

        let ids: Vec<i64> = res.take(0)?;
        Ok(ids.into_iter().next().map(TenantId::new))
    }

    async fn active_mappings(&self, limit: usize) -> Result<Vec<DatabaseMapping>> {
        let query = r#"
            SELECT tenant_id, db_name, active FROM tenant_database
            WHERE active = true
            LIMIT $limit
        "#;

        let mut res = self.db.query(query).bind(("limit", limit as i64)).await?;

        let mappings: Vec<DatabaseMapping> = res.take(0)?;
        Ok(mappings)
    }

    async fn tenant_for_user(&self, user_id: &str) -> Result<Option<TenantId>> {
        let query = "SELECT VALUE tenant_id FROM tenant_user WHERE user_id = $user_id LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .await?;

        let ids: Vec<i64> = res.take(0)?;
        Ok(ids.into_iter().next().map(TenantId::new))
    }

    async fn database_for_tenant(&self, tenant_id: TenantId) -> Result<Option<DatabaseName>> {
        let query = "SELECT VALUE db_name FROM tenant_database WHERE tenant_id = $tenant_id LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.get()))
            .await?;

        let names: Vec<String> = res.take(0)?;
        Ok(names
            .into_iter()
            .next()
            .filter(|n| !n.is_empty())
            .map(DatabaseName::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};

    async fn setup_store() -> SurrealTenantStore {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        SurrealTenantStore::new(db)
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = setup_store().await;
        ensure_schema(&store.db).await.unwrap();
    }

    #[tokio::test]
    async fn test_tenant_for_database() {
        let store = setup_store().await;
        store
            .map_database(TenantId::new(1), &DatabaseName::new("acme_prod"))
            .await
            .unwrap();

        let found = store
            .tenant_for_database(&DatabaseName::new("acme_prod"))
            .await
            .unwrap();
        assert_eq!(found, Some(TenantId::new(1)));

        let missing = store
            .tenant_for_database(&DatabaseName::new("other"))
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_inactive_mappings_are_ignored() {
        let store = setup_store().await;
        let name = DatabaseName::new("retired");
        store.map_database(TenantId::new(2), &name).await.unwrap();
        store.deactivate_database(&name).await.unwrap();

        assert_eq!(store.tenant_for_database(&name).await.unwrap(), None);
        assert!(store.active_mappings(2).await.unwrap().is_empty());
        // Inactive mappings still name the tenant's database.
        assert_eq!(
            store.database_for_tenant(TenantId::new(2)).await.unwrap(),
            Some(name)
        );
    }

    #[tokio::test]
    async fn test_active_mappings_respects_limit() {
        let store = setup_store().await;
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            store
                .map_database(TenantId::new(id), &DatabaseName::new(name))
                .await
                .unwrap();
        }

        let mappings = store.active_mappings(2).await.unwrap();
        assert_eq!(mappings.len(), 2);
        assert!(mappings.iter().all(|m| m.active));
    }

    #[tokio::test]
    async fn test_map_database_replaces_previous() {
        let store = setup_store().await;
        store
            .map_database(TenantId::new(5), &DatabaseName::new("old"))
            .await
            .unwrap();
        store
            .map_database(TenantId::new(5), &DatabaseName::new("new"))
            .await
            .unwrap();

        assert_eq!(
            store.database_for_tenant(TenantId::new(5)).await.unwrap(),
            Some(DatabaseName::new("new"))
        );
        assert_eq!(store.active_mappings(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_link_user() {
        let store = setup_store().await;
        assert_eq!(store.tenant_for_user("a@b.com").await.unwrap(), None);

        store.link_user("a@b.com", TenantId::new(8)).await.unwrap();
        store.link_user("a@b.com", TenantId::new(9)).await.unwrap();

        assert_eq!(
            store.tenant_for_user("a@b.com").await.unwrap(),
            Some(TenantId::new(9))
        );
    }
}
