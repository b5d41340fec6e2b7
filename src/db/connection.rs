use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "tenancy".to_string()),
            database: env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "identity".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

/// Open the tenant store and select its namespace and database.
pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    debug!(
        "Connecting to tenant store {} ({}/{})",
        config.url, config.namespace, config.database
    );
    let db = surrealdb::engine::any::connect(config.url.as_str()).await?;

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        db.signin(Root { username, password }).await?;
    }

    db.use_ns(&config.namespace).use_db(&config.database).await?;

    Ok(db)
}

/// Define the tenant mapping tables. Safe to run repeatedly.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Which external database each tenant lives in
        "DEFINE TABLE IF NOT EXISTS tenant_database SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS tenant_id ON TABLE tenant_database TYPE int;
         DEFINE FIELD IF NOT EXISTS db_name ON TABLE tenant_database TYPE string;
         DEFINE FIELD IF NOT EXISTS active ON TABLE tenant_database TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE tenant_database VALUE time::now();",

        // Users already associated with a tenant
        "DEFINE TABLE IF NOT EXISTS tenant_user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS tenant_id ON TABLE tenant_user TYPE int;
         DEFINE FIELD IF NOT EXISTS user_id ON TABLE tenant_user TYPE string;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE tenant_user VALUE time::now();",

        "DEFINE INDEX IF NOT EXISTS tenant_database_db_name ON TABLE tenant_database COLUMNS db_name;
         DEFINE INDEX IF NOT EXISTS tenant_database_tenant ON TABLE tenant_database COLUMNS tenant_id;
         DEFINE INDEX IF NOT EXISTS tenant_user_user_id ON TABLE tenant_user COLUMNS user_id;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
