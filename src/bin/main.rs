use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use tenant_identity::auth::{KeyDirectory, TokenVerifier};
use tenant_identity::db::{DatabaseConfig, create_connection, ensure_schema};
use tenant_identity::tenant::{SurrealTenantStore, TenantResolver};
use tenant_identity::types::{DatabaseName, TenantId};
use tenant_identity::{IdentityConfig, build_app_context, create_router};

#[derive(Parser)]
#[command(name = "tenant-identity")]
#[command(about = "Request identity and tenant resolution service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the identity HTTP API
    Serve {
        /// Bind address, e.g. 0.0.0.0:8080
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Resolve the tenant for a user with the standard strategy chain
    ResolveTenant {
        email: String,
        /// Tenant id as claimed by the caller's token
        #[arg(long)]
        claimed: Option<String>,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Verify a bearer token against the configured issuer
    VerifyToken { token: String },
    /// Point a tenant at an external database
    MapDatabase {
        tenant_id: i64,
        db_name: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Associate a user with a tenant
    LinkUser {
        email: String,
        tenant_id: i64,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tenant_identity=info".parse()?)
                .add_directive("onboarding=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let identity = IdentityConfig::from_env();

    match cli.command {
        Commands::Serve { bind, db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for tenant store: {}", db_config.url);

            let state = build_app_context(&identity, db_config).await?;
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Identity server listening on http://{}", bind);
            axum::serve(listener, app).await?;
        }
        Commands::ResolveTenant {
            email,
            claimed,
            db_url,
        } => {
            let store = open_store(db_url).await?;
            let resolver = TenantResolver::standard(store, identity.inferred_database());
            info!("Strategy order: {}", resolver.strategy_names().join(" -> "));

            let claimed = claimed.as_deref().and_then(TenantId::parse_lenient);
            let session = resolver.session_info(&email, claimed).await;

            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Commands::VerifyToken { token } => {
            let issuer = identity
                .issuer
                .clone()
                .ok_or_else(|| anyhow!("SSO_ISSUER is not set"))?;

            let keys = Arc::new(KeyDirectory::new(issuer.clone(), identity.key_cache_ttl)?);
            let verifier = TokenVerifier::new(issuer, identity.audience.clone(), keys);
            let claims = verifier.verify(token.trim()).await?;

            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::MapDatabase {
            tenant_id,
            db_name,
            db_url,
        } => {
            let store = open_store(db_url).await?;
            store
                .map_database(TenantId::new(tenant_id), &DatabaseName::new(&db_name))
                .await?;
            println!("Tenant {} mapped to database '{}'.", tenant_id, db_name);
        }
        Commands::LinkUser {
            email,
            tenant_id,
            db_url,
        } => {
            let store = open_store(db_url).await?;
            store.link_user(&email, TenantId::new(tenant_id)).await?;
            println!("User '{}' linked to tenant {}.", email, tenant_id);
        }
    }

    Ok(())
}

async fn open_store(db_url: String) -> Result<Arc<SurrealTenantStore>> {
    let db_config = DatabaseConfig {
        url: db_url,
        ..Default::default()
    };
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;
    Ok(Arc::new(SurrealTenantStore::new(db)))
}
