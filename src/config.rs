use serde::{Deserialize, Serialize};
use std::{env, time::Duration};

use crate::types::DatabaseName;

/// Email used for synthesized identities when no header or override is set.
pub const DEFAULT_DEV_EMAIL: &str = "dev@local";

/// Settings that drive identity and tenant resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identity provider issuer. Required unless bypass is enabled.
    pub issuer: Option<String>,
    /// Expected token audience. Audience is not checked when unset.
    pub audience: Option<String>,
    /// Development bypass: identities come from headers, no token checks.
    pub dev_auth_bypass: bool,
    /// Defaults used when synthesizing an identity from headers.
    pub synthetic: SyntheticDefaults,
    /// Connection string of the tenant database this deployment points at.
    pub tenant_database_dsn: Option<String>,
    /// Lifetime of cached discovery/key documents. `None` caches until invalidated.
    pub key_cache_ttl: Option<Duration>,
}

/// Fallback values for header-synthesized identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticDefaults {
    pub email: String,
    /// Raw tenant value; parsed per request so a malformed value reads as absent.
    pub tenant_id: Option<String>,
}

impl Default for SyntheticDefaults {
    fn default() -> Self {
        Self {
            email: DEFAULT_DEV_EMAIL.to_string(),
            tenant_id: None,
        }
    }
}

impl IdentityConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let key_cache_ttl = non_blank("JWKS_CACHE_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            issuer: non_blank("SSO_ISSUER"),
            audience: non_blank("SSO_AUDIENCE"),
            dev_auth_bypass: is_truthy(lookup("DEV_AUTH_BYPASS").as_deref()),
            synthetic: SyntheticDefaults {
                email: lookup("DEV_USER_EMAIL")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_DEV_EMAIL.to_string()),
                tenant_id: lookup("DEFAULT_TENANT_ID").filter(|v| !v.is_empty()),
            },
            tenant_database_dsn: non_blank("TENANT_DATABASE_DSN"),
            key_cache_ttl,
        }
    }

    /// Database name inferred from the configured DSN, if any.
    pub fn inferred_database(&self) -> Option<DatabaseName> {
        self.tenant_database_dsn
            .as_deref()
            .and_then(infer_database_name)
    }
}

/// Interpret a flag value the way shell-style configuration usually does.
pub fn is_truthy(value: Option<&str>) -> bool {
    match value {
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => false,
    }
}

/// Extract the database name from a connection string's path component.
///
/// `postgresql://user:pw@host:5432/acme_prod` yields `acme_prod`; a missing
/// path or an unparsable DSN yields `None`.
pub fn infer_database_name(dsn: &str) -> Option<DatabaseName> {
    let parsed = url::Url::parse(dsn.trim()).ok()?;
    let name = parsed.path().trim_start_matches('/');
    if name.is_empty() {
        None
    } else {
        Some(DatabaseName::new(name))
    }
}
