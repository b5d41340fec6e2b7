//! Discovery document and JWKS (JSON Web Key Set) fetching and caching.
//!
//! The identity provider publishes its metadata at
//! `{issuer}/.well-known/openid-configuration` and its signing keys at the
//! `jwks_uri` named there. Both documents are fetched lazily and kept in a
//! single slot each until the configured TTL elapses or the cache is
//! invalidated. Failed fetches are never cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::KeyId;

/// Timeout applied to every discovery and key-directory request.
pub const FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Path relative to the issuer used when discovery does not name a `jwks_uri`.
pub const FALLBACK_JWKS_PATH: &str = "/protocol/openid-connect/certs";

/// A single JSON Web Key from a JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA")
    pub kty: String,
    /// Key ID, matched against the JWT header kid
    pub kid: Option<String>,
    /// Algorithm (e.g., "RS256")
    pub alg: Option<String>,
    /// Key use (e.g., "sig" for signature)
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url encoded)
    pub n: Option<String>,
    /// RSA exponent (base64url encoded)
    pub e: Option<String>,
}

/// A JWKS document as served by the key directory.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

/// Provider metadata from the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: Option<String>,
    pub jwks_uri: Option<String>,
    /// Remaining metadata, kept for diagnostics.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Signing keys indexed by key id.
///
/// Holds at most one entry per key id; entries are never mutated after the
/// set is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningKeySet {
    keys: HashMap<KeyId, Jwk>,
}

impl SigningKeySet {
    /// Build a key set from a fetched document.
    ///
    /// Encryption keys and keys without a `kid` are skipped. When a key id
    /// repeats, the first occurrence wins.
    pub fn from_document(doc: JwksDocument) -> Self {
        let mut keys = HashMap::new();

        for jwk in doc.keys {
            if jwk.key_use.as_deref() == Some("enc") {
                debug!("Skipping encryption key");
                continue;
            }

            let Some(kid) = jwk.kid.clone() else {
                debug!("Skipping key without kid");
                continue;
            };

            keys.entry(KeyId::new(kid)).or_insert(jwk);
        }

        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &KeyId> {
        self.keys.keys()
    }
}

/// Cached value with its fetch time.
struct Cached<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
            fetched_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.fetched_at.elapsed() < ttl,
            None => true,
        }
    }
}

/// Discovery and key-set cache for one issuer.
///
/// Concurrent first requests may both fetch and both populate a slot; the
/// documents are identical so the last write simply wins.
pub struct KeyDirectory {
    /// Issuer base URL.
    issuer: String,
    /// How long cached documents stay valid. `None` means until invalidated.
    ttl: Option<Duration>,
    discovery: RwLock<Option<Cached<DiscoveryDocument>>>,
    keys: RwLock<Option<Cached<SigningKeySet>>>,
    /// HTTP client for discovery and JWKS fetches.
    client: reqwest::Client,
}

impl KeyDirectory {
    /// Create a new key directory for an issuer.
    pub fn new(issuer: impl Into<String>, ttl: Option<Duration>) -> Result<Self, KeyDirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| KeyDirectoryError::Client(e.to_string()))?;

        Ok(Self {
            issuer: issuer.into(),
            ttl,
            discovery: RwLock::new(None),
            keys: RwLock::new(None),
            client,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// URL of the provider's discovery document.
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.issuer.trim_end_matches('/')
        )
    }

    /// Return the discovery document, fetching it on first use or after expiry.
    pub async fn get_discovery_document(&self) -> Result<Arc<DiscoveryDocument>, KeyDirectoryError> {
        if let Some(cached) = self.discovery.read().await.as_ref()
            && cached.fresh(self.ttl)
        {
            return Ok(cached.value.clone());
        }

        let url = self.discovery_url();
        let doc: DiscoveryDocument = self.fetch_json(&url).await?;

        let cached = Cached::new(doc);
        let value = cached.value.clone();
        *self.discovery.write().await = Some(cached);
        Ok(value)
    }

    /// Return the signing key set, fetching it on first use or after expiry.
    pub async fn get_signing_keys(&self) -> Result<Arc<SigningKeySet>, KeyDirectoryError> {
        if let Some(cached) = self.keys.read().await.as_ref()
            && cached.fresh(self.ttl)
        {
            return Ok(cached.value.clone());
        }

        let discovery = self.get_discovery_document().await?;
        let jwks_url = discovery
            .jwks_uri
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| {
                format!("{}{}", self.issuer.trim_end_matches('/'), FALLBACK_JWKS_PATH)
            });

        let doc: JwksDocument = self.fetch_json(&jwks_url).await?;
        let set = SigningKeySet::from_document(doc);
        debug!("Cached {} signing keys from {}", set.len(), jwks_url);

        let cached = Cached::new(set);
        let value = cached.value.clone();
        *self.keys.write().await = Some(cached);
        Ok(value)
    }

    async fn fetch_json<T>(&self, url: &str) -> Result<T, KeyDirectoryError>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            KeyDirectoryError::Fetch(e.to_string())
        })?;

        if !response.status().is_success() {
            warn!("Request to {} returned HTTP {}", url, response.status());
            return Err(KeyDirectoryError::Fetch(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response.json::<T>().await.map_err(|e| {
            warn!("Malformed document from {}: {}", url, e);
            KeyDirectoryError::Parse(e.to_string())
        })
    }

    /// Number of keys currently cached, whether or not they have expired.
    pub async fn cached_key_count(&self) -> usize {
        self.keys
            .read()
            .await
            .as_ref()
            .map(|c| c.value.len())
            .unwrap_or(0)
    }

    /// Drop both cached documents; the next call fetches again.
    pub async fn invalidate(&self) {
        *self.discovery.write().await = None;
        *self.keys.write().await = None;
    }
}

/// Errors that can occur when populating the key directory cache.
#[derive(Debug, Clone)]
pub enum KeyDirectoryError {
    /// HTTP client could not be constructed.
    Client(String),
    /// Network failure or non-success status.
    Fetch(String),
    /// Response body was not the expected document.
    Parse(String),
}

impl std::fmt::Display for KeyDirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(msg) => write!(f, "Failed to build HTTP client: {}", msg),
            Self::Fetch(msg) => write!(f, "Failed to fetch key directory: {}", msg),
            Self::Parse(msg) => write!(f, "Failed to parse key directory: {}", msg),
        }
    }
}

impl std::error::Error for KeyDirectoryError {}
