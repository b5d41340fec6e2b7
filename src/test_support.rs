//! In-process identity provider and token minting for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};

use crate::auth::jwks::FALLBACK_JWKS_PATH;

/// Key id the mock provider publishes.
pub const SIGNING_KID: &str = "primary";

const SIGNING_PEM: &[u8] = include_bytes!("auth/testdata/signing.pem");
const ROGUE_PEM: &[u8] = include_bytes!("auth/testdata/rogue.pem");
const SIGNING_MODULUS: &str = include_str!("auth/testdata/signing.modulus");

/// Key the provider's published JWK belongs to.
pub fn signing_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(SIGNING_PEM).unwrap()
}

/// Key the provider has never heard of.
pub fn rogue_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(ROGUE_PEM).unwrap()
}

pub fn signing_jwk() -> Value {
    json!({
        "kty": "RSA",
        "kid": SIGNING_KID,
        "alg": "RS256",
        "use": "sig",
        "n": SIGNING_MODULUS.trim(),
        "e": "AQAB",
    })
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Claims for a valid, unexpired token from `issuer`.
pub fn claims_for(issuer: &str) -> Value {
    json!({
        "sub": "user-1",
        "email": "user@example.com",
        "iss": issuer,
        "iat": now(),
        "exp": now() + 3600,
    })
}

/// Sign `claims` as an RS256 token.
pub fn mint(kid: Option<&str>, key: &EncodingKey, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, key).unwrap()
}

#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Whether discovery names a `jwks_uri`.
    pub advertise_jwks_uri: bool,
    /// Number of initial discovery requests answered with HTTP 500.
    pub failing_discovery_requests: usize,
    /// Raw body served instead of the key set.
    pub jwks_body: Option<String>,
    /// Keys published next to the signing key.
    pub extra_keys: Vec<Value>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            advertise_jwks_uri: true,
            failing_discovery_requests: 0,
            jwks_body: None,
            extra_keys: Vec::new(),
        }
    }
}

struct ProviderState {
    issuer: String,
    options: ProviderOptions,
    discovery_hits: Arc<AtomicUsize>,
    jwks_hits: Arc<AtomicUsize>,
    fallback_hits: Arc<AtomicUsize>,
}

/// Identity provider served from a local port.
pub struct MockProvider {
    issuer: String,
    pub discovery_hits: Arc<AtomicUsize>,
    pub jwks_hits: Arc<AtomicUsize>,
    pub fallback_hits: Arc<AtomicUsize>,
    server: tokio::task::JoinHandle<()>,
}

impl MockProvider {
    pub async fn start(options: ProviderOptions) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let issuer = format!("http://{}", listener.local_addr().unwrap());

        let discovery_hits = Arc::new(AtomicUsize::new(0));
        let jwks_hits = Arc::new(AtomicUsize::new(0));
        let fallback_hits = Arc::new(AtomicUsize::new(0));

        let state = Arc::new(ProviderState {
            issuer: issuer.clone(),
            options,
            discovery_hits: discovery_hits.clone(),
            jwks_hits: jwks_hits.clone(),
            fallback_hits: fallback_hits.clone(),
        });

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/certs", get(certs))
            .route(FALLBACK_JWKS_PATH, get(fallback_certs))
            .with_state(state);

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            issuer,
            discovery_hits,
            jwks_hits,
            fallback_hits,
            server,
        }
    }

    pub fn issuer(&self) -> String {
        self.issuer.clone()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn discovery(State(state): State<Arc<ProviderState>>) -> impl IntoResponse {
    let hit = state.discovery_hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= state.options.failing_discovery_requests {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response();
    }

    let mut doc = json!({
        "issuer": state.issuer,
        "token_endpoint": format!("{}/token", state.issuer),
    });
    if state.options.advertise_jwks_uri {
        doc["jwks_uri"] = json!(format!("{}/certs", state.issuer));
    }
    Json(doc).into_response()
}

fn key_set(state: &ProviderState) -> axum::response::Response {
    if let Some(body) = &state.options.jwks_body {
        return (StatusCode::OK, body.clone()).into_response();
    }
    let mut keys = vec![signing_jwk()];
    keys.extend(state.options.extra_keys.iter().cloned());
    Json(json!({ "keys": keys })).into_response()
}

async fn certs(State(state): State<Arc<ProviderState>>) -> impl IntoResponse {
    state.jwks_hits.fetch_add(1, Ordering::SeqCst);
    key_set(&state)
}

async fn fallback_certs(State(state): State<Arc<ProviderState>>) -> impl IntoResponse {
    state.fallback_hits.fetch_add(1, Ordering::SeqCst);
    key_set(&state)
}
