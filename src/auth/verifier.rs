//! Bearer token verification against the provider's key directory.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use tracing::debug;

use crate::auth::claims::{Claims, TokenClaims};
use crate::auth::error::AuthError;
use crate::auth::jwks::{Jwk, KeyDirectory};

/// The only signature algorithm accepted.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verifies RS256 tokens issued by a single issuer.
pub struct TokenVerifier {
    issuer: String,
    audience: Option<String>,
    keys: Arc<KeyDirectory>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(issuer: impl Into<String>, audience: Option<String>, keys: Arc<KeyDirectory>) -> Self {
        Self {
            issuer: issuer.into(),
            audience,
            keys,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn key_directory(&self) -> &Arc<KeyDirectory> {
        &self.keys
    }

    /// Verify signature, issuer, expiry and (when configured) audience.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidToken(format!("Invalid token header: {}", e)))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Missing kid in token header".to_string()))?;

        let keys = self.keys.get_signing_keys().await?;
        let jwk = keys
            .get(&kid)
            .ok_or_else(|| AuthError::Unauthenticated("No matching JWK for kid".to_string()))?;

        let decoding_key = decoding_key(jwk)?;

        let token_data = decode::<TokenClaims>(token, &decoding_key, &self.validation())
            .map_err(|e| AuthError::Unauthenticated(e.to_string()))?;

        let claims = Claims::verified(token_data.claims);
        debug!("Token verified for subject: {}", claims.sub);
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        match &self.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        validation
    }
}

/// Convert a cached JWK into an RSA verification key.
fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    if jwk.kty != "RSA" {
        return Err(AuthError::InvalidToken(format!(
            "Unsupported key type: {}",
            jwk.kty
        )));
    }

    let n = jwk
        .n
        .as_deref()
        .ok_or_else(|| AuthError::InvalidToken("Invalid JWK: missing 'n'".to_string()))?;
    let e = jwk
        .e
        .as_deref()
        .ok_or_else(|| AuthError::InvalidToken("Invalid JWK: missing 'e'".to_string()))?;

    DecodingKey::from_rsa_components(n, e)
        .map_err(|e| AuthError::InvalidToken(format!("Invalid JWK: {}", e)))
}
