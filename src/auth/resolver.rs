//! Identity resolution for inbound requests.
//!
//! The resolver runs one of two strategies, chosen once at startup:
//!
//! - **Bypass**: identity is synthesized from `X-User-Email`, `X-User-Roles`
//!   and `X-Tenant-ID` with configured fallbacks. No token is inspected.
//! - **Verified**: a `Bearer` token is required and verified.
//!
//! `resolve_optional` sits beside both. It verifies a bearer token when one
//! is present and an issuer is configured, and otherwise (or when that fails)
//! synthesizes an identity marked optional. Callers of `resolve_optional`
//! must restrict what such an identity may do: an unauthenticated caller can
//! always obtain one.

use std::sync::Arc;

use http::HeaderMap;
use http::request::Parts;
use tracing::warn;

use crate::auth::claims::{Claims, IdentityOrigin};
use crate::auth::context::RequestIdentity;
use crate::auth::error::AuthError;
use crate::auth::jwks::KeyDirectory;
use crate::auth::verifier::TokenVerifier;
use crate::config::{IdentityConfig, SyntheticDefaults};
use crate::types::TenantId;

pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// How required identities are established.
#[derive(Debug, Clone)]
pub enum VerificationStrategy {
    /// Development only: trust identity headers.
    Bypass,
    /// Verify bearer tokens.
    Verified(Arc<TokenVerifier>),
}

/// Resolves requests to normalized identities.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    strategy: VerificationStrategy,
    /// Verifier used by the lenient path; present whenever an issuer is configured.
    optional_verifier: Option<Arc<TokenVerifier>>,
    defaults: SyntheticDefaults,
}

impl IdentityResolver {
    pub fn new(
        strategy: VerificationStrategy,
        optional_verifier: Option<Arc<TokenVerifier>>,
        defaults: SyntheticDefaults,
    ) -> Self {
        Self {
            strategy,
            optional_verifier,
            defaults,
        }
    }

    /// Build the resolver and its verifier from configuration.
    ///
    /// Fails when bypass is off and no issuer is configured.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, AuthError> {
        let verifier = match &config.issuer {
            Some(issuer) => {
                let keys = Arc::new(KeyDirectory::new(issuer.clone(), config.key_cache_ttl)?);
                Some(Arc::new(TokenVerifier::new(
                    issuer.clone(),
                    config.audience.clone(),
                    keys,
                )))
            }
            None => None,
        };

        let strategy = if config.dev_auth_bypass {
            warn!("Development auth bypass enabled; identity headers are trusted");
            VerificationStrategy::Bypass
        } else {
            let verifier = verifier.clone().ok_or_else(|| {
                AuthError::Configuration("SSO issuer not configured".to_string())
            })?;
            VerificationStrategy::Verified(verifier)
        };

        Ok(Self::new(strategy, verifier, config.synthetic.clone()))
    }

    pub fn strategy(&self) -> &VerificationStrategy {
        &self.strategy
    }

    /// Resolve an identity that must carry a tenant.
    pub async fn resolve_required(&self, parts: &mut Parts) -> Result<Claims, AuthError> {
        let claims = self.resolve(&parts.headers, true).await?;
        RequestIdentity::from_claims(&claims).attach(parts);
        Ok(claims)
    }

    /// Resolve an identity; the tenant may be assigned later.
    pub async fn resolve_without_tenant(&self, parts: &mut Parts) -> Result<Claims, AuthError> {
        let claims = self.resolve(&parts.headers, false).await?;
        RequestIdentity::from_claims(&claims).attach(parts);
        Ok(claims)
    }

    /// Resolve an identity without ever failing.
    ///
    /// Verification failures are logged and replaced by a synthesized identity.
    pub async fn resolve_optional(&self, parts: &mut Parts) -> Claims {
        let claims = match (bearer_token(&parts.headers), &self.optional_verifier) {
            (Some(token), Some(verifier)) => match verifier.verify(token).await {
                Ok(claims) => claims,
                Err(e) => {
                    warn!(target: "onboarding", "optional_identity token verify failed: {}", e);
                    self.synthesize(&parts.headers, IdentityOrigin::Optional)
                }
            },
            _ => self.synthesize(&parts.headers, IdentityOrigin::Optional),
        };

        RequestIdentity::from_claims(&claims).attach(parts);
        claims
    }

    async fn resolve(&self, headers: &HeaderMap, require_tenant: bool) -> Result<Claims, AuthError> {
        let verifier = match &self.strategy {
            VerificationStrategy::Bypass => {
                return Ok(self.synthesize(headers, IdentityOrigin::Bypass));
            }
            VerificationStrategy::Verified(verifier) => verifier,
        };

        let token = bearer_token(headers)
            .ok_or_else(|| AuthError::Unauthenticated("Missing bearer token".to_string()))?;

        let claims = verifier.verify(token).await?;

        if require_tenant && claims.tenant_id.is_none_or(TenantId::is_unassigned) {
            return Err(AuthError::Forbidden("Missing tenant_id claim".to_string()));
        }

        Ok(claims)
    }

    fn synthesize(&self, headers: &HeaderMap, origin: IdentityOrigin) -> Claims {
        let email = header_str(headers, USER_EMAIL_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| self.defaults.email.clone());

        let roles = header_str(headers, USER_ROLES_HEADER)
            .map(parse_roles)
            .unwrap_or_default();

        let tenant_id = header_str(headers, TENANT_ID_HEADER)
            .or(self.defaults.tenant_id.as_deref())
            .and_then(TenantId::parse_lenient);

        Claims::synthesized(email, tenant_id, roles, origin)
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Split a comma-separated role list, dropping blanks.
pub fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
