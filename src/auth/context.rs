//! Request-scoped identity attached for downstream handlers.

use axum::extract::FromRequestParts;
use http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::auth::claims::{Claims, IdentityOrigin};
use crate::auth::error::AuthError;
use crate::types::TenantId;

/// Identity stored in the request's extensions after successful resolution.
///
/// Immutable once created; handlers read it through the axum extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIdentity {
    /// Subject of the resolved identity
    subject: String,
    /// Tenant the request is scoped to, if known
    tenant_id: Option<TenantId>,
    /// Roles granted to the caller
    roles: Vec<String>,
    /// How the identity was established
    origin: IdentityOrigin,
}

impl RequestIdentity {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            subject: claims.sub.clone(),
            tenant_id: claims.tenant_id,
            roles: claims.roles.clone(),
            origin: claims.origin,
        }
    }

    /// Same identity scoped to a tenant resolved server-side.
    pub fn with_tenant(self, tenant_id: Option<TenantId>) -> Self {
        Self { tenant_id, ..self }
    }

    /// Store this identity on the request.
    pub fn attach(self, parts: &mut Parts) {
        parts.extensions.insert(self);
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn origin(&self) -> IdentityOrigin {
        self.origin
    }
}

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .ok_or_else(|| {
                AuthError::Configuration("request identity was not resolved".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_parts() -> Parts {
        http::Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_from_claims() {
        let claims = Claims::synthesized(
            "dev@local".to_string(),
            Some(TenantId::new(3)),
            vec!["ops".to_string(), "viewer".to_string()],
            IdentityOrigin::Bypass,
        );
        let identity = RequestIdentity::from_claims(&claims);

        assert_eq!(identity.subject(), "dev@local");
        assert_eq!(identity.tenant_id(), Some(TenantId::new(3)));
        assert!(identity.has_role("viewer"));
        assert!(!identity.has_role("admin"));
        assert_eq!(identity.origin(), IdentityOrigin::Bypass);
    }

    #[test]
    fn test_attach_stores_in_extensions() {
        let mut parts = empty_parts();
        let claims = Claims::synthesized(
            "dev@local".to_string(),
            None,
            Vec::new(),
            IdentityOrigin::Optional,
        );

        RequestIdentity::from_claims(&claims).attach(&mut parts);

        let stored = parts.extensions.get::<RequestIdentity>().unwrap();
        assert_eq!(stored.roles(), ["admin".to_string()]);
        assert_eq!(stored.tenant_id(), None);
    }

    #[test]
    fn test_with_tenant_replaces_claimed_tenant() {
        let claims = Claims::synthesized(
            "dev@local".to_string(),
            Some(TenantId::new(3)),
            vec!["ops".to_string()],
            IdentityOrigin::Bypass,
        );
        let identity = RequestIdentity::from_claims(&claims).with_tenant(Some(TenantId::new(8)));

        assert_eq!(identity.tenant_id(), Some(TenantId::new(8)));
        assert_eq!(identity.subject(), "dev@local");
        assert!(identity.has_role("ops"));
    }

    #[tokio::test]
    async fn test_extractor_rejects_unresolved_request() {
        let mut parts = empty_parts();
        let result = RequestIdentity::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }
}
