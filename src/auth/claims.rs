//! Normalized identity claims.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::TenantId;

/// Role granted to synthesized identities when none are supplied.
pub const DEFAULT_ROLE: &str = "admin";

/// How an identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityOrigin {
    /// Token signature and claims were verified.
    Verified,
    /// Development bypass, built from headers.
    Bypass,
    /// Lenient onboarding path, built from headers after no usable token.
    Optional,
}

/// Identity produced by every resolution entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub roles: Vec<String>,
    #[serde(skip)]
    pub origin: IdentityOrigin,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    bypass: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    optional: bool,
}

impl Claims {
    /// Identity from a verified token.
    pub fn verified(token: TokenClaims) -> Self {
        let roles = token.roles();
        // Tokens without a subject are identified by their email.
        let sub = token
            .sub
            .or_else(|| token.email.clone())
            .unwrap_or_default();
        Self {
            sub,
            email: token.email,
            tenant_id: token.tenant_id,
            roles,
            origin: IdentityOrigin::Verified,
            bypass: false,
            optional: false,
        }
    }

    /// Identity synthesized from headers or environment defaults.
    ///
    /// The email doubles as subject. An empty role list becomes the single
    /// default role.
    pub fn synthesized(
        email: String,
        tenant_id: Option<TenantId>,
        roles: Vec<String>,
        origin: IdentityOrigin,
    ) -> Self {
        let roles = if roles.is_empty() {
            vec![DEFAULT_ROLE.to_string()]
        } else {
            roles
        };
        Self {
            sub: email.clone(),
            email: Some(email),
            tenant_id,
            roles,
            origin,
            bypass: origin == IdentityOrigin::Bypass,
            optional: origin == IdentityOrigin::Optional,
        }
    }

    pub fn is_bypass(&self) -> bool {
        self.origin == IdentityOrigin::Bypass
    }

    pub fn is_optional(&self) -> bool {
        self.origin == IdentityOrigin::Optional
    }

    /// Email if present, otherwise the subject.
    pub fn email_or_subject(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.sub)
    }
}

/// Payload of a verified token.
///
/// Only the signature and registered claims decide whether a token is
/// accepted. Application claims of an unexpected shape read as absent.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_tenant_id")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, deserialize_with = "lenient_roles")]
    pub roles: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_realm_access")]
    pub realm_access: Option<RealmAccess>,
    pub exp: Option<u64>,
}

/// Keycloak-style realm role container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealmAccess {
    #[serde(default, deserialize_with = "lenient_roles")]
    pub roles: Option<Vec<String>>,
}

impl TokenClaims {
    /// Top-level roles, falling back to realm roles.
    pub fn roles(&self) -> Vec<String> {
        match (&self.roles, &self.realm_access) {
            (Some(roles), _) => roles.clone(),
            (None, Some(realm)) => realm.roles.clone().unwrap_or_default(),
            (None, None) => Vec::new(),
        }
    }
}

/// Accept an integer or numeric string; anything else reads as absent.
fn lenient_tenant_id<'de, D>(deserializer: D) -> Result<Option<TenantId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().map(TenantId::new),
        Some(Value::String(s)) => TenantId::parse_lenient(&s),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// Keep the string entries of an array; anything else reads as absent.
fn lenient_roles<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(role) => Some(role),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

fn lenient_realm_access<'de, D>(deserializer: D) -> Result<Option<RealmAccess>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
