//! NewType wrappers for strong typing across identity and tenant resolution.
//!
//! These types keep semantically different values apart (e.g., passing a
//! database name where a key id is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// String identifier compared by exact equality and usable as a `&str` map key.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Key identifier (`kid`) of a signing key in the provider's key directory.
    ///
    /// Token headers name the key they were signed with; lookups compare
    /// this value by exact equality.
    KeyId
);

newtype_string!(
    /// Name of an external tenant database (e.g., "acme_prod").
    ///
    /// Mapped to a tenant through the `tenant_database` table.
    DatabaseName
);

/// Numeric tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(i64);

impl TenantId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Tenant `0` is the unassigned placeholder, never a real tenant.
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// Parse a raw header or environment value.
    ///
    /// Surrounding whitespace is ignored; anything that is not an integer
    /// yields `None`.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        raw.trim().parse::<i64>().ok().map(Self)
    }
}

impl From<i64> for TenantId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
