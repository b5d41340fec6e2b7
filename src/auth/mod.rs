//! Authentication and request identity.
//!
//! Requests are resolved to a normalized [`Claims`] record through one of
//! three entry points on [`IdentityResolver`]:
//!
//! - `resolve_required`: identity must carry a tenant
//! - `resolve_without_tenant`: tenant may be assigned server-side later
//! - `resolve_optional`: never fails; falls back to a synthesized identity
//!
//! In production the resolver verifies RS256 bearer tokens against the
//! issuer's published keys ([`TokenVerifier`], [`KeyDirectory`]). With the
//! development bypass selected at startup, identity comes from headers.
//!
//! ## Usage
//!
//! ```ignore
//! let resolver = IdentityResolver::from_config(&IdentityConfig::from_env())?;
//! let (mut parts, body) = request.into_parts();
//! let claims = resolver.resolve_required(&mut parts).await?;
//! ```

pub mod claims;
mod context;
mod error;
pub mod jwks;
mod resolver;
mod verifier;


pub use claims::{Claims, DEFAULT_ROLE, IdentityOrigin, TokenClaims};
pub use context::RequestIdentity;
pub use error::AuthError;
pub use jwks::{DiscoveryDocument, KeyDirectory, KeyDirectoryError, SigningKeySet};
pub use resolver::{IdentityResolver, VerificationStrategy, bearer_token, parse_roles};
pub use verifier::{SIGNING_ALGORITHM, TokenVerifier};
