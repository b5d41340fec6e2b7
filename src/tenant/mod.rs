//! Tenant resolution.
//!
//! A caller's tenant is decided by an ordered list of strategies. The
//! standard order trusts infrastructure first (which database this
//! deployment points at), then signed claims, then historical user
//! associations.

mod resolver;
pub mod store;
pub mod strategy;

pub use resolver::{TenantResolver, TenantSession};
pub use store::{DatabaseMapping, SurrealTenantStore, TenantStore};
pub use strategy::{TenantQuery, TenantStrategy};
