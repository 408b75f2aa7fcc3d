//! Keurimmo Tenants Crate
//!
//! Passwordless tenant access: magic-link tokens, identity verification and
//! the audit trail behind them.

pub mod identity;
pub mod magic_link;

pub use magic_link::{
    AccessContext, GeneratedToken, MagicLinkService, MAX_FAILED_ATTEMPTS, TENANT_SESSION_TTL_HOURS,
    TOKEN_EXPIRATION_DAYS,
};
