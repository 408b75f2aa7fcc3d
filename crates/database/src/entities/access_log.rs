//! Tenant access audit log definitions
//!
//! Every step of the magic-link flow is recorded here. Failed identity
//! verifications are counted from this table when deciding to revoke a token.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantAccessLog {
    pub id: i64,
    pub lease_id: Option<i64>,
    pub action: AccessAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessAction {
    TokenGenerated,
    TokenValidated,
    TokenValidationFailed,
    IdentityVerified,
    IdentityVerificationFailed,
    TokenRevoked,
    SessionCreated,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::TokenGenerated => "token_generated",
            AccessAction::TokenValidated => "token_validated",
            AccessAction::TokenValidationFailed => "token_validation_failed",
            AccessAction::IdentityVerified => "identity_verified",
            AccessAction::IdentityVerificationFailed => "identity_verification_failed",
            AccessAction::TokenRevoked => "token_revoked",
            AccessAction::SessionCreated => "session_created",
        }
    }
}

impl From<&str> for AccessAction {
    fn from(s: &str) -> Self {
        match s {
            "token_generated" => AccessAction::TokenGenerated,
            "token_validated" => AccessAction::TokenValidated,
            "identity_verified" => AccessAction::IdentityVerified,
            "identity_verification_failed" => AccessAction::IdentityVerificationFailed,
            "token_revoked" => AccessAction::TokenRevoked,
            "session_created" => AccessAction::SessionCreated,
            _ => AccessAction::TokenValidationFailed,
        }
    }
}

impl std::fmt::Display for AccessAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
