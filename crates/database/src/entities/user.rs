//! User and session entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

/// A bearer session. Tenant sessions are bound to a lease instead of a user
/// account and only grant access to that lease's portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub token: String,
    pub user_id: Option<i64>,
    pub lease_id: Option<i64>,
    pub expires_at: String,
    pub created_at: String,
}
