//! Lease entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub public_id: String,
    pub team_id: i64,
    pub owner_id: i64,
    pub property_id: Option<i64>,
    pub tenant_name: String,
    pub tenant_phone: Option<String>,
    pub tenant_email: Option<String>,
    pub property_address: Option<String>,
    pub monthly_amount: i64,
    pub billing_day: i64,
    pub start_date: String,
    pub end_date: Option<String>,
    pub status: LeaseStatus,
    pub token_verified: bool,
    pub token_revoked: bool,
    pub last_access_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeaseRequest {
    pub property_id: Option<i64>,
    pub tenant_name: String,
    pub tenant_phone: Option<String>,
    pub tenant_email: Option<String>,
    pub property_address: Option<String>,
    pub monthly_amount: i64,
    pub billing_day: Option<i64>,
    pub start_date: String,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseStatus {
    Active,
    Terminated,
}

impl LeaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseStatus::Active => "active",
            LeaseStatus::Terminated => "terminated",
        }
    }
}

impl From<&str> for LeaseStatus {
    fn from(s: &str) -> Self {
        match s {
            "terminated" => LeaseStatus::Terminated,
            _ => LeaseStatus::Active,
        }
    }
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
