//! Generated document entity definitions
//!
//! Leases and rent receipts are stored as rendered documents so tenants and
//! owners can re-download them later. The catch-up job backfills any that a
//! failed generation left missing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    pub id: i64,
    pub public_id: String,
    pub team_id: i64,
    pub user_id: i64,
    pub lease_id: Option<i64>,
    pub transaction_id: Option<i64>,
    pub file_type: DocumentType,
    pub category: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub user_id: i64,
    pub lease_id: Option<i64>,
    pub transaction_id: Option<i64>,
    pub file_type: DocumentType,
    pub category: String,
    pub title: String,
    pub body: String,
}

/// Document kinds use the French labels the rest of the product shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Lease,
    Receipt,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Lease => "bail",
            DocumentType::Receipt => "quittance",
        }
    }
}

impl From<&str> for DocumentType {
    fn from(s: &str) -> Self {
        match s {
            "quittance" => DocumentType::Receipt,
            _ => DocumentType::Lease,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
