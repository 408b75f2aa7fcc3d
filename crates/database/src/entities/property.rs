//! Property and review entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    pub public_id: String,
    pub team_id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub city: Option<String>,
    pub address: Option<String>,
    pub images: Vec<String>,
    pub validation_status: ValidationStatus,
    pub payment_ref: Option<String>,
    pub payment_date: Option<String>,
    pub payment_amount: Option<i64>,
    pub service_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePropertyRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub city: Option<String>,
    pub address: Option<String>,
    pub images: Vec<String>,
}

/// Payment reference fields written by the listing-boost payment path.
/// The validation status is deliberately untouched; an admin confirms it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPayment {
    pub payment_ref: String,
    pub payment_amount: i64,
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Pending,
    PaymentPending,
    Verified,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::PaymentPending => "payment_pending",
            ValidationStatus::Verified => "verified",
            ValidationStatus::Rejected => "rejected",
        }
    }

    /// Verification decisions only apply to listings still awaiting one.
    pub fn can_decide(&self) -> bool {
        matches!(
            self,
            ValidationStatus::Pending | ValidationStatus::PaymentPending
        )
    }
}

impl From<&str> for ValidationStatus {
    fn from(s: &str) -> Self {
        match s {
            "payment_pending" => ValidationStatus::PaymentPending,
            "verified" => ValidationStatus::Verified,
            "rejected" => ValidationStatus::Rejected,
            _ => ValidationStatus::Pending,
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub property_id: i64,
    pub author_name: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    pub author_name: String,
    pub rating: i64,
    pub comment: Option<String>,
}
