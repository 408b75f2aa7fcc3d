//! Rental transaction entity definitions
//!
//! One row per billing period per lease; the (lease, year, month) pair is
//! unique so repeated generation or webhook redelivery cannot duplicate it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalTransaction {
    pub id: i64,
    pub lease_id: i64,
    pub team_id: i64,
    pub period_month: i64,
    pub period_year: i64,
    pub status: TransactionStatus,
    pub amount_due: i64,
    pub amount_paid: Option<i64>,
    pub paid_at: Option<String>,
    pub payment_method: Option<String>,
    pub payment_ref: Option<String>,
    pub created_at: String,
}

/// Details of a settlement applied to a pending transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub amount_paid: i64,
    pub payment_method: String,
    pub payment_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Paid,
    Overdue,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Overdue => "overdue",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl From<&str> for TransactionStatus {
    fn from(s: &str) -> Self {
        match s {
            "paid" => TransactionStatus::Paid,
            "overdue" => TransactionStatus::Overdue,
            "failed" => TransactionStatus::Failed,
            _ => TransactionStatus::Pending,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
