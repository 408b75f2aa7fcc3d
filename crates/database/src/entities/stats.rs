//! Aggregated read models for the owner dashboard

use serde::{Deserialize, Serialize};

/// Headline numbers shown on the rentals dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalStats {
    pub total_leases: i64,
    pub active_leases: i64,
    pub expected_monthly: i64,
    pub collected_this_month: i64,
    pub pending_count: i64,
    pub overdue_count: i64,
}

/// A rent period past its due date that has not been settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatePayment {
    pub transaction_id: i64,
    pub lease_id: i64,
    pub tenant_name: String,
    pub property_address: Option<String>,
    pub period_month: i64,
    pub period_year: i64,
    pub amount_due: i64,
    pub days_late: i64,
}

/// Portfolio KPIs derived from leases, properties and payment timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedStats {
    /// Active leases over the property count, as a capped percentage.
    pub occupancy_rate: i64,
    /// Mean days between the billing day and settlement, late payments only.
    pub avg_payment_delay: i64,
    /// Failed transactions over all transactions, as a percentage.
    pub unpaid_rate: i64,
    pub avg_revenue_per_property: i64,
    pub total_properties: i64,
    pub active_leases: i64,
}

/// One calendar month of the revenue chart. Months without transactions
/// appear with both amounts at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueMonth {
    pub year: i64,
    pub month: i64,
    pub expected: i64,
    pub collected: i64,
}
