//! Repository for rental transaction data access operations.
//!
//! Settlement is a conditional pending-to-paid update so a redelivered
//! payment webhook cannot settle the same period twice.

use crate::entities::{
    AdvancedStats, LatePayment, PaymentDetails, RentalStats, RentalTransaction, RevenueMonth,
    TransactionStatus,
};
use crate::types::{RentalError, RentalResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::info;

const TX_COLUMNS: &str = "id, lease_id, team_id, period_month, period_year, status, \
     amount_due, amount_paid, paid_at, payment_method, payment_ref, created_at";

/// Repository for rental transaction database operations
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the transaction for a lease period if it does not exist yet.
    /// Returns true when a new row was inserted.
    pub async fn create_for_period(
        &self,
        lease_id: i64,
        team_id: i64,
        period_year: i64,
        period_month: i64,
        amount_due: i64,
    ) -> RentalResult<bool> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO rental_transactions \
             (lease_id, team_id, period_year, period_month, status, amount_due, created_at) \
             VALUES (?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(lease_id)
        .bind(team_id)
        .bind(period_year)
        .bind(period_month)
        .bind(amount_due)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// All transactions for a team, newest period first
    pub async fn find_by_team(&self, team_id: i64) -> RentalResult<Vec<RentalTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM rental_transactions \
             WHERE team_id = ? ORDER BY period_year DESC, period_month DESC, id DESC"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_transaction_row).collect()
    }

    /// All transactions for a lease, newest period first
    pub async fn find_by_lease(&self, lease_id: i64) -> RentalResult<Vec<RentalTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM rental_transactions \
             WHERE lease_id = ? ORDER BY period_year DESC, period_month DESC"
        ))
        .bind(lease_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_transaction_row).collect()
    }

    /// Find a transaction scoped to a team
    pub async fn find_by_id(
        &self,
        team_id: i64,
        transaction_id: i64,
    ) -> RentalResult<Option<RentalTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM rental_transactions WHERE id = ? AND team_id = ?"
        ))
        .bind(transaction_id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        row.map(map_transaction_row).transpose()
    }

    /// Load a transaction without team scoping. Payment webhooks resolve the
    /// team from the row itself.
    pub async fn find_by_id_unscoped(
        &self,
        transaction_id: i64,
    ) -> RentalResult<Option<RentalTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM rental_transactions WHERE id = ?"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        row.map(map_transaction_row).transpose()
    }

    /// Find the transaction for a lease billing period
    pub async fn find_by_period(
        &self,
        lease_id: i64,
        period_year: i64,
        period_month: i64,
    ) -> RentalResult<Option<RentalTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM rental_transactions \
             WHERE lease_id = ? AND period_year = ? AND period_month = ?"
        ))
        .bind(lease_id)
        .bind(period_year)
        .bind(period_month)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        row.map(map_transaction_row).transpose()
    }

    /// Settle a transaction if it has not been settled yet. Returns true when
    /// this call performed the transition, false when the row was already
    /// paid or does not exist.
    pub async fn settle_if_pending(
        &self,
        transaction_id: i64,
        details: &PaymentDetails,
    ) -> RentalResult<bool> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE rental_transactions \
             SET status = 'paid', amount_paid = ?, paid_at = ?, payment_method = ?, payment_ref = ? \
             WHERE id = ? AND status IN ('pending', 'overdue')",
        )
        .bind(details.amount_paid)
        .bind(&now)
        .bind(&details.payment_method)
        .bind(&details.payment_ref)
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        let settled = result.rows_affected() > 0;
        if settled {
            info!(
                transaction_id = transaction_id,
                method = %details.payment_method,
                "settled rental transaction"
            );
        }
        Ok(settled)
    }

    /// Flip pending transactions whose due date has passed to overdue.
    /// Returns the number of rows updated.
    pub async fn mark_overdue(&self, today: NaiveDate) -> RentalResult<u64> {
        let (year, month, day) = (today.year() as i64, today.month() as i64, today.day() as i64);

        let result = sqlx::query(
            "UPDATE rental_transactions SET status = 'overdue' \
             WHERE status = 'pending' AND id IN ( \
                 SELECT t.id FROM rental_transactions t \
                 JOIN leases l ON l.id = t.lease_id \
                 WHERE t.status = 'pending' AND ( \
                     t.period_year < ? \
                     OR (t.period_year = ? AND t.period_month < ?) \
                     OR (t.period_year = ? AND t.period_month = ? AND l.billing_day < ?)))",
        )
        .bind(year)
        .bind(year)
        .bind(month)
        .bind(year)
        .bind(month)
        .bind(day)
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Dashboard headline stats for a team, relative to the given period
    pub async fn rental_stats(
        &self,
        team_id: i64,
        period_year: i64,
        period_month: i64,
    ) -> RentalResult<RentalStats> {
        let row = sqlx::query(
            "SELECT \
                 (SELECT COUNT(*) FROM leases WHERE team_id = ?1) AS total_leases, \
                 (SELECT COUNT(*) FROM leases WHERE team_id = ?1 AND status = 'active') AS active_leases, \
                 (SELECT COALESCE(SUM(monthly_amount), 0) FROM leases \
                  WHERE team_id = ?1 AND status = 'active') AS expected_monthly, \
                 (SELECT COALESCE(SUM(amount_paid), 0) FROM rental_transactions \
                  WHERE team_id = ?1 AND status = 'paid' \
                  AND period_year = ?2 AND period_month = ?3) AS collected_this_month, \
                 (SELECT COUNT(*) FROM rental_transactions \
                  WHERE team_id = ?1 AND status = 'pending' \
                  AND period_year = ?2 AND period_month = ?3) AS pending_count, \
                 (SELECT COUNT(*) FROM rental_transactions \
                  WHERE team_id = ?1 AND status = 'overdue') AS overdue_count",
        )
        .bind(team_id)
        .bind(period_year)
        .bind(period_month)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        Ok(RentalStats {
            total_leases: try_get(&row, "total_leases")?,
            active_leases: try_get(&row, "active_leases")?,
            expected_monthly: try_get(&row, "expected_monthly")?,
            collected_this_month: try_get(&row, "collected_this_month")?,
            pending_count: try_get(&row, "pending_count")?,
            overdue_count: try_get(&row, "overdue_count")?,
        })
    }

    /// Unsettled transactions past their due date, with tenant context.
    /// Pending rows count as late once their billing day has passed, whether
    /// or not the overdue job has run since.
    pub async fn late_payments(
        &self,
        team_id: i64,
        today: NaiveDate,
    ) -> RentalResult<Vec<LatePayment>> {
        let (year, month, day) = (today.year() as i64, today.month() as i64, today.day() as i64);

        let rows = sqlx::query(
            "SELECT t.id AS transaction_id, t.lease_id, l.tenant_name, l.property_address, \
                 t.period_month, t.period_year, t.amount_due, l.billing_day \
             FROM rental_transactions t \
             JOIN leases l ON l.id = t.lease_id \
             WHERE t.team_id = ?1 AND l.status = 'active' \
             AND t.status IN ('pending', 'overdue') \
             AND (t.period_year < ?2 \
                 OR (t.period_year = ?2 AND t.period_month < ?3) \
                 OR (t.period_year = ?2 AND t.period_month = ?3 AND l.billing_day < ?4)) \
             ORDER BY t.period_year, t.period_month",
        )
        .bind(team_id)
        .bind(year)
        .bind(month)
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let period_year: i64 = try_get(&row, "period_year")?;
                let period_month: i64 = try_get(&row, "period_month")?;
                let billing_day: i64 = try_get(&row, "billing_day")?;

                let days_late = NaiveDate::from_ymd_opt(
                    period_year as i32,
                    period_month as u32,
                    billing_day as u32,
                )
                .map(|due| (today - due).num_days().max(0))
                .unwrap_or(0);

                Ok(LatePayment {
                    transaction_id: try_get(&row, "transaction_id")?,
                    lease_id: try_get(&row, "lease_id")?,
                    tenant_name: try_get(&row, "tenant_name")?,
                    property_address: row
                        .try_get("property_address")
                        .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
                    period_month,
                    period_year,
                    amount_due: try_get(&row, "amount_due")?,
                    days_late,
                })
            })
            .collect()
    }

    /// Portfolio KPIs: occupancy, payment delay, unpaid rate and average
    /// revenue per occupied property.
    pub async fn advanced_stats(&self, team_id: i64) -> RentalResult<AdvancedStats> {
        let counts = sqlx::query(
            "SELECT \
                 (SELECT COUNT(*) FROM properties WHERE team_id = ?1) AS total_properties, \
                 (SELECT COUNT(*) FROM rental_transactions WHERE team_id = ?1) AS total_transactions, \
                 (SELECT COUNT(*) FROM rental_transactions \
                  WHERE team_id = ?1 AND status = 'failed') AS failed_transactions",
        )
        .bind(team_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        let total_properties: i64 = try_get(&counts, "total_properties")?;
        let total_transactions: i64 = try_get(&counts, "total_transactions")?;
        let failed_transactions: i64 = try_get(&counts, "failed_transactions")?;

        let lease_rows = sqlx::query(
            "SELECT id, monthly_amount, billing_day, property_address FROM leases \
             WHERE team_id = ? AND status = 'active'",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        let mut billing_days = HashMap::new();
        let mut addresses = HashSet::new();
        let mut monthly_revenue = 0i64;
        for row in &lease_rows {
            let lease_id: i64 = try_get(row, "id")?;
            let billing_day: i64 = try_get(row, "billing_day")?;
            let monthly_amount: i64 = try_get(row, "monthly_amount")?;
            let address: Option<String> = try_get(row, "property_address")?;

            billing_days.insert(lease_id, billing_day);
            monthly_revenue += monthly_amount;
            if let Some(address) = address {
                addresses.insert(address.trim().to_lowercase());
            }
        }
        let active_leases = lease_rows.len() as i64;

        // Leases without a linked property still occupy distinct addresses.
        let occupancy_base = if total_properties == 0 && active_leases > 0 {
            addresses.len() as i64
        } else {
            total_properties
        };
        let occupancy_rate = if occupancy_base > 0 {
            (((active_leases as f64 / occupancy_base as f64) * 100.0).round() as i64).min(100)
        } else if active_leases > 0 {
            100
        } else {
            0
        };

        // Average settlement delay over the most recent settlements.
        let paid_rows = sqlx::query(
            "SELECT lease_id, paid_at, period_month, period_year FROM rental_transactions \
             WHERE team_id = ? AND status = 'paid' AND paid_at IS NOT NULL \
             ORDER BY paid_at DESC LIMIT 50",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        let mut total_delay = 0i64;
        let mut delay_count = 0i64;
        for row in &paid_rows {
            let lease_id: i64 = try_get(row, "lease_id")?;
            let paid_at: String = try_get(row, "paid_at")?;
            let period_year: i64 = try_get(row, "period_year")?;
            let period_month: i64 = try_get(row, "period_month")?;

            let Some(billing_day) = billing_days.get(&lease_id) else {
                continue;
            };
            let due = NaiveDate::from_ymd_opt(
                period_year as i32,
                period_month as u32,
                *billing_day as u32,
            );
            let paid_date = DateTime::parse_from_rfc3339(&paid_at)
                .ok()
                .map(|d| d.date_naive());

            if let (Some(due), Some(paid_date)) = (due, paid_date) {
                let days = (paid_date - due).num_days();
                if days >= 0 {
                    total_delay += days;
                    delay_count += 1;
                }
            }
        }
        let avg_payment_delay = if delay_count > 0 {
            (total_delay as f64 / delay_count as f64).round() as i64
        } else {
            0
        };

        let unpaid_rate = if total_transactions > 0 {
            ((failed_transactions as f64 / total_transactions as f64) * 100.0).round() as i64
        } else {
            0
        };
        let avg_revenue_per_property = if active_leases > 0 {
            (monthly_revenue as f64 / active_leases as f64).round() as i64
        } else {
            0
        };

        Ok(AdvancedStats {
            occupancy_rate,
            avg_payment_delay,
            unpaid_rate,
            avg_revenue_per_property,
            total_properties,
            active_leases,
        })
    }

    /// Expected and collected revenue for each of the last `months` calendar
    /// months ending at `today`, oldest first. Months with no transactions
    /// are zero-filled.
    pub async fn revenue_history(
        &self,
        team_id: i64,
        months: i64,
        today: NaiveDate,
    ) -> RentalResult<Vec<RevenueMonth>> {
        // Periods indexed as year * 12 + (month - 1) so the window wraps
        // across year boundaries.
        let newest = today.year() as i64 * 12 + i64::from(today.month()) - 1;
        let oldest = newest - (months - 1);
        let (min_year, min_month) = (oldest.div_euclid(12), oldest.rem_euclid(12) + 1);

        let rows = sqlx::query(
            "SELECT period_year, period_month, \
                 COALESCE(SUM(amount_due), 0) AS expected, \
                 COALESCE(SUM(CASE WHEN status = 'paid' THEN amount_paid ELSE 0 END), 0) AS collected \
             FROM rental_transactions \
             WHERE team_id = ?1 \
             AND (period_year > ?2 OR (period_year = ?2 AND period_month >= ?3)) \
             GROUP BY period_year, period_month",
        )
        .bind(team_id)
        .bind(min_year)
        .bind(min_month)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        let mut by_period = HashMap::new();
        for row in rows {
            let year: i64 = try_get(&row, "period_year")?;
            let month: i64 = try_get(&row, "period_month")?;
            let expected: i64 = try_get(&row, "expected")?;
            let collected: i64 = try_get(&row, "collected")?;
            by_period.insert(year * 12 + month - 1, (expected, collected));
        }

        Ok((oldest..=newest)
            .map(|index| {
                let (expected, collected) = by_period.get(&index).copied().unwrap_or((0, 0));
                RevenueMonth {
                    year: index.div_euclid(12),
                    month: index.rem_euclid(12) + 1,
                    expected,
                    collected,
                }
            })
            .collect())
    }
}

fn try_get<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> RentalResult<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RentalError::DatabaseError(e.to_string()))
}

fn map_transaction_row(row: sqlx::sqlite::SqliteRow) -> RentalResult<RentalTransaction> {
    let status_str: String = try_get(&row, "status")?;

    Ok(RentalTransaction {
        id: try_get(&row, "id")?,
        lease_id: try_get(&row, "lease_id")?,
        team_id: try_get(&row, "team_id")?,
        period_month: try_get(&row, "period_month")?,
        period_year: try_get(&row, "period_year")?,
        status: TransactionStatus::from(status_str.as_str()),
        amount_due: try_get(&row, "amount_due")?,
        amount_paid: try_get(&row, "amount_paid")?,
        paid_at: try_get(&row, "paid_at")?,
        payment_method: try_get(&row, "payment_method")?,
        payment_ref: try_get(&row, "payment_ref")?,
        created_at: try_get(&row, "created_at")?,
    })
}
