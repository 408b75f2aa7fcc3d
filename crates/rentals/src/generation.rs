//! Monthly rent schedule generation.

use chrono::{Datelike, NaiveDate};
use keur_cache::{keys, CacheClient};
use keur_database::{LeaseRepository, RentalResult, TransactionRepository};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::info;

/// Outcome of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub leases_scanned: usize,
    pub created: usize,
    pub skipped: usize,
}

pub struct GenerationService {
    leases: LeaseRepository,
    transactions: TransactionRepository,
    cache: CacheClient,
}

impl GenerationService {
    pub fn new(pool: SqlitePool, cache: CacheClient) -> Self {
        Self {
            leases: LeaseRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool),
            cache,
        }
    }

    /// Insert the current period's pending transaction for every active
    /// lease. The unique period index makes reruns no-ops.
    pub async fn generate_current_period(&self, today: NaiveDate) -> RentalResult<GenerationReport> {
        let (year, month) = (today.year() as i64, today.month() as i64);
        let leases = self.leases.find_all_active().await?;

        let mut report = GenerationReport {
            leases_scanned: leases.len(),
            created: 0,
            skipped: 0,
        };
        let mut touched_teams = BTreeSet::new();

        for lease in &leases {
            let inserted = self
                .transactions
                .create_for_period(lease.id, lease.team_id, year, month, lease.monthly_amount)
                .await?;
            if inserted {
                report.created += 1;
                touched_teams.insert(lease.team_id);
            } else {
                report.skipped += 1;
            }
        }

        for team_id in touched_teams {
            self.cache.invalidate(&keys::rental_keys(team_id, None)).await;
        }

        info!(
            year = year,
            month = month,
            scanned = report.leases_scanned,
            created = report.created,
            "generated monthly rental transactions"
        );

        Ok(report)
    }

    /// Flip past-due pending transactions to overdue. Affected teams are
    /// not tracked; their cached stats refresh on TTL expiry.
    pub async fn mark_overdue(&self, today: NaiveDate) -> RentalResult<u64> {
        let flipped = self.transactions.mark_overdue(today).await?;
        if flipped > 0 {
            info!(flipped = flipped, "marked rental transactions overdue");
        }
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keur_database::{CreateLeaseRequest, MIGRATOR};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (public_id, email, created_at) VALUES ('u_test', 'owner@test.sn', ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO teams (public_id, name, created_by, created_at) VALUES ('t_test', 'Agence Test', 1, ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    async fn seed_lease(pool: &SqlitePool, tenant: &str, active: bool) {
        let lease = LeaseRepository::new(pool.clone())
            .create(
                1,
                1,
                &CreateLeaseRequest {
                    property_id: None,
                    tenant_name: tenant.to_string(),
                    tenant_phone: None,
                    tenant_email: None,
                    property_address: None,
                    monthly_amount: 250_000,
                    billing_day: Some(5),
                    start_date: "2025-01-01".to_string(),
                    end_date: None,
                },
            )
            .await
            .unwrap();

        if !active {
            LeaseRepository::new(pool.clone())
                .terminate(1, lease.id)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_generation_is_idempotent_and_skips_terminated() {
        let pool = create_test_pool().await;
        seed_lease(&pool, "Awa Diop", true).await;
        seed_lease(&pool, "Moussa Fall", true).await;
        seed_lease(&pool, "Fatou Sarr", false).await;

        let service = GenerationService::new(pool, CacheClient::memory("test"));
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let first = service.generate_current_period(today).await.unwrap();
        assert_eq!(first.leases_scanned, 2);
        assert_eq!(first.created, 2);
        assert_eq!(first.skipped, 0);

        let second = service.generate_current_period(today).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 2);
    }

    #[tokio::test]
    async fn test_mark_overdue_counts_flips() {
        let pool = create_test_pool().await;
        seed_lease(&pool, "Awa Diop", true).await;

        let service = GenerationService::new(pool, CacheClient::memory("test"));
        let march = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        service.generate_current_period(march).await.unwrap();

        // Billing day 5 has not passed yet in the period itself.
        assert_eq!(service.mark_overdue(march).await.unwrap(), 0);

        let april = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert_eq!(service.mark_overdue(april).await.unwrap(), 1);
    }
}
