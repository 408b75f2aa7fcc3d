//! Cached read models behind the owner dashboard.
//!
//! Every read goes through the cache-aside client with the TTLs from
//! `keur_cache::keys`, so a dead cache degrades to plain repository reads.

use chrono::{Datelike, Utc};
use keur_cache::{keys, CacheClient};
use keur_database::{
    AdvancedStats, LatePayment, Lease, LeaseMessage, LeaseRepository, LeaseStatus,
    MessageRepository, MessageSender, RentalError, RentalResult, RentalStats, RentalTransaction,
    RevenueMonth, TransactionRepository,
};
use sqlx::SqlitePool;

/// Cached rental reads for a team's dashboard.
pub struct RentalReadService {
    leases: LeaseRepository,
    transactions: TransactionRepository,
    messages: MessageRepository,
    cache: CacheClient,
}

impl RentalReadService {
    pub fn new(pool: SqlitePool, cache: CacheClient) -> Self {
        Self {
            leases: LeaseRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            cache,
        }
    }

    pub async fn leases(
        &self,
        team_id: i64,
        status: Option<LeaseStatus>,
    ) -> RentalResult<Vec<Lease>> {
        let key = keys::leases_key(team_id, status.map(|s| s.as_str()));
        self.cache
            .get_or_set(&key, keys::TTL_LEASES, || {
                self.leases.find_by_team(team_id, status)
            })
            .await
    }

    pub async fn transactions(&self, team_id: i64) -> RentalResult<Vec<RentalTransaction>> {
        self.cache
            .get_or_set(&keys::transactions_key(team_id), keys::TTL_TRANSACTIONS, || {
                self.transactions.find_by_team(team_id)
            })
            .await
    }

    /// Headline stats for the current billing period.
    pub async fn stats(&self, team_id: i64) -> RentalResult<RentalStats> {
        let now = Utc::now();
        let (year, month) = (now.year() as i64, now.month() as i64);

        self.cache
            .get_or_set(&keys::stats_key(team_id), keys::TTL_STATS, || {
                self.transactions.rental_stats(team_id, year, month)
            })
            .await
    }

    pub async fn late_payments(&self, team_id: i64) -> RentalResult<Vec<LatePayment>> {
        let today = Utc::now().date_naive();

        self.cache
            .get_or_set(
                &keys::late_payments_key(team_id),
                keys::TTL_LATE_PAYMENTS,
                || self.transactions.late_payments(team_id, today),
            )
            .await
    }

    /// A single lease. The cache key is lease-scoped, so team ownership is
    /// checked after the read.
    pub async fn lease_detail(&self, team_id: i64, lease_id: i64) -> RentalResult<Lease> {
        let lease: Lease = self
            .cache
            .get_or_set(
                &keys::lease_detail_key(lease_id),
                keys::TTL_LEASE_DETAIL,
                || async {
                    self.leases
                        .find_by_id_unscoped(lease_id)
                        .await?
                        .ok_or(RentalError::LeaseNotFound)
                },
            )
            .await?;

        if lease.team_id != team_id {
            return Err(RentalError::LeaseNotFound);
        }
        Ok(lease)
    }

    pub async fn lease_messages(
        &self,
        team_id: i64,
        lease_id: i64,
    ) -> RentalResult<Vec<LeaseMessage>> {
        self.lease_detail(team_id, lease_id).await?;

        self.cache
            .get_or_set(
                &keys::lease_messages_key(lease_id),
                keys::TTL_LEASE_MESSAGES,
                || self.messages.find_by_lease(lease_id),
            )
            .await
    }

    /// Post a message on the owner side and drop the thread's cache entry.
    pub async fn post_message(
        &self,
        team_id: i64,
        lease_id: i64,
        sender: MessageSender,
        body: &str,
    ) -> RentalResult<LeaseMessage> {
        let lease = self
            .leases
            .find_by_id(team_id, lease_id)
            .await?
            .ok_or(RentalError::LeaseNotFound)?;

        let message = self
            .messages
            .create(lease.id, team_id, sender, body)
            .await?;

        self.cache
            .invalidate(&[keys::lease_messages_key(lease_id)])
            .await;

        Ok(message)
    }

    pub async fn mark_messages_read(
        &self,
        team_id: i64,
        lease_id: i64,
        reader: MessageSender,
    ) -> RentalResult<u64> {
        self.leases
            .find_by_id(team_id, lease_id)
            .await?
            .ok_or(RentalError::LeaseNotFound)?;

        let marked = self.messages.mark_read(lease_id, reader).await?;
        if marked > 0 {
            self.cache
                .invalidate(&[keys::lease_messages_key(lease_id)])
                .await;
        }
        Ok(marked)
    }

    pub async fn advanced_stats(&self, team_id: i64) -> RentalResult<AdvancedStats> {
        self.cache
            .get_or_set(
                &keys::advanced_stats_key(team_id),
                keys::TTL_ADVANCED_STATS,
                || self.transactions.advanced_stats(team_id),
            )
            .await
    }

    /// Per-month expected and collected revenue. Only the fixed dashboard
    /// windows are accepted, which keeps the invalidation key set closed.
    pub async fn revenue_history(
        &self,
        team_id: i64,
        months: i64,
    ) -> RentalResult<Vec<RevenueMonth>> {
        if !keys::REVENUE_HISTORY_WINDOWS.contains(&months) {
            return Err(RentalError::InvalidInput(format!(
                "unsupported revenue window: {months}"
            )));
        }

        let today = Utc::now().date_naive();
        self.cache
            .get_or_set(
                &keys::revenue_history_key(team_id, months),
                keys::TTL_REVENUE_HISTORY,
                || self.transactions.revenue_history(team_id, months, today),
            )
            .await
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
        sqlx::query(
            "INSERT INTO teams (public_id, name, created_by, created_at) VALUES ('t_other', 'Autre Agence', 1, ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    fn lease_request(tenant: &str) -> CreateLeaseRequest {
        CreateLeaseRequest {
            property_id: None,
            tenant_name: tenant.to_string(),
            tenant_phone: None,
            tenant_email: None,
            property_address: None,
            monthly_amount: 250_000,
            billing_day: Some(5),
            start_date: "2025-01-01".to_string(),
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_lease_list_is_cached_until_invalidated() {
        let pool = create_test_pool().await;
        let cache = CacheClient::memory("test");
        let repo = LeaseRepository::new(pool.clone());
        let service = RentalReadService::new(pool, cache.clone());

        repo.create(1, 1, &lease_request("Awa Diop")).await.unwrap();
        assert_eq!(service.leases(1, None).await.unwrap().len(), 1);

        // A write that bypasses the service is invisible until invalidation.
        repo.create(1, 1, &lease_request("Moussa Fall")).await.unwrap();
        assert_eq!(service.leases(1, None).await.unwrap().len(), 1);

        cache.invalidate(&keys::rental_keys(1, None)).await;
        assert_eq!(service.leases(1, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lease_detail_is_team_scoped() {
        let pool = create_test_pool().await;
        let repo = LeaseRepository::new(pool.clone());
        let service = RentalReadService::new(pool, CacheClient::memory("test"));

        let lease = repo.create(1, 1, &lease_request("Awa Diop")).await.unwrap();

        assert!(service.lease_detail(1, lease.id).await.is_ok());
        // The other team cannot read it, cached or not.
        assert!(matches!(
            service.lease_detail(2, lease.id).await,
            Err(RentalError::LeaseNotFound)
        ));
        assert!(matches!(
            service.lease_detail(2, lease.id).await,
            Err(RentalError::LeaseNotFound)
        ));
    }

    #[tokio::test]
    async fn test_post_message_drops_thread_cache() {
        let pool = create_test_pool().await;
        let repo = LeaseRepository::new(pool.clone());
        let service = RentalReadService::new(pool, CacheClient::memory("test"));

        let lease = repo.create(1, 1, &lease_request("Awa Diop")).await.unwrap();

        assert!(service.lease_messages(1, lease.id).await.unwrap().is_empty());

        service
            .post_message(1, lease.id, MessageSender::Owner, "Bonjour")
            .await
            .unwrap();

        let thread = service.lease_messages(1, lease.id).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].body, "Bonjour");
    }

    #[tokio::test]
    async fn test_revenue_history_rejects_odd_windows() {
        let pool = create_test_pool().await;
        let service = RentalReadService::new(pool, CacheClient::memory("test"));

        assert!(service.revenue_history(1, 12).await.is_ok());
        assert!(matches!(
            service.revenue_history(1, 7).await,
            Err(RentalError::InvalidInput(_))
        ));
    }
}
