//! Read models for the tenant portal.
//!
//! Callers hand over a lease id taken from an authenticated tenant
//! session, never from the request body.

use keur_cache::{keys, CacheClient};
use keur_database::{
    Lease, LeaseMessage, LeaseRepository, LeaseStatus, MessageRepository, MessageSender,
    RentalError, RentalResult, RentalTransaction, TransactionRepository,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantDashboard {
    pub lease: Lease,
    pub payments: Vec<RentalTransaction>,
}

pub struct TenantPortalService {
    leases: LeaseRepository,
    transactions: TransactionRepository,
    messages: MessageRepository,
    cache: CacheClient,
}

impl TenantPortalService {
    pub fn new(pool: SqlitePool, cache: CacheClient) -> Self {
        Self {
            leases: LeaseRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            cache,
        }
    }

    /// Lease plus payment history. Cached per tenant email when the lease
    /// has one.
    pub async fn dashboard(&self, lease_id: i64) -> RentalResult<TenantDashboard> {
        let lease = self.active_lease(lease_id).await?;

        match lease.tenant_email.clone() {
            Some(email) => {
                let key = keys::tenant_dashboard_key(&email);
                self.cache
                    .get_or_set(&key, keys::TTL_TENANT_DASHBOARD, || {
                        self.build_dashboard(lease)
                    })
                    .await
            }
            None => self.build_dashboard(lease).await,
        }
    }

    pub async fn payments(&self, lease_id: i64) -> RentalResult<Vec<RentalTransaction>> {
        self.active_lease(lease_id).await?;

        self.cache
            .get_or_set(
                &keys::tenant_payments_key(lease_id),
                keys::TTL_TENANT_PAYMENTS,
                || self.transactions.find_by_lease(lease_id),
            )
            .await
    }

    pub async fn messages(&self, lease_id: i64) -> RentalResult<Vec<LeaseMessage>> {
        self.active_lease(lease_id).await?;

        self.cache
            .get_or_set(
                &keys::lease_messages_key(lease_id),
                keys::TTL_LEASE_MESSAGES,
                || self.messages.find_by_lease(lease_id),
            )
            .await
    }

    /// Post on the tenant side of the thread.
    pub async fn post_message(&self, lease_id: i64, body: &str) -> RentalResult<LeaseMessage> {
        let lease = self.active_lease(lease_id).await?;

        let message = self
            .messages
            .create(lease.id, lease.team_id, MessageSender::Tenant, body)
            .await?;

        self.cache
            .invalidate(&[keys::lease_messages_key(lease_id)])
            .await;

        Ok(message)
    }

    pub async fn mark_messages_read(&self, lease_id: i64) -> RentalResult<u64> {
        self.active_lease(lease_id).await?;

        let marked = self.messages.mark_read(lease_id, MessageSender::Tenant).await?;
        if marked > 0 {
            self.cache
                .invalidate(&[keys::lease_messages_key(lease_id)])
                .await;
        }
        Ok(marked)
    }

    async fn active_lease(&self, lease_id: i64) -> RentalResult<Lease> {
        let lease = self
            .leases
            .find_by_id_unscoped(lease_id)
            .await?
            .ok_or(RentalError::LeaseNotFound)?;
        if lease.status != LeaseStatus::Active {
            return Err(RentalError::LeaseTerminated);
        }
        Ok(lease)
    }

    async fn build_dashboard(&self, lease: Lease) -> RentalResult<TenantDashboard> {
        let payments = self.transactions.find_by_lease(lease.id).await?;
        Ok(TenantDashboard { lease, payments })
    }
}
