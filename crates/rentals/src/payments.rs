//! Rent settlement.
//!
//! Both the owner's manual "mark as paid" and the PayDunya webhook land
//! here: a conditional pending-to-paid update, cache invalidation before
//! the caller responds, then receipt and owner emails. Redelivered
//! webhooks find the row already paid and change nothing.

use keur_cache::{keys, CacheClient};
use keur_database::{
    Lease, LeaseRepository, PaymentDetails, RentalError, RentalResult, RentalTransaction,
    TransactionRepository, UserRepository,
};
use keur_notify::{owner_payment_notice, rent_receipt, Mailer};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub struct PaymentService {
    leases: LeaseRepository,
    transactions: TransactionRepository,
    users: UserRepository,
    cache: CacheClient,
    mailer: Mailer,
}

impl PaymentService {
    pub fn new(pool: SqlitePool, cache: CacheClient, mailer: Mailer) -> Self {
        Self {
            leases: LeaseRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            cache,
            mailer,
        }
    }

    /// Owner-side manual settlement of a transaction.
    pub async fn record_payment(
        &self,
        team_id: i64,
        transaction_id: i64,
        details: &PaymentDetails,
    ) -> RentalResult<RentalTransaction> {
        let tx = self
            .transactions
            .find_by_id(team_id, transaction_id)
            .await?
            .ok_or(RentalError::TransactionNotFound)?;

        if !self.transactions.settle_if_pending(tx.id, details).await? {
            return Err(RentalError::AlreadySettled);
        }

        let lease = self.leases.find_by_id_unscoped(tx.lease_id).await?;
        self.invalidate_after_settlement(team_id, tx.lease_id, lease.as_ref())
            .await;
        if let Some(lease) = &lease {
            self.notify(lease, details.amount_paid, tx.period_month, tx.period_year)
                .await;
        }

        self.transactions
            .find_by_id(team_id, transaction_id)
            .await?
            .ok_or(RentalError::TransactionNotFound)
    }

    /// Settle the period a payment provider reports for a lease. Returns
    /// false when the period was already paid (webhook redelivery).
    pub async fn settle_rent_payment(
        &self,
        lease_id: i64,
        period_year: i64,
        period_month: i64,
        details: &PaymentDetails,
    ) -> RentalResult<bool> {
        let lease = self
            .leases
            .find_by_id_unscoped(lease_id)
            .await?
            .ok_or(RentalError::LeaseNotFound)?;

        let tx = self
            .transactions
            .find_by_period(lease_id, period_year, period_month)
            .await?
            .ok_or(RentalError::TransactionNotFound)?;

        let settled = self.transactions.settle_if_pending(tx.id, details).await?;
        if settled {
            self.invalidate_after_settlement(lease.team_id, lease_id, Some(&lease))
                .await;
            self.notify(&lease, details.amount_paid, period_month, period_year)
                .await;
        } else {
            info!(
                lease_id = lease_id,
                period_year = period_year,
                period_month = period_month,
                "payment already settled, ignoring redelivery"
            );
        }

        Ok(settled)
    }

    async fn invalidate_after_settlement(
        &self,
        team_id: i64,
        lease_id: i64,
        lease: Option<&Lease>,
    ) {
        let mut stale = keys::rental_keys(team_id, Some(lease_id));
        if let Some(email) = lease.and_then(|l| l.tenant_email.as_deref()) {
            stale.push(keys::tenant_dashboard_key(email));
        }
        self.cache.invalidate(&stale).await;
    }

    async fn notify(&self, lease: &Lease, amount: i64, period_month: i64, period_year: i64) {
        if let Some(email) = &lease.tenant_email {
            self.mailer
                .send(
                    email,
                    &rent_receipt(&lease.tenant_name, amount, period_month, period_year),
                )
                .await;
        }

        match self.users.find_by_id(lease.owner_id).await {
            Ok(Some(owner)) => {
                self.mailer
                    .send(&owner.email, &owner_payment_notice(&lease.tenant_name, amount))
                    .await;
            }
            Ok(None) => {}
            Err(e) => warn!(
                lease_id = lease.id,
                "could not load owner for payment notice: {}", e
            ),
        }
    }
}
