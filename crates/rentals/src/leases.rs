//! Lease lifecycle operations.

use keur_cache::{keys, CacheClient};
use keur_database::{
    CreateLeaseRequest, Lease, LeaseRepository, RentalError, RentalResult, UserRepository,
};
use sqlx::SqlitePool;
use tracing::info;

/// Service for creating and terminating leases.
pub struct LeaseService {
    leases: LeaseRepository,
    users: UserRepository,
    cache: CacheClient,
}

impl LeaseService {
    pub fn new(pool: SqlitePool, cache: CacheClient) -> Self {
        Self {
            leases: LeaseRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            cache,
        }
    }

    pub async fn create(
        &self,
        team_id: i64,
        owner_id: i64,
        request: &CreateLeaseRequest,
    ) -> RentalResult<Lease> {
        let lease = self.leases.create(team_id, owner_id, request).await?;

        self.cache.invalidate(&keys::rental_keys(team_id, None)).await;

        Ok(lease)
    }

    /// Terminate a lease. The tenant's magic-link token and any open portal
    /// sessions go with it.
    pub async fn terminate(&self, team_id: i64, lease_id: i64) -> RentalResult<()> {
        self.leases.terminate(team_id, lease_id).await?;
        self.leases.revoke_token(lease_id).await?;
        self.users
            .delete_lease_sessions(lease_id)
            .await
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        self.cache
            .invalidate(&keys::rental_keys(team_id, Some(lease_id)))
            .await;

        info!(team_id = team_id, lease_id = lease_id, "terminated lease");
        Ok(())
    }
}
